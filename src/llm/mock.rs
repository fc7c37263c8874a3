//! 脚本化推理引擎（用于测试与离线演示，无需 API）
//!
//! 按顺序弹出预置回复；脚本耗尽时返回 Unavailable。同时记录收到的请求，便于断言 prompt 内容。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::config::Credentials;
use crate::llm::{EngineReply, EngineRequest, LlmError, ReasoningEngine};

#[derive(Debug, Default)]
pub struct ScriptedEngine {
    replies: Mutex<VecDeque<Result<EngineReply, LlmError>>>,
    requests: Mutex<Vec<EngineRequest>>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_reply(self, reply: EngineReply) -> Self {
        self.push(Ok(reply));
        self
    }

    pub fn with_error(self, err: LlmError) -> Self {
        self.push(Err(err));
        self
    }

    pub fn push(&self, reply: Result<EngineReply, LlmError>) {
        if let Ok(mut q) = self.replies.lock() {
            q.push_back(reply);
        }
    }

    /// 已收到的请求（按调用顺序）
    pub fn requests(&self) -> Vec<EngineRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ReasoningEngine for ScriptedEngine {
    async fn complete(
        &self,
        request: &EngineRequest,
        _credentials: &Credentials,
    ) -> Result<EngineReply, LlmError> {
        if let Ok(mut r) = self.requests.lock() {
            r.push(request.clone());
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut q| q.pop_front())
            .unwrap_or_else(|| Err(LlmError::Unavailable("script exhausted".to_string())))
    }
}
