//! 推理引擎抽象
//!
//! Planner 与 Synthesizer 都通过 ReasoningEngine 调用 chat-completion 风格端点：
//! 请求含 system 指令、裁剪后的历史、用户指令与可选的工具目录；回复为文本或一组工具调用提议（参数为字符串化 JSON）。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::Credentials;
use crate::core::{ErrorKind, NetworkFailure};

/// 推理引擎消息角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineRole {
    System,
    User,
    Assistant,
}

/// 推理引擎消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineMessage {
    pub role: EngineRole,
    pub content: String,
}

impl EngineMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: EngineRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: EngineRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: EngineRole::Assistant,
            content: content.into(),
        }
    }
}

/// 暴露给推理引擎的函数描述（name / description / JSON Schema 参数）
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// 一次推理请求
#[derive(Clone, Debug, Default)]
pub struct EngineRequest {
    pub messages: Vec<EngineMessage>,
    /// 为空时不携带 tools 字段（纯文本完成）
    pub functions: Vec<FunctionSpec>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// 推理引擎提议的单个工具调用；arguments 仍是原始字符串，由 Planner 解析校验
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProposedCall {
    pub name: String,
    pub arguments: String,
}

/// 推理回复：可选文本 + 零或多个工具调用提议
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EngineReply {
    pub content: Option<String>,
    pub tool_calls: Vec<ProposedCall>,
}

impl EngineReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            tool_calls: Vec::new(),
        }
    }

    pub fn calls(calls: Vec<ProposedCall>) -> Self {
        Self {
            content: None,
            tool_calls: calls,
        }
    }
}

/// 推理引擎错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("Reasoning engine API key is required")]
    MissingKey,

    #[error("Reasoning engine request timed out")]
    Timeout,

    #[error("Reasoning engine network error: {0}")]
    Network(String),

    #[error("Reasoning engine API error: {0}")]
    Api(String),

    #[error("Failed to decode reasoning engine response: {0}")]
    Decode(String),

    #[error("Reasoning engine unavailable: {0}")]
    Unavailable(String),
}

impl LlmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            LlmError::MissingKey => ErrorKind::Auth,
            LlmError::Timeout => ErrorKind::Network(NetworkFailure::Timeout),
            LlmError::Network(msg) if msg.contains("refused") => {
                ErrorKind::Network(NetworkFailure::Refused)
            }
            LlmError::Network(_) => ErrorKind::Network(NetworkFailure::Unreachable),
            LlmError::Api(msg) => ErrorKind::classify(msg),
            LlmError::Decode(_) => ErrorKind::Protocol,
            LlmError::Unavailable(msg) => ErrorKind::classify(msg),
        }
    }
}

/// 推理引擎 trait：凭据按指令传入（配置在指令执行期间只读，更新从下一条指令生效）
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    async fn complete(
        &self,
        request: &EngineRequest,
        credentials: &Credentials,
    ) -> Result<EngineReply, LlmError>;
}
