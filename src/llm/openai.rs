//! OpenAI 兼容 chat-completion 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）。API Key 来自每条指令的凭据快照，
//! 因此每次调用用共享的 HTTP Client 构造一个轻量的 async_openai Client。
//! 带 tools 时使用 function calling，返回的 tool_calls 参数保持字符串原样交给 Planner 校验。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::chat::{
    ChatCompletionMessageToolCalls, ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs, ChatCompletionTool,
    ChatCompletionTools, CreateChatCompletionRequestArgs, FunctionObjectArgs,
};
use async_openai::Client;
use async_trait::async_trait;

use crate::config::Credentials;
use crate::llm::{
    EngineMessage, EngineReply, EngineRequest, EngineRole, FunctionSpec, LlmError, ProposedCall, ReasoningEngine,
};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

/// OpenAI 兼容推理引擎：持有共享 HTTP Client、base_url 与 model
pub struct OpenAiEngine {
    http: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiEngine {
    pub fn new(base_url: Option<&str>, model: &str, timeout_secs: u64) -> Result<Self, LlmError> {
        let timeout = Duration::from_secs(timeout_secs);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlmError::Unavailable(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url
                .unwrap_or(OPENAI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.to_string(),
            timeout,
            usage: TokenUsage::new(),
        })
    }

    /// 获取累计 token 使用统计
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    fn client_for(&self, api_key: &str) -> Client<OpenAIConfig> {
        let config = OpenAIConfig::new()
            .with_api_base(self.base_url.as_str())
            .with_api_key(api_key);
        Client::with_config(config).with_http_client(self.http.clone())
    }
}

fn to_openai_messages(messages: &[EngineMessage]) -> Result<Vec<ChatCompletionRequestMessage>, OpenAIError> {
    messages
        .iter()
        .map(|m| {
            Ok(match m.role {
                EngineRole::System => ChatCompletionRequestMessage::System(
                    ChatCompletionRequestSystemMessageArgs::default()
                        .content(m.content.clone())
                        .build()?,
                ),
                EngineRole::User => ChatCompletionRequestMessage::User(
                    ChatCompletionRequestUserMessageArgs::default()
                        .content(m.content.clone())
                        .build()?,
                ),
                EngineRole::Assistant => ChatCompletionRequestMessage::Assistant(
                    ChatCompletionRequestAssistantMessageArgs::default()
                        .content(m.content.clone())
                        .build()?,
                ),
            })
        })
        .collect()
}

fn to_openai_tools(functions: &[FunctionSpec]) -> Result<Vec<ChatCompletionTools>, OpenAIError> {
    functions
        .iter()
        .map(|f| {
            let function = FunctionObjectArgs::default()
                .name(f.name.clone())
                .description(f.description.clone())
                .parameters(f.parameters.clone())
                .build()?;
            Ok(ChatCompletionTools::Function(ChatCompletionTool { function }))
        })
        .collect()
}

/// OpenAIError → LlmError
fn map_openai_error(err: OpenAIError) -> LlmError {
    match err {
        OpenAIError::Reqwest(e) if e.is_timeout() => LlmError::Timeout,
        OpenAIError::Reqwest(e) => LlmError::Network(e.to_string()),
        OpenAIError::ApiError(e) => LlmError::Api(e.to_string()),
        e @ OpenAIError::JSONDeserialize(..) => LlmError::Decode(e.to_string()),
        other => LlmError::Unavailable(other.to_string()),
    }
}

#[async_trait]
impl ReasoningEngine for OpenAiEngine {
    async fn complete(
        &self,
        request: &EngineRequest,
        credentials: &Credentials,
    ) -> Result<EngineReply, LlmError> {
        let api_key = credentials.reasoning_key().ok_or(LlmError::MissingKey)?;

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(to_openai_messages(&request.messages).map_err(map_openai_error)?)
            .temperature(request.temperature)
            .max_completion_tokens(request.max_tokens);
        if !request.functions.is_empty() {
            args.tools(to_openai_tools(&request.functions).map_err(map_openai_error)?);
        }
        let body = args.build().map_err(map_openai_error)?;

        // 客户端内部对 429 的退避重试也受同一截止时间约束
        let response = tokio::time::timeout(self.timeout, self.client_for(api_key).chat().create(body))
            .await
            .map_err(|_| LlmError::Timeout)?
            .map_err(map_openai_error)?;

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        let message = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| LlmError::Decode("response has no choices".to_string()))?;

        let tool_calls: Vec<ProposedCall> = message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .filter_map(|call| match call {
                ChatCompletionMessageToolCalls::Function(tc) => Some(ProposedCall {
                    name: tc.function.name,
                    arguments: tc.function.arguments,
                }),
                _ => None,
            })
            .collect();

        tracing::debug!(
            model = %self.model,
            tool_calls = tool_calls.len(),
            has_content = message.content.is_some(),
            "reasoning engine replied"
        );

        Ok(EngineReply {
            content: message.content.filter(|c| !c.trim().is_empty()),
            tool_calls,
        })
    }
}
