//! LLM 层：推理引擎抽象与实现（OpenAI 兼容 HTTP / 脚本化 Mock）

pub mod mock;
pub mod openai;
pub mod traits;

pub use mock::ScriptedEngine;
pub use openai::{OpenAiEngine, TokenUsage, OPENAI_BASE_URL};
pub use traits::{
    EngineMessage, EngineReply, EngineRequest, EngineRole, FunctionSpec, LlmError, ProposedCall,
    ReasoningEngine,
};
