//! 错误分类：单次工具调用错误（ToolError）与指令级错误（AgentError）
//!
//! ToolError 对应远端业务系统的错误分类（鉴权、权限范围、限流、网络、参数、未知工具、协议、远端内部错误）；
//! 失败的 ToolOutcome 只保存 ErrorKind 标签与错误文本，便于序列化与报告渲染。

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::LlmError;

/// 网络层失败的子原因
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NetworkFailure {
    Timeout,
    Unreachable,
    Refused,
}

impl fmt::Display for NetworkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NetworkFailure::Timeout => "timeout",
            NetworkFailure::Unreachable => "unreachable",
            NetworkFailure::Refused => "refused",
        };
        f.write_str(s)
    }
}

/// 单次远端工具调用的错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Authentication failed. Please check your business-system access token.")]
    Auth,

    #[error("Access denied for {tool}. Required scopes: {}. Please check your token permissions.", .scopes.join(", "))]
    Scope { tool: String, scopes: Vec<String> },

    #[error("Rate limit exceeded. Please wait before making more requests.")]
    RateLimit,

    #[error("Network error ({reason}): {detail}")]
    Network {
        reason: NetworkFailure,
        detail: String,
    },

    #[error("Invalid parameters for {tool}: {detail}")]
    Validation { tool: String, detail: String },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Remote internal error: {0}")]
    RemoteInternal(String),
}

impl ToolError {
    pub fn network(reason: NetworkFailure, detail: impl Into<String>) -> Self {
        ToolError::Network {
            reason,
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ToolError::Auth => ErrorKind::Auth,
            ToolError::Scope { .. } => ErrorKind::Scope,
            ToolError::RateLimit => ErrorKind::RateLimit,
            ToolError::Network { reason, .. } => ErrorKind::Network(*reason),
            ToolError::Validation { .. } => ErrorKind::Validation,
            ToolError::UnknownTool(_) => ErrorKind::UnknownTool,
            ToolError::Protocol(_) => ErrorKind::Protocol,
            ToolError::RemoteInternal(_) => ErrorKind::RemoteInternal,
        }
    }
}

/// 错误分类标签（可序列化，挂在失败的 ToolOutcome 上）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "reason", rename_all = "camelCase")]
pub enum ErrorKind {
    Auth,
    Scope,
    RateLimit,
    Network(NetworkFailure),
    Validation,
    UnknownTool,
    Protocol,
    RemoteInternal,
    Planning,
}

impl ErrorKind {
    /// 按子串把任意错误文本归入某一类；无法识别时视为远端内部错误
    pub fn classify(message: &str) -> ErrorKind {
        let m = message.to_lowercase();
        if m.contains("rate limit") || m.contains("rate_limit") || m.contains("too many requests") || m.contains("quota") || m.contains("429") {
            ErrorKind::RateLimit
        } else if m.contains("authentication") || m.contains("unauthorized") || m.contains("token") || m.contains("api key") || m.contains("401") {
            ErrorKind::Auth
        } else if m.contains("scope") || m.contains("access denied") || m.contains("forbidden") {
            ErrorKind::Scope
        } else if m.contains("timeout") || m.contains("timed out") {
            ErrorKind::Network(NetworkFailure::Timeout)
        } else if m.contains("refused") {
            ErrorKind::Network(NetworkFailure::Refused)
        } else if m.contains("network") || m.contains("dns") || m.contains("connection") || m.contains("unreachable") {
            ErrorKind::Network(NetworkFailure::Unreachable)
        } else if m.contains("planning") || m.contains("invalid tool call") {
            ErrorKind::Planning
        } else if m.contains("unknown tool") || m.contains("method not found") {
            ErrorKind::UnknownTool
        } else if m.contains("invalid param") || m.contains("bad request") || m.contains("validation") {
            ErrorKind::Validation
        } else if m.contains("parse") || m.contains("protocol") || m.contains("decode") {
            ErrorKind::Protocol
        } else {
            ErrorKind::RemoteInternal
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Auth => "AuthError",
            ErrorKind::Scope => "ScopeError",
            ErrorKind::RateLimit => "RateLimitError",
            ErrorKind::Network(_) => "NetworkError",
            ErrorKind::Validation => "ValidationError",
            ErrorKind::UnknownTool => "UnknownToolError",
            ErrorKind::Protocol => "ProtocolError",
            ErrorKind::RemoteInternal => "RemoteInternalError",
            ErrorKind::Planning => "PlanningError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Network(reason) => write!(f, "NetworkError({reason})"),
            other => f.write_str(other.label()),
        }
    }
}

/// 指令级错误：前置条件、单飞忙碌、规划失败、推理引擎、存储
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Missing credentials: {0}")]
    MissingCredentials(String),

    #[error("A command is already being processed")]
    Busy,

    #[error("Planning failed: invalid tool call format for {tool}: {reason}")]
    Planning { tool: String, reason: String },

    #[error("AI processing failed: {0}")]
    Engine(#[from] LlmError),

    #[error("Store error: {0}")]
    Store(String),
}

impl AgentError {
    /// 指令级错误的分类；Engine 错误按文本归类（如推理端点返回 401 / 超时）
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::Planning { .. } => ErrorKind::Planning,
            AgentError::MissingCredentials(_) => ErrorKind::Auth,
            AgentError::Engine(e) => e.kind(),
            other => ErrorKind::classify(&other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_error_lists_scopes() {
        let err = ToolError::Scope {
            tool: "contacts_get-contacts".to_string(),
            scopes: vec!["View Contacts".to_string()],
        };
        assert!(err.to_string().contains("View Contacts"));
        assert_eq!(err.kind(), ErrorKind::Scope);
    }

    #[test]
    fn test_classify_by_substring() {
        assert_eq!(ErrorKind::classify("Authentication failed"), ErrorKind::Auth);
        assert_eq!(ErrorKind::classify("rate limit exceeded"), ErrorKind::RateLimit);
        assert_eq!(
            ErrorKind::classify("Rate limit reached on tokens per min (TPM)"),
            ErrorKind::RateLimit
        );
        assert_eq!(ErrorKind::classify("Incorrect API key provided"), ErrorKind::Auth);
        assert_eq!(
            ErrorKind::classify("operation timed out"),
            ErrorKind::Network(NetworkFailure::Timeout)
        );
        assert_eq!(
            ErrorKind::classify("connection refused"),
            ErrorKind::Network(NetworkFailure::Refused)
        );
        assert_eq!(ErrorKind::classify("something odd"), ErrorKind::RemoteInternal);
    }

    #[test]
    fn test_planning_error_kind() {
        let err = AgentError::Planning {
            tool: "contacts_add-tags".to_string(),
            reason: "EOF while parsing".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::Planning);
        assert!(err.to_string().contains("contacts_add-tags"));
    }

    #[test]
    fn test_error_kind_serializes_with_reason() {
        let json = serde_json::to_value(ErrorKind::Network(NetworkFailure::Timeout)).unwrap();
        assert_eq!(json["kind"], "network");
        assert_eq!(json["reason"], "timeout");
    }
}
