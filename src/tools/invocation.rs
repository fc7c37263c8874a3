//! 工具调用与调用结果
//!
//! ToolInvocation 由 Planner 生成、之后不再修改；ToolOutcome 在其基础上附加 result 或 error（二者恰有其一）。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::{ErrorKind, ToolError};

/// 一次工具调用：目录中的工具名 + 参数对象 + 所需权限
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolInvocation {
    pub name: String,
    pub arguments: Map<String, Value>,
    #[serde(default)]
    pub required_scopes: Vec<String>,
}

impl ToolInvocation {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>, required_scopes: Vec<String>) -> Self {
        Self {
            name: name.into(),
            arguments,
            required_scopes,
        }
    }
}

/// 调用结果；构造函数保证 success ⇔ result 存在 ⇔ error 缺失
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolOutcome {
    #[serde(flatten)]
    pub invocation: ToolInvocation,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub execution_time_ms: u64,
}

impl ToolOutcome {
    pub fn succeeded(invocation: ToolInvocation, result: Value, execution_time_ms: u64) -> Self {
        Self {
            invocation,
            success: true,
            result: Some(result),
            error: None,
            error_kind: None,
            execution_time_ms,
        }
    }

    pub fn failed(invocation: ToolInvocation, error: &ToolError, execution_time_ms: u64) -> Self {
        Self {
            invocation,
            success: false,
            result: None,
            error: Some(error.to_string()),
            error_kind: Some(error.kind()),
            execution_time_ms,
        }
    }

    pub fn name(&self) -> &str {
        &self.invocation.name
    }

    /// 不变式检查：success 与 result / error 字段一致
    pub fn is_consistent(&self) -> bool {
        self.success == self.result.is_some() && self.success != self.error.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inv() -> ToolInvocation {
        ToolInvocation::new("contacts_get-contacts", Map::new(), vec!["View Contacts".into()])
    }

    #[test]
    fn test_outcome_constructors_hold_invariant() {
        let ok = ToolOutcome::succeeded(inv(), json!({"contacts": []}), 12);
        assert!(ok.is_consistent());
        let bad = ToolOutcome::failed(inv(), &ToolError::RateLimit, 3);
        assert!(bad.is_consistent());
        assert_eq!(bad.error_kind, Some(ErrorKind::RateLimit));
    }

    #[test]
    fn test_outcome_serializes_flat() {
        let ok = ToolOutcome::succeeded(inv(), json!({"id": "c1"}), 5);
        let v = serde_json::to_value(&ok).unwrap();
        assert_eq!(v["name"], "contacts_get-contacts");
        assert_eq!(v["requiredScopes"][0], "View Contacts");
        assert_eq!(v["executionTimeMs"], 5);
        assert!(v.get("error").is_none());
    }
}
