//! 可见消息日志：用户提交与助手最终回复，按插入顺序持久化

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::memory::Role;
use crate::tools::ToolOutcome;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    Success,
    Error,
    Info,
}

/// 单条指令的执行统计
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandMetrics {
    pub total_actions: usize,
    pub successful_actions: usize,
    pub execution_time_ms: u64,
}

/// 一条消息；追加后不再修改
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MessageStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolOutcome>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<CommandMetrics>,
}

impl Message {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            role,
            content: content.into(),
            status: None,
            tool_calls: None,
            metrics: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>, status: MessageStatus) -> Self {
        let mut msg = Self::new(Role::Assistant, content);
        msg.status = Some(status);
        msg
    }

    pub fn with_tool_calls(mut self, outcomes: Vec<ToolOutcome>) -> Self {
        if !outcomes.is_empty() {
            self.tool_calls = Some(outcomes);
        }
        self
    }

    pub fn with_metrics(mut self, metrics: CommandMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

/// 有序消息日志
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessageLog {
    messages: Vec<Message>,
}

impl MessageLog {
    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn append(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// 整体替换（导入时使用）
    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_unique_and_camel_case() {
        let a = Message::user("hi");
        let b = Message::assistant("hello", MessageStatus::Success).with_metrics(CommandMetrics {
            total_actions: 2,
            successful_actions: 1,
            execution_time_ms: 40,
        });
        assert_ne!(a.id, b.id);
        let v = serde_json::to_value(&b).unwrap();
        assert_eq!(v["role"], "assistant");
        assert_eq!(v["status"], "success");
        assert_eq!(v["metrics"]["successfulActions"], 1);
        assert!(v.get("toolCalls").is_none());
    }

    #[test]
    fn test_empty_outcomes_not_attached() {
        let m = Message::assistant("x", MessageStatus::Info).with_tool_calls(vec![]);
        assert!(m.tool_calls.is_none());
    }
}
