//! 导出 / 导入与对话摘要
//!
//! 导出包含消息日志、性能统计、导出时间与脱敏后的配置视图（只暴露凭据是否存在与租户 id）。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::AssistantSettings;
use crate::core::PerformanceMetrics;
use crate::memory::{Message, MessageStatus, Role};

/// 脱敏配置视图
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedactedConfig {
    pub has_business_token: bool,
    pub has_reasoning_key: bool,
    pub tenant_id: String,
}

impl From<&AssistantSettings> for RedactedConfig {
    fn from(s: &AssistantSettings) -> Self {
        Self {
            has_business_token: !s.business_token.trim().is_empty(),
            has_reasoning_key: !s.reasoning_api_key.trim().is_empty(),
            tenant_id: s.tenant_id.clone(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportBundle {
    pub messages: Vec<Message>,
    pub performance_metrics: PerformanceMetrics,
    pub export_date: DateTime<Utc>,
    pub config: RedactedConfig,
}

impl ExportBundle {
    pub fn new(messages: Vec<Message>, metrics: PerformanceMetrics, settings: &AssistantSettings) -> Self {
        Self {
            messages,
            performance_metrics: metrics,
            export_date: Utc::now(),
            config: RedactedConfig::from(settings),
        }
    }

    /// 建议文件名：bizpilot-conversation-YYYY-MM-DD.json
    pub fn file_name(&self) -> String {
        format!("bizpilot-conversation-{}.json", self.export_date.format("%Y-%m-%d"))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(data: &str) -> serde_json::Result<Self> {
        serde_json::from_str(data)
    }
}

/// 对话摘要
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub total_messages: usize,
    pub user_messages: usize,
    pub assistant_messages: usize,
    pub successful_commands: usize,
    pub failed_commands: usize,
}

impl ConversationSummary {
    pub fn of(messages: &[Message]) -> Self {
        let mut summary = Self {
            total_messages: messages.len(),
            ..Self::default()
        };
        for m in messages {
            match m.role {
                Role::User => summary.user_messages += 1,
                Role::Assistant => {
                    summary.assistant_messages += 1;
                    match m.status {
                        Some(MessageStatus::Success) => summary.successful_commands += 1,
                        Some(MessageStatus::Error) => summary.failed_commands += 1,
                        _ => {}
                    }
                }
            }
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_config_hides_secrets() {
        let settings = AssistantSettings {
            business_token: "pit-secret".into(),
            tenant_id: "loc-1".into(),
            ..AssistantSettings::default()
        };
        let bundle = ExportBundle::new(vec![], PerformanceMetrics::default(), &settings);
        let json = bundle.to_json().unwrap();
        assert!(!json.contains("pit-secret"));
        assert!(json.contains("\"hasBusinessToken\": true"));
        assert!(json.contains("\"hasReasoningKey\": false"));
        assert!(bundle.file_name().starts_with("bizpilot-conversation-"));
        assert!(bundle.file_name().ends_with(".json"));
    }

    #[test]
    fn test_bundle_roundtrip_preserves_ids_and_order() {
        let messages = vec![
            Message::user("a"),
            Message::assistant("b", MessageStatus::Success),
            Message::user("c"),
        ];
        let bundle = ExportBundle::new(messages.clone(), PerformanceMetrics::default(), &AssistantSettings::default());
        let back = ExportBundle::from_json(&bundle.to_json().unwrap()).unwrap();
        let ids: Vec<_> = back.messages.iter().map(|m| m.id.clone()).collect();
        let expected: Vec<_> = messages.iter().map(|m| m.id.clone()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn test_summary_counts() {
        let messages = vec![
            Message::user("a"),
            Message::assistant("ok", MessageStatus::Success),
            Message::user("b"),
            Message::assistant("bad", MessageStatus::Error),
            Message::assistant("hint", MessageStatus::Info),
        ];
        let s = ConversationSummary::of(&messages);
        assert_eq!(s.total_messages, 5);
        assert_eq!(s.user_messages, 2);
        assert_eq!(s.assistant_messages, 3);
        assert_eq!(s.successful_commands, 1);
        assert_eq!(s.failed_commands, 1);
    }
}
