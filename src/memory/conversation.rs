//! 短期记忆：对话历史
//!
//! 保留最近 N 条条目（默认 20），超出时从最旧处剪枝；规划 / 合成 prompt 只取最近窗口（默认 6）。
//! 同时持有派生的 UserContext，clear 时一并重置。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::memory::UserContext;
use crate::tools::ToolInvocation;

/// 条目角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// 一条对话历史
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolInvocation>>,
    pub timestamp: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: None,
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>, tool_calls: Option<Vec<ToolInvocation>>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls,
            timestamp: Utc::now(),
        }
    }
}

/// 有界对话记忆 + 派生用户上下文
#[derive(Clone, Debug)]
pub struct ConversationMemory {
    entries: Vec<HistoryEntry>,
    limit: usize,
    user_context: UserContext,
}

impl ConversationMemory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: Vec::new(),
            limit: limit.max(1),
            user_context: UserContext::default(),
        }
    }

    pub fn append(&mut self, entry: HistoryEntry) {
        self.entries.push(entry);
        self.prune();
    }

    /// 最近 n 条，按原顺序；n 不会超过容量上限
    pub fn recent_window(&self, n: usize) -> &[HistoryEntry] {
        let n = n.min(self.limit).min(self.entries.len());
        &self.entries[self.entries.len() - n..]
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// 清空历史并重置 UserContext
    pub fn clear(&mut self) {
        self.entries.clear();
        self.user_context = UserContext::default();
    }

    pub fn user_context(&self) -> &UserContext {
        &self.user_context
    }

    pub fn user_context_mut(&mut self) -> &mut UserContext {
        &mut self.user_context
    }

    fn prune(&mut self) {
        if self.entries.len() > self.limit {
            let excess = self.entries.len() - self.limit;
            self.entries.drain(..excess);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cap_evicts_oldest_first() {
        let mut mem = ConversationMemory::new(20);
        for i in 0..45 {
            mem.append(HistoryEntry::user(format!("m{i}")));
            assert!(mem.len() <= 20);
        }
        assert_eq!(mem.entries()[0].content, "m25");
        assert_eq!(mem.entries()[19].content, "m44");
    }

    #[test]
    fn test_recent_window_keeps_order_and_cap() {
        let mut mem = ConversationMemory::new(20);
        for i in 0..10 {
            mem.append(HistoryEntry::user(format!("m{i}")));
        }
        let w = mem.recent_window(3);
        let names: Vec<_> = w.iter().map(|e| e.content.as_str()).collect();
        assert_eq!(names, ["m7", "m8", "m9"]);
        assert_eq!(mem.recent_window(100).len(), 10);

        for i in 10..40 {
            mem.append(HistoryEntry::user(format!("m{i}")));
        }
        assert_eq!(mem.recent_window(100).len(), 20);
    }

    #[test]
    fn test_clear_resets_user_context() {
        let mut mem = ConversationMemory::new(20);
        mem.append(HistoryEntry::user("hello"));
        mem.user_context_mut().set_recent_contacts(vec![json!({"id": "c1"})], 5);
        mem.user_context_mut().remember_pattern("a → b");
        mem.clear();
        assert!(mem.is_empty());
        assert_eq!(mem.user_context(), &UserContext::default());
    }
}
