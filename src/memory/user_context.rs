//! 派生用户上下文：最近接触的实体、偏好、常用工具序列
//!
//! 每次成功分发后按类覆盖（不合并）；实体列表与模式列表都有上限。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// 常用模式最多保留条数
pub const PATTERN_CAP: usize = 10;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserContext {
    pub recent_contacts: Vec<Value>,
    pub active_opportunities: Vec<Value>,
    pub preferences: Map<String, Value>,
    pub common_patterns: Vec<String>,
}

impl UserContext {
    pub fn set_recent_contacts(&mut self, contacts: Vec<Value>, cap: usize) {
        self.recent_contacts = contacts.into_iter().take(cap).collect();
    }

    pub fn set_active_opportunities(&mut self, opportunities: Vec<Value>, cap: usize) {
        self.active_opportunities = opportunities.into_iter().take(cap).collect();
    }

    /// 记录一次工具序列；已存在则移到末尾，超出上限丢弃最旧的
    pub fn remember_pattern(&mut self, pattern: impl Into<String>) {
        let pattern = pattern.into();
        self.common_patterns.retain(|p| p != &pattern);
        self.common_patterns.push(pattern);
        if self.common_patterns.len() > PATTERN_CAP {
            let excess = self.common_patterns.len() - PATTERN_CAP;
            self.common_patterns.drain(..excess);
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}
