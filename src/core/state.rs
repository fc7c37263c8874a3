//! 连接健康状态机与对外状态快照
//!
//! disconnected → connecting → {connected | error}；error → connecting（下一次尝试）；
//! connected → connecting（新指令开始分发）。只保存当前状态与最近一次错误信息。

use serde::Serialize;

use crate::core::PerformanceMetrics;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error(String),
}

impl ConnectionState {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error(_) => "error",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ConnectionMonitor {
    state: ConnectionState,
    last_error: Option<String>,
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self {
            state: ConnectionState::Disconnected,
            last_error: None,
        }
    }
}

impl ConnectionMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// 开始一次探测或分发
    pub fn begin_attempt(&mut self) {
        self.transition(ConnectionState::Connecting);
    }

    pub fn succeed(&mut self) {
        self.last_error = None;
        self.transition(ConnectionState::Connected);
    }

    pub fn fail(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        self.last_error = Some(reason.clone());
        self.transition(ConnectionState::Error(reason));
    }

    /// 未配置凭据等情况：回到 disconnected，保留原因供诊断
    pub fn disconnect(&mut self, reason: Option<String>) {
        self.last_error = reason;
        self.transition(ConnectionState::Disconnected);
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            tracing::debug!(from = self.state.label(), to = next.label(), "connection state");
        }
        self.state = next;
    }
}

/// 通过 watch 通道发布的状态快照
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSnapshot {
    pub processing: bool,
    pub connection: ConnectionState,
    pub last_error: Option<String>,
    pub metrics: PerformanceMetrics,
    pub message_count: usize,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            processing: false,
            connection: ConnectionState::Disconnected,
            last_error: None,
            metrics: PerformanceMetrics::default(),
            message_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions() {
        let mut m = ConnectionMonitor::new();
        assert_eq!(m.state(), &ConnectionState::Disconnected);
        m.begin_attempt();
        assert_eq!(m.state(), &ConnectionState::Connecting);
        m.fail("Network error: timeout");
        assert_eq!(m.state(), &ConnectionState::Error("Network error: timeout".into()));
        assert_eq!(m.last_error(), Some("Network error: timeout"));
        m.begin_attempt();
        m.succeed();
        assert_eq!(m.state(), &ConnectionState::Connected);
        assert!(m.last_error().is_none());
    }

    #[test]
    fn test_state_serialization() {
        let v = serde_json::to_value(ConnectionState::Error("boom".into())).unwrap();
        assert_eq!(v["state"], "error");
        assert_eq!(v["reason"], "boom");
    }
}
