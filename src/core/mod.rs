//! 核心编排层：错误分类、连接状态、性能统计、指令编排

pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod state;

pub use error::{AgentError, ErrorKind, NetworkFailure, ToolError};
pub use metrics::PerformanceMetrics;
pub use orchestrator::{render_failure, CommandOrchestrator, DIRECT_ANSWER_FALLBACK, MISSING_CREDENTIALS_MESSAGE};
pub use state::{ConnectionMonitor, ConnectionState, StatusSnapshot};
