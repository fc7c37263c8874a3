//! 记忆层：对话历史、派生用户上下文、消息日志、持久化与导出

pub mod conversation;
pub mod export;
pub mod message;
pub mod persistence;
pub mod user_context;

pub use conversation::{ConversationMemory, HistoryEntry, Role};
pub use export::{ConversationSummary, ExportBundle, RedactedConfig};
pub use message::{CommandMetrics, Message, MessageLog, MessageStatus};
pub use persistence::{FileStore, KeyValueStore, MemoryStore, MESSAGES_KEY, SETTINGS_KEY};
pub use user_context::UserContext;
