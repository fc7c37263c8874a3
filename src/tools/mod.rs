//! 远端业务工具：目录、调用模型、参数增强与并发分发

pub mod catalog;
pub mod dispatcher;
pub mod enhance;
pub mod invocation;

pub use catalog::{EndpointInfo, ToolCatalog, ToolSpec};
pub use dispatcher::ToolDispatcher;
pub use enhance::{enhance_arguments, normalize_date, parse_date, PaginationDefaults};
pub use invocation::{ToolInvocation, ToolOutcome};
