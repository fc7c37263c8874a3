//! 协议翻译层：工具调用 ↔ JSON-RPC 信封，HTTP / JSON-RPC / 传输错误 ↔ ToolError

pub mod client;
pub mod envelope;
pub mod translate;

pub use client::{HttpRemoteClient, RemoteClient};
pub use envelope::{next_request_id, RpcError, RpcRequest, RpcResponse, ToolCallParams};
pub use translate::{classify_transport, interpret_response, map_rpc_error};
