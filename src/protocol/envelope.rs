//! JSON-RPC 风格的请求 / 响应信封
//!
//! 请求：`{jsonrpc, id, method: "tools/call", params: {name, arguments}}`；
//! 响应：`{result}` 或 `{error: {code, message}}`，error 的形态按宽松规则解析。id 在进程内单调递增（以启动时刻毫秒数为种子）。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const METHOD_TOOLS_CALL: &str = "tools/call";

/// JSON-RPC 错误码
pub const METHOD_NOT_FOUND: i64 = -32601;
pub const INVALID_PARAMS: i64 = -32602;
pub const INTERNAL_ERROR: i64 = -32603;
pub const PARSE_ERROR: i64 = -32700;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    #[serde(rename = "jsonrpc")]
    pub protocol_version: String,
    pub id: u64,
    pub method: String,
    pub params: ToolCallParams,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl RpcRequest {
    pub fn tool_call(protocol_version: &str, name: &str, arguments: Map<String, Value>) -> Self {
        Self {
            protocol_version: protocol_version.to_string(),
            id: next_request_id(),
            method: METHOD_TOOLS_CALL.to_string(),
            params: ToolCallParams {
                name: name.to_string(),
                arguments,
            },
        }
    }
}

/// 远端错误对象；code 缺失或不是整数时为 None
#[derive(Clone, Debug, PartialEq)]
pub struct RpcError {
    pub code: Option<i64>,
    pub message: String,
}

impl RpcError {
    /// 宽松解析：`{code, message}`、只有 message、或者直接是一段文本
    pub fn from_value(value: &Value) -> Self {
        let code = value.get("code").and_then(|c| {
            c.as_i64()
                .or_else(|| c.as_str().and_then(|s| s.trim().parse().ok()))
        });
        let message = match value {
            Value::String(s) => s.clone(),
            Value::Object(_) => value
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            other => other.to_string(),
        };
        Self { code, message }
    }
}

/// 响应信封
#[derive(Clone, Debug, PartialEq)]
pub enum RpcResponse {
    /// 带 `result` 字段（值可以是 null）
    Result(Value),
    /// `error` 字段存在且非空
    Error(RpcError),
    /// 两者都没有：整个 body 即结果
    Bare(Value),
}

impl RpcResponse {
    /// `result` 优先于 `error`；null / false / 0 / "" 的 error 视为不存在
    pub fn from_value(value: Value) -> Self {
        if let Some(result) = value.get("result") {
            return RpcResponse::Result(result.clone());
        }
        match value.get("error") {
            Some(err) if is_present(err) => RpcResponse::Error(RpcError::from_value(err)),
            _ => RpcResponse::Bare(value),
        }
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

static REQUEST_SEQ: OnceLock<AtomicU64> = OnceLock::new();

/// 进程内单调唯一的请求 id
pub fn next_request_id() -> u64 {
    REQUEST_SEQ
        .get_or_init(|| {
            let seed = chrono::Utc::now().timestamp_millis().max(0) as u64;
            AtomicU64::new(seed)
        })
        .fetch_add(1, Ordering::Relaxed)
}

/// 解析响应体：普通 JSON，或 text/event-stream（取最后一个可解析的 `data:` 负载）
pub fn parse_body(body: &str) -> Option<Value> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        return Some(v);
    }
    trimmed
        .lines()
        .filter_map(|line| line.trim().strip_prefix("data:"))
        .filter_map(|data| serde_json::from_str::<Value>(data.trim()).ok())
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_shape() {
        let mut args = Map::new();
        args.insert("query".into(), json!("vip"));
        let req = RpcRequest::tool_call("2.0", "contacts_get-contacts", args);
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["jsonrpc"], "2.0");
        assert_eq!(v["method"], "tools/call");
        assert_eq!(v["params"]["name"], "contacts_get-contacts");
        assert_eq!(v["params"]["arguments"]["query"], "vip");
    }

    #[test]
    fn test_request_ids_strictly_increase() {
        let a = next_request_id();
        let b = next_request_id();
        let c = next_request_id();
        assert!(a < b && b < c);
    }

    #[test]
    fn test_parse_event_stream_body() {
        let body = "event: message\ndata: {\"jsonrpc\":\"2.0\",\"id\":1,\"result\":{\"ok\":true}}\n\n";
        let v = parse_body(body).unwrap();
        assert_eq!(v["result"]["ok"], true);
        assert!(parse_body("   ").is_none());
    }

    #[test]
    fn test_response_shapes() {
        assert_eq!(
            RpcResponse::from_value(json!({"jsonrpc": "2.0", "id": 1, "result": null})),
            RpcResponse::Result(Value::Null)
        );
        assert_eq!(
            RpcResponse::from_value(json!({"result": {"ok": true}, "error": "ignored"})),
            RpcResponse::Result(json!({"ok": true}))
        );
        assert_eq!(
            RpcResponse::from_value(json!({"error": "Invalid token"})),
            RpcResponse::Error(RpcError {
                code: None,
                message: "Invalid token".into()
            })
        );
        assert_eq!(
            RpcResponse::from_value(json!({"error": {"code": "-32601", "message": "nope"}})),
            RpcResponse::Error(RpcError {
                code: Some(METHOD_NOT_FOUND),
                message: "nope".into()
            })
        );
        let bare = json!({"error": null, "location": {"id": "loc"}});
        assert_eq!(RpcResponse::from_value(bare.clone()), RpcResponse::Bare(bare));
    }
}
