//! 响应翻译：HTTP 状态码 / JSON-RPC 错误码 / 传输层错误 → ToolError
//!
//! 纯函数，不持有状态；HttpRemoteClient 在拿到响应后调用 interpret_response，发送失败时调用 classify_transport。

use std::error::Error as StdError;

use serde_json::Value;

use crate::core::{NetworkFailure, ToolError};
use crate::protocol::envelope::{
    parse_body, RpcError, RpcResponse, INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR,
};

/// 把一次 HTTP 响应翻译为结果或 ToolError
pub fn interpret_response(
    status: u16,
    body: &str,
    tool: &str,
    scopes: &[String],
) -> Result<Value, ToolError> {
    match status {
        200..=299 => interpret_success_body(body, tool),
        400 => Err(ToolError::Validation {
            tool: tool.to_string(),
            detail: remote_message(body).unwrap_or_else(|| "bad request".to_string()),
        }),
        401 => Err(ToolError::Auth),
        403 => Err(ToolError::Scope {
            tool: tool.to_string(),
            scopes: if scopes.is_empty() {
                vec!["unknown".to_string()]
            } else {
                scopes.to_vec()
            },
        }),
        404 => Err(ToolError::UnknownTool(tool.to_string())),
        429 => Err(ToolError::RateLimit),
        other => Err(ToolError::RemoteInternal(format!(
            "unexpected status {other}{}",
            remote_message(body)
                .map(|m| format!(": {m}"))
                .unwrap_or_default()
        ))),
    }
}

fn interpret_success_body(body: &str, tool: &str) -> Result<Value, ToolError> {
    let value = parse_body(body)
        .ok_or_else(|| ToolError::Protocol(format!("response for {tool} is not valid JSON")))?;

    match RpcResponse::from_value(value) {
        RpcResponse::Result(result) => Ok(result),
        RpcResponse::Error(err) => Err(map_rpc_error(&err, tool)),
        RpcResponse::Bare(value) => Ok(value),
    }
}

/// JSON-RPC 错误码 → ToolError；未列出或缺失的码视为远端内部错误
pub fn map_rpc_error(err: &RpcError, tool: &str) -> ToolError {
    let message = if err.message.is_empty() {
        "unknown remote error"
    } else {
        err.message.as_str()
    };
    match err.code {
        Some(METHOD_NOT_FOUND) => ToolError::UnknownTool(tool.to_string()),
        Some(INVALID_PARAMS) => ToolError::Validation {
            tool: tool.to_string(),
            detail: err.message.clone(),
        },
        Some(INTERNAL_ERROR) => ToolError::RemoteInternal(err.message.clone()),
        Some(PARSE_ERROR) => ToolError::Protocol(format!("remote could not parse request: {}", err.message)),
        Some(code) => ToolError::RemoteInternal(format!("error {code}: {message}")),
        None => ToolError::RemoteInternal(message.to_string()),
    }
}

fn remote_message(body: &str) -> Option<String> {
    let v = parse_body(body)?;
    v.pointer("/error/message")
        .or_else(|| v.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// 传输层错误 → NetworkError（timeout / refused / unreachable）
pub fn classify_transport(err: &reqwest::Error) -> ToolError {
    let reason = if err.is_timeout() {
        NetworkFailure::Timeout
    } else if is_refused(err) {
        NetworkFailure::Refused
    } else if err.is_connect() || err.is_request() {
        NetworkFailure::Unreachable
    } else {
        return ToolError::Protocol(err.to_string());
    };
    ToolError::network(reason, describe(err))
}

fn is_refused(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(s) = source {
        if let Some(io) = s.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::ConnectionRefused {
                return true;
            }
        }
        source = s.source();
    }
    describe(err).to_lowercase().contains("refused")
}

/// 把 error source 链拼成一行，便于诊断
fn describe(err: &reqwest::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(s) = source {
        parts.push(s.to_string());
        source = s.source();
    }
    parts.join(": ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use serde_json::json;

    fn scopes() -> Vec<String> {
        vec!["View Contacts".to_string()]
    }

    #[test]
    fn test_success_with_result() {
        let body = json!({"jsonrpc": "2.0", "id": 1, "result": {"contacts": [{"id": "c1"}]}}).to_string();
        let v = interpret_response(200, &body, "contacts_get-contacts", &scopes()).unwrap();
        assert_eq!(v["contacts"][0]["id"], "c1");
    }

    #[test]
    fn test_success_without_envelope_returns_body() {
        let body = json!({"location": {"id": "loc"}}).to_string();
        let v = interpret_response(200, &body, "locations_get-location", &[]).unwrap();
        assert_eq!(v["location"]["id"], "loc");
    }

    #[test]
    fn test_rpc_error_codes() {
        let cases = [
            (METHOD_NOT_FOUND, ErrorKind::UnknownTool),
            (INVALID_PARAMS, ErrorKind::Validation),
            (INTERNAL_ERROR, ErrorKind::RemoteInternal),
            (PARSE_ERROR, ErrorKind::Protocol),
            (-32000, ErrorKind::RemoteInternal),
        ];
        for (code, kind) in cases {
            let body = json!({"jsonrpc": "2.0", "id": 1, "error": {"code": code, "message": "boom"}}).to_string();
            let err = interpret_response(200, &body, "contacts_get-contacts", &scopes()).unwrap_err();
            assert_eq!(err.kind(), kind, "code {code}");
        }
    }

    #[test]
    fn test_malformed_rpc_error_still_fails() {
        let bodies = [
            json!({"jsonrpc": "2.0", "id": 1, "error": {"message": "boom"}}),
            json!({"error": "Invalid token"}),
            json!({"error": {"code": "oops", "message": "bad code"}}),
        ];
        for body in bodies {
            let err = interpret_response(200, &body.to_string(), "contacts_get-contacts", &scopes()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::RemoteInternal, "{body}");
        }
        let err = interpret_response(200, r#"{"error":{"message":"boom"}}"#, "contacts_get-contacts", &[]).unwrap_err();
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn test_null_result_is_returned_as_null() {
        let body = json!({"jsonrpc": "2.0", "id": 1, "result": null}).to_string();
        let v = interpret_response(200, &body, "contacts_remove-tags", &[]).unwrap();
        assert_eq!(v, Value::Null);
    }

    #[test]
    fn test_http_status_mapping() {
        let cases = [
            (400, ErrorKind::Validation),
            (401, ErrorKind::Auth),
            (403, ErrorKind::Scope),
            (404, ErrorKind::UnknownTool),
            (429, ErrorKind::RateLimit),
            (500, ErrorKind::RemoteInternal),
        ];
        for (status, kind) in cases {
            let err = interpret_response(status, "", "contacts_get-contacts", &scopes()).unwrap_err();
            assert_eq!(err.kind(), kind, "status {status}");
        }
    }

    #[test]
    fn test_forbidden_lists_required_scopes() {
        let err = interpret_response(403, "{}", "contacts_get-contacts", &scopes()).unwrap_err();
        assert!(matches!(err, ToolError::Scope { .. }));
        assert!(err.to_string().contains("View Contacts"));
    }

    #[test]
    fn test_bad_request_carries_remote_message() {
        let body = json!({"message": "contactId is required"}).to_string();
        let err = interpret_response(400, &body, "contacts_get-contact", &[]).unwrap_err();
        assert!(err.to_string().contains("contactId is required"));
    }

    #[test]
    fn test_invalid_json_is_protocol_error() {
        let err = interpret_response(200, "<html>oops</html>", "contacts_get-contacts", &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Protocol);
    }
}
