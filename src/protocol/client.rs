//! 远端业务系统客户端
//!
//! RemoteClient 是 Dispatcher 与具体传输之间的接缝；HttpRemoteClient 把一次工具调用包成 JSON-RPC 信封 POST 到端点，
//! 每次调用带固定超时，响应交给 translate 模块翻译为结果或 ToolError。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde_json::{Map, Value};

use crate::config::{Credentials, RemoteSection};
use crate::core::ToolError;
use crate::protocol::envelope::RpcRequest;
use crate::protocol::translate::{classify_transport, interpret_response};

/// 远端工具调用；scopes 仅用于 403 时生成错误信息
#[async_trait]
pub trait RemoteClient: Send + Sync {
    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        scopes: &[String],
        credentials: &Credentials,
    ) -> Result<Value, ToolError>;
}

/// HTTP 实现：单一 POST 端点 + Bearer 令牌 + 可选租户头
pub struct HttpRemoteClient {
    client: Client,
    endpoint: String,
    protocol_version: String,
    tenant_header: HeaderName,
}

impl HttpRemoteClient {
    pub fn new(section: &RemoteSection) -> Result<Self, ToolError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(section.timeout_secs))
            .build()
            .map_err(|e| ToolError::Protocol(format!("failed to build HTTP client: {e}")))?;
        let tenant_header = HeaderName::from_bytes(section.tenant_header.as_bytes())
            .map_err(|e| ToolError::Protocol(format!("invalid tenant header name: {e}")))?;
        Ok(Self {
            client,
            endpoint: section.endpoint.clone(),
            protocol_version: section.protocol_version.clone(),
            tenant_header,
        })
    }
}

#[async_trait]
impl RemoteClient for HttpRemoteClient {
    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        scopes: &[String],
        credentials: &Credentials,
    ) -> Result<Value, ToolError> {
        let token = credentials.business_token().ok_or(ToolError::Auth)?;
        let bearer = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| ToolError::Auth)?;

        let envelope = RpcRequest::tool_call(&self.protocol_version, name, arguments);
        tracing::debug!(
            tool = name,
            id = envelope.id,
            endpoint = %self.endpoint,
            authorization = "[REDACTED]",
            "sending tool call"
        );

        let mut request = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json, text/event-stream")
            .header(AUTHORIZATION, bearer)
            .json(&envelope);
        if let Some(tenant) = credentials.tenant_id() {
            if let Ok(value) = HeaderValue::from_str(tenant) {
                request = request.header(self.tenant_header.clone(), value);
            }
        }

        let response = request.send().await.map_err(|e| classify_transport(&e))?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| classify_transport(&e))?;

        tracing::debug!(tool = name, status, body_len = body.len(), "tool call response");
        interpret_response(status, &body, name, scopes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ErrorKind, NetworkFailure};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn section(endpoint: String, timeout_secs: u64) -> RemoteSection {
        RemoteSection {
            endpoint,
            timeout_secs,
            ..RemoteSection::default()
        }
    }

    fn creds() -> Credentials {
        Credentials::new(Some("pit-test"), Some("loc-1"), None)
    }

    /// 单次应答的本地 HTTP 服务：返回收到的原始请求文本
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 16 * 1024];
            let mut received = Vec::new();
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                received.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&received).to_string();
                if let Some(idx) = text.find("\r\n\r\n") {
                    let len = text
                        .lines()
                        .find_map(|l| {
                            l.to_ascii_lowercase()
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap_or(0))
                        })
                        .unwrap_or(0);
                    if received.len() >= idx + 4 + len {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!(
                "{status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            String::from_utf8_lossy(&received).to_string()
        });
        (format!("http://{addr}/mcp/"), handle)
    }

    #[tokio::test]
    async fn test_sends_envelope_and_headers() {
        let (url, server) = serve_once("HTTP/1.1 200 OK", r#"{"jsonrpc":"2.0","id":1,"result":{"contacts":[]}}"#).await;
        let client = HttpRemoteClient::new(&section(url, 5)).unwrap();
        let result = client
            .call_tool("contacts_get-contacts", Map::new(), &[], &creds())
            .await
            .unwrap();
        assert!(result["contacts"].is_array());

        let raw = server.await.unwrap();
        let lower = raw.to_ascii_lowercase();
        assert!(lower.contains("authorization: bearer pit-test"));
        assert!(lower.contains("locationid: loc-1"));
        assert!(raw.contains("\"method\":\"tools/call\""));
        assert!(raw.contains("\"name\":\"contacts_get-contacts\""));
    }

    #[tokio::test]
    async fn test_forbidden_maps_to_scope_error() {
        let (url, _server) = serve_once("HTTP/1.1 403 Forbidden", r#"{"message":"forbidden"}"#).await;
        let client = HttpRemoteClient::new(&section(url, 5)).unwrap();
        let err = client
            .call_tool(
                "contacts_get-contacts",
                Map::new(),
                &["View Contacts".to_string()],
                &creds(),
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Scope);
        assert!(err.to_string().contains("View Contacts"));
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _holder = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(socket);
        });

        let client = HttpRemoteClient::new(&section(format!("http://{addr}/mcp/"), 1)).unwrap();
        let err = client
            .call_tool("contacts_get-contacts", Map::new(), &[], &creds())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Network(NetworkFailure::Timeout));
    }

    #[tokio::test]
    async fn test_closed_port_is_network_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = HttpRemoteClient::new(&section(format!("http://{addr}/mcp/"), 5)).unwrap();
        let err = client
            .call_tool("contacts_get-contacts", Map::new(), &[], &creds())
            .await
            .unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::Network(NetworkFailure::Refused) | ErrorKind::Network(NetworkFailure::Unreachable)
        ));
    }

    #[tokio::test]
    async fn test_missing_token_is_auth_error() {
        let client = HttpRemoteClient::new(&section("http://127.0.0.1:9/mcp/".to_string(), 5)).unwrap();
        let err = client
            .call_tool("contacts_get-contacts", Map::new(), &[], &Credentials::default())
            .await
            .unwrap_err();
        assert_eq!(err, ToolError::Auth);
    }
}
