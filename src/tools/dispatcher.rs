//! 工具分发器
//!
//! 一条指令的所有调用并发执行：每个调用一个 task（JoinSet），全部结束后按原下标重排，
//! 保证输出与输入一一对应、顺序一致。单个调用失败只影响它自己的 ToolOutcome。
//! 每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Map, Value};
use tokio::task::JoinSet;
use tokio::time::timeout;

use crate::config::Credentials;
use crate::core::{NetworkFailure, ToolError};
use crate::protocol::RemoteClient;
use crate::tools::{enhance_arguments, PaginationDefaults, ToolCatalog, ToolInvocation, ToolOutcome};

/// 并发分发器：目录 + 远端客户端 + 分页默认值 + 单次调用超时
pub struct ToolDispatcher {
    catalog: Arc<ToolCatalog>,
    remote: Arc<dyn RemoteClient>,
    defaults: PaginationDefaults,
    timeout: Duration,
}

impl ToolDispatcher {
    pub fn new(
        catalog: Arc<ToolCatalog>,
        remote: Arc<dyn RemoteClient>,
        defaults: PaginationDefaults,
        timeout_secs: u64,
    ) -> Self {
        Self {
            catalog,
            remote,
            defaults,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 并发执行所有调用；返回与输入等长、同序的结果，从不整体失败
    pub async fn dispatch(&self, invocations: Vec<ToolInvocation>, credentials: &Credentials) -> Vec<ToolOutcome> {
        if invocations.is_empty() {
            return Vec::new();
        }

        let total = invocations.len();
        let mut slots: Vec<Option<ToolOutcome>> = vec![None; total];
        // 保留一份调用副本，task panic 时仍能构造失败结果
        let originals = invocations.clone();
        let mut set = JoinSet::new();

        for (index, invocation) in invocations.into_iter().enumerate() {
            let spec = self.catalog.get(&invocation.name).cloned();
            let remote = Arc::clone(&self.remote);
            let credentials = credentials.clone();
            let defaults = self.defaults;
            let limit = self.timeout;
            set.spawn(async move {
                let outcome = run_one(invocation, spec, remote, credentials, defaults, limit).await;
                (index, outcome)
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => tracing::error!(error = %e, "tool task aborted"),
            }
        }

        slots
            .into_iter()
            .zip(originals)
            .map(|(slot, invocation)| {
                slot.unwrap_or_else(|| {
                    ToolOutcome::failed(
                        invocation,
                        &ToolError::RemoteInternal("tool task aborted".to_string()),
                        0,
                    )
                })
            })
            .collect()
    }
}

async fn run_one(
    invocation: ToolInvocation,
    spec: Option<crate::tools::ToolSpec>,
    remote: Arc<dyn RemoteClient>,
    credentials: Credentials,
    defaults: PaginationDefaults,
    limit: Duration,
) -> ToolOutcome {
    let start = Instant::now();

    let result = match spec {
        None => Err(ToolError::UnknownTool(invocation.name.clone())),
        Some(spec) => match enhance_arguments(&spec, &invocation.arguments, defaults) {
            Err(e) => Err(e),
            Ok(arguments) => {
                let scopes = if invocation.required_scopes.is_empty() {
                    spec.scopes.clone()
                } else {
                    invocation.required_scopes.clone()
                };
                match timeout(limit, remote.call_tool(&invocation.name, arguments, &scopes, &credentials)).await {
                    Ok(r) => r,
                    Err(_) => Err(ToolError::network(
                        NetworkFailure::Timeout,
                        format!("no response within {}s", limit.as_secs()),
                    )),
                }
            }
        },
    };

    let elapsed = start.elapsed().as_millis() as u64;
    audit(&invocation, &result, elapsed);

    match result {
        Ok(value) => ToolOutcome::succeeded(invocation, value, elapsed),
        Err(e) => ToolOutcome::failed(invocation, &e, elapsed),
    }
}

fn audit(invocation: &ToolInvocation, result: &Result<Value, ToolError>, duration_ms: u64) {
    let (ok, outcome) = match result {
        Ok(_) => (true, "ok".to_string()),
        Err(e) => (false, e.kind().to_string()),
    };
    let audit = serde_json::json!({
        "event": "tool_audit",
        "tool": invocation.name,
        "ok": ok,
        "outcome": outcome,
        "duration_ms": duration_ms,
        "args_preview": args_preview(&invocation.arguments),
    });
    tracing::info!(audit = %audit.to_string(), "tool");
}

fn args_preview(args: &Map<String, Value>) -> String {
    let s = Value::Object(args.clone()).to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
