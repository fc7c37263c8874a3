//! 指令编排器：主控流程
//!
//! 负责：校验前置条件（凭据）、单飞（同一时刻只处理一条指令，忙时直接拒绝而非排队）、
//! 依次驱动 Planner → Dispatcher → Synthesizer，并在各阶段更新对话记忆、消息日志、性能统计与连接状态。
//! 状态快照通过 watch 通道发布给前端。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use serde_json::Map;
use tokio::sync::{watch, Mutex};

use crate::config::{AppConfig, AssistantSettings, Credentials, SettingsPatch};
use crate::core::{AgentError, ConnectionMonitor, ConnectionState, ErrorKind, PerformanceMetrics, StatusSnapshot};
use crate::llm::ReasoningEngine;
use crate::memory::persistence::{clear_messages, clear_settings, load_messages, save_messages, save_settings};
use crate::memory::{
    CommandMetrics, ConversationMemory, ConversationSummary, ExportBundle, HistoryEntry, KeyValueStore, Message,
    MessageLog, MessageStatus,
};
use crate::planner::CommandPlanner;
use crate::protocol::RemoteClient;
use crate::synthesis::ResponseSynthesizer;
use crate::tools::{EndpointInfo, PaginationDefaults, ToolCatalog, ToolDispatcher, ToolInvocation, ToolOutcome};

pub const MISSING_CREDENTIALS_MESSAGE: &str = "Please configure your API keys in Settings first.";
pub const DIRECT_ANSWER_FALLBACK: &str =
    "I understand your request, but I need more specific information to help you.";
pub const PROBE_TOOL: &str = "locations_get-location";

/// 进程级会话状态；只由编排器修改
struct SessionState {
    memory: ConversationMemory,
    messages: MessageLog,
    metrics: PerformanceMetrics,
    connection: ConnectionMonitor,
}

/// 单飞标志的 RAII 守卫
struct BusyGuard<'a>(&'a AtomicBool);

impl<'a> BusyGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct CommandOrchestrator {
    catalog: Arc<ToolCatalog>,
    planner: CommandPlanner,
    dispatcher: ToolDispatcher,
    synthesizer: ResponseSynthesizer,
    store: Arc<dyn KeyValueStore>,
    settings: RwLock<AssistantSettings>,
    busy: AtomicBool,
    state: Mutex<SessionState>,
    status_tx: watch::Sender<StatusSnapshot>,
    prompt_window: usize,
    endpoint: String,
}

impl CommandOrchestrator {
    /// 组装服务实例；消息日志从 store 恢复
    pub fn new(
        config: &AppConfig,
        catalog: ToolCatalog,
        engine: Arc<dyn ReasoningEngine>,
        remote: Arc<dyn RemoteClient>,
        store: Arc<dyn KeyValueStore>,
        settings: AssistantSettings,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let planner = CommandPlanner::new(
            Arc::clone(&engine),
            config.llm.planner_temperature,
            config.llm.planner_max_tokens,
        );
        let dispatcher = ToolDispatcher::new(
            Arc::clone(&catalog),
            remote,
            PaginationDefaults {
                limit: config.dispatch.default_limit,
                offset: config.dispatch.default_offset,
            },
            config.remote.timeout_secs,
        );
        let synthesizer = ResponseSynthesizer::new(
            config.synthesis.use_engine.then_some(engine),
            config.llm.synthesis_temperature,
            config.llm.synthesis_max_tokens,
            config.synthesis.recency_days,
            config.app.context_entity_cap,
        );

        let restored = load_messages(store.as_ref()).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to restore messages, starting empty");
            Vec::new()
        });
        tracing::info!(messages = restored.len(), tools = catalog.len(), "orchestrator ready");

        let state = SessionState {
            memory: ConversationMemory::new(config.app.history_limit),
            messages: MessageLog::from_messages(restored),
            metrics: PerformanceMetrics::default(),
            connection: ConnectionMonitor::new(),
        };
        let initial = StatusSnapshot {
            message_count: state.messages.len(),
            ..StatusSnapshot::default()
        };
        let (status_tx, _) = watch::channel(initial);

        Self {
            catalog,
            planner,
            dispatcher,
            synthesizer,
            store,
            settings: RwLock::new(settings),
            busy: AtomicBool::new(false),
            state: Mutex::new(state),
            status_tx,
            prompt_window: config.app.prompt_window,
            endpoint: config.remote.endpoint.clone(),
        }
    }

    /// 处理一条指令，返回最终的助手消息；已有指令在处理时返回 Busy 且不产生任何副作用
    pub async fn process_command(&self, command: &str) -> Result<Message, AgentError> {
        let guard = BusyGuard::acquire(&self.busy).ok_or(AgentError::Busy)?;
        // 配置在本条指令期间只读
        let credentials = self.credentials();
        let message = self.run_command(command.trim(), &credentials).await;
        drop(guard);
        self.publish().await;
        Ok(message)
    }

    async fn run_command(&self, command: &str, credentials: &Credentials) -> Message {
        if let Err(err) = require_credentials(credentials) {
            tracing::warn!(error = %err, "command rejected");
            let msg = Message::assistant(render_failure(&err), MessageStatus::Error);
            self.append_message(msg.clone()).await;
            return msg;
        }

        let start = Instant::now();
        {
            let mut state = self.state.lock().await;
            state.messages.append(Message::user(command));
            state.connection.begin_attempt();
            self.persist(&state.messages);
        }
        self.publish().await;

        let mut memory = self.state.lock().await.memory.clone();
        let plan = match self
            .planner
            .plan_into(command, &self.catalog, &mut memory, self.prompt_window, credentials)
            .await
        {
            Ok(plan) => plan,
            Err(e) => return self.fail_command(e, start).await,
        };

        if plan.is_direct_answer() {
            let content = plan.content.unwrap_or_else(|| DIRECT_ANSWER_FALLBACK.to_string());
            let msg = Message::assistant(content, MessageStatus::Info);
            let mut state = self.state.lock().await;
            state.memory = memory;
            state.metrics.record(elapsed_ms(start), true);
            state.connection.succeed();
            state.messages.append(msg.clone());
            self.persist(&state.messages);
            return msg;
        }

        let outcomes = self.dispatcher.dispatch(plan.tool_calls, credentials).await;
        let report = self
            .synthesizer
            .synthesize(command, &outcomes, memory.user_context_mut(), credentials)
            .await;

        if report.success && outcomes.len() > 1 {
            memory.user_context_mut().remember_pattern(pattern_of(&outcomes));
        }
        memory.append(HistoryEntry::assistant(report.content.clone(), None));

        let elapsed = elapsed_ms(start);
        let successful = outcomes.iter().filter(|o| o.success).count();
        let first_error = outcomes.iter().find_map(|o| o.error.clone());
        let command_metrics = CommandMetrics {
            total_actions: outcomes.len(),
            successful_actions: successful,
            execution_time_ms: elapsed,
        };
        let status = if report.success {
            MessageStatus::Success
        } else {
            MessageStatus::Error
        };
        let msg = Message::assistant(report.content, status)
            .with_tool_calls(outcomes)
            .with_metrics(command_metrics);

        tracing::info!(
            total = command_metrics.total_actions,
            successful,
            elapsed_ms = elapsed,
            engine_report = report.used_engine,
            "command completed"
        );

        let mut state = self.state.lock().await;
        state.memory = memory;
        state.metrics.record(elapsed, report.success);
        if successful == 0 {
            state
                .connection
                .fail(first_error.unwrap_or_else(|| "All actions failed".to_string()));
        } else {
            state.connection.succeed();
        }
        state.messages.append(msg.clone());
        self.persist(&state.messages);
        msg
    }

    /// 规划 / 引擎阶段的指令级失败：渲染为一条错误消息，连接置为 error，计入失败
    async fn fail_command(&self, err: AgentError, start: Instant) -> Message {
        tracing::error!(error = %err, kind = %err.kind(), "command failed");
        let msg = Message::assistant(render_failure(&err), MessageStatus::Error);
        let mut state = self.state.lock().await;
        state.connection.fail(err.to_string());
        state.metrics.record(elapsed_ms(start), false);
        state.messages.append(msg.clone());
        self.persist(&state.messages);
        msg
    }

    /// 连接探测：用无参数的位置查询验证令牌与端点
    pub async fn probe(&self) -> ConnectionState {
        let credentials = self.credentials();
        if credentials.business_token().is_none() {
            let mut state = self.state.lock().await;
            state
                .connection
                .disconnect(Some("No business-system token configured".to_string()));
            drop(state);
            self.publish().await;
            return ConnectionState::Disconnected;
        }

        self.state.lock().await.connection.begin_attempt();
        self.publish().await;

        let invocation = ToolInvocation::new(PROBE_TOOL, Map::new(), self.catalog.scopes_for(PROBE_TOOL));
        let outcomes = self.dispatcher.dispatch(vec![invocation], &credentials).await;

        let mut state = self.state.lock().await;
        match outcomes.first() {
            Some(o) if o.success => state.connection.succeed(),
            Some(o) => state
                .connection
                .fail(o.error.clone().unwrap_or_else(|| "probe failed".to_string())),
            None => state.connection.fail("probe produced no outcome"),
        }
        let current = state.connection.state().clone();
        drop(state);
        tracing::info!(state = current.label(), "connection probe finished");
        self.publish().await;
        current
    }

    /// 清空消息日志与对话记忆（含 UserContext）；性能统计保留
    pub async fn clear(&self) -> Result<(), AgentError> {
        let guard = BusyGuard::acquire(&self.busy).ok_or(AgentError::Busy)?;
        {
            let mut state = self.state.lock().await;
            state.messages.clear();
            state.memory.clear();
        }
        clear_messages(self.store.as_ref()).map_err(|e| AgentError::Store(e.to_string()))?;
        tracing::info!("messages and conversation history cleared");
        drop(guard);
        self.publish().await;
        Ok(())
    }

    pub async fn export(&self) -> ExportBundle {
        let state = self.state.lock().await;
        let settings = self.settings_snapshot();
        ExportBundle::new(state.messages.messages().to_vec(), state.metrics.clone(), &settings)
    }

    /// 用导出包中的消息替换当前日志（id 与顺序不变）
    pub async fn import_messages(&self, bundle: ExportBundle) -> Result<usize, AgentError> {
        let guard = BusyGuard::acquire(&self.busy).ok_or(AgentError::Busy)?;
        let count = bundle.messages.len();
        {
            let mut state = self.state.lock().await;
            state.messages.replace(bundle.messages);
            save_messages(self.store.as_ref(), state.messages.messages())
                .map_err(|e| AgentError::Store(e.to_string()))?;
        }
        tracing::info!(count, "messages imported");
        drop(guard);
        self.publish().await;
        Ok(count)
    }

    /// 合并并持久化设置；从下一条指令起生效
    pub fn update_settings(&self, patch: SettingsPatch) -> Result<AssistantSettings, AgentError> {
        let updated = {
            let mut settings = self.settings.write().unwrap_or_else(|e| e.into_inner());
            settings.apply(patch);
            settings.clone()
        };
        save_settings(self.store.as_ref(), &updated).map_err(|e| AgentError::Store(e.to_string()))?;
        tracing::info!(configured = updated.is_configured(), "settings updated");
        Ok(updated)
    }

    /// 恢复默认设置并删除持久化的键
    pub fn reset_settings(&self) -> Result<(), AgentError> {
        *self.settings.write().unwrap_or_else(|e| e.into_inner()) = AssistantSettings::default();
        clear_settings(self.store.as_ref()).map_err(|e| AgentError::Store(e.to_string()))
    }

    pub fn settings_snapshot(&self) -> AssistantSettings {
        self.settings.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn credentials(&self) -> Credentials {
        self.settings_snapshot().credentials()
    }

    pub async fn conversation_summary(&self) -> ConversationSummary {
        ConversationSummary::of(self.state.lock().await.messages.messages())
    }

    pub async fn messages(&self) -> Vec<Message> {
        self.state.lock().await.messages.messages().to_vec()
    }

    pub async fn history(&self) -> Vec<HistoryEntry> {
        self.state.lock().await.memory.entries().to_vec()
    }

    pub async fn user_context(&self) -> crate::memory::UserContext {
        self.state.lock().await.memory.user_context().clone()
    }

    pub async fn metrics(&self) -> PerformanceMetrics {
        self.state.lock().await.metrics.clone()
    }

    pub async fn connection_state(&self) -> ConnectionState {
        self.state.lock().await.connection.state().clone()
    }

    pub fn is_processing(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    pub fn catalog(&self) -> &ToolCatalog {
        &self.catalog
    }

    pub fn endpoint_info(&self) -> EndpointInfo {
        self.catalog.endpoint_info(&self.endpoint)
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.status_tx.subscribe()
    }

    async fn append_message(&self, msg: Message) {
        let mut state = self.state.lock().await;
        state.messages.append(msg);
        self.persist(&state.messages);
    }

    fn persist(&self, log: &MessageLog) {
        if let Err(e) = save_messages(self.store.as_ref(), log.messages()) {
            tracing::warn!(error = %e, "failed to persist messages");
        }
    }

    async fn publish(&self) {
        let state = self.state.lock().await;
        let snapshot = StatusSnapshot {
            processing: self.is_processing(),
            connection: state.connection.state().clone(),
            last_error: state.connection.last_error().map(str::to_string),
            metrics: state.metrics.clone(),
            message_count: state.messages.len(),
        };
        self.status_tx.send_replace(snapshot);
    }
}

/// 业务令牌与推理 Key 都必须存在
fn require_credentials(credentials: &Credentials) -> Result<(), AgentError> {
    let missing: Vec<&str> = [
        ("business-system token", credentials.business_token().is_none()),
        ("reasoning API key", credentials.reasoning_key().is_none()),
    ]
    .into_iter()
    .filter_map(|(name, absent)| absent.then_some(name))
    .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AgentError::MissingCredentials(missing.join(", ")))
    }
}

/// 指令级错误 → 用户可见文本
pub fn render_failure(err: &AgentError) -> String {
    if let AgentError::MissingCredentials(_) = err {
        return MISSING_CREDENTIALS_MESSAGE.to_string();
    }
    match err.kind() {
        ErrorKind::Auth => "Authentication failed. Please check your business-system token in Settings.".to_string(),
        ErrorKind::RateLimit => "Rate limit exceeded. Please wait a moment and try again.".to_string(),
        ErrorKind::Network(_) => "Network error. Please check your connection and try again.".to_string(),
        _ => format!("Error: {err}"),
    }
}

/// 工具序列，如 `contacts_get-contacts → contacts_add-tags`
fn pattern_of(outcomes: &[ToolOutcome]) -> String {
    outcomes.iter().map(ToolOutcome::name).collect::<Vec<_>>().join(" → ")
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{NetworkFailure, ToolError};
    use crate::llm::LlmError;

    #[test]
    fn test_render_failure_categories() {
        assert!(render_failure(&AgentError::Engine(LlmError::Api(
            "Incorrect API key provided: sk-***".to_string()
        )))
        .starts_with("Authentication failed"));
        assert!(render_failure(&AgentError::Engine(LlmError::Api(
            "Rate limit reached for gpt-4 in organization".to_string()
        )))
        .starts_with("Rate limit exceeded"));
        assert!(render_failure(&AgentError::Engine(LlmError::Timeout)).starts_with("Network error"));
        let planning = AgentError::Planning {
            tool: "contacts_add-tags".into(),
            reason: "bad".into(),
        };
        assert!(render_failure(&planning).starts_with("Error: Planning failed"));
    }

    #[test]
    fn test_missing_credentials_named_and_rendered() {
        let err = require_credentials(&Credentials::new(None, Some("loc"), Some("sk"))).unwrap_err();
        assert!(matches!(&err, AgentError::MissingCredentials(m) if m == "business-system token"));
        assert_eq!(render_failure(&err), MISSING_CREDENTIALS_MESSAGE);
        let err = require_credentials(&Credentials::default()).unwrap_err();
        assert!(err.to_string().contains("business-system token, reasoning API key"));
        assert!(require_credentials(&Credentials::new(Some("pit"), None, Some("sk"))).is_ok());
    }

    #[test]
    fn test_busy_guard_is_exclusive() {
        let flag = AtomicBool::new(false);
        let g = BusyGuard::acquire(&flag).unwrap();
        assert!(BusyGuard::acquire(&flag).is_none());
        drop(g);
        assert!(BusyGuard::acquire(&flag).is_some());
    }

    #[test]
    fn test_pattern_string() {
        let outcomes = vec![
            ToolOutcome::succeeded(ToolInvocation::new("a_one", Map::new(), vec![]), serde_json::json!({}), 1),
            ToolOutcome::failed(
                ToolInvocation::new("b_two", Map::new(), vec![]),
                &ToolError::network(NetworkFailure::Timeout, "t"),
                1,
            ),
        ];
        assert_eq!(pattern_of(&outcomes), "a_one → b_two");
    }
}
