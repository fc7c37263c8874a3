//! 指令规划：自然语言指令 → 零或多个工具调用，或直接文本回答
//!
//! 向推理引擎发送 system 指令（能力分类、完整工具目录及权限、工作流启发、最近历史与用户上下文）、
//! 最近历史窗口与用户指令，并附带 function 列表。引擎提议的参数是字符串化 JSON，必须解析为对象；
//! 任一提议解析失败则整条指令以 PlanningError 中止，不会部分执行。

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::config::Credentials;
use crate::core::AgentError;
use crate::llm::{EngineMessage, EngineRequest, ProposedCall, ReasoningEngine};
use crate::memory::{ConversationMemory, HistoryEntry, Role, UserContext};
use crate::tools::{ToolCatalog, ToolInvocation};

/// 规划结果
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Plan {
    pub content: Option<String>,
    pub tool_calls: Vec<ToolInvocation>,
}

impl Plan {
    pub fn is_direct_answer(&self) -> bool {
        self.tool_calls.is_empty()
    }
}

pub struct CommandPlanner {
    engine: Arc<dyn ReasoningEngine>,
    temperature: f32,
    max_tokens: u32,
}

impl CommandPlanner {
    pub fn new(engine: Arc<dyn ReasoningEngine>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            engine,
            temperature,
            max_tokens,
        }
    }

    /// 纯规划，不触碰记忆
    pub async fn plan(
        &self,
        command: &str,
        catalog: &ToolCatalog,
        history: &[HistoryEntry],
        user_context: &UserContext,
        credentials: &Credentials,
    ) -> Result<Plan, AgentError> {
        let mut messages = vec![EngineMessage::system(system_directive(catalog, history, user_context))];
        messages.extend(history.iter().map(|entry| match entry.role {
            Role::User => EngineMessage::user(entry.content.clone()),
            Role::Assistant => EngineMessage::assistant(entry.content.clone()),
        }));
        messages.push(EngineMessage::user(command));

        let request = EngineRequest {
            messages,
            functions: catalog.functions(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        tracing::info!(command_len = command.len(), tools = catalog.len(), history = history.len(), "planning command");
        let reply = self.engine.complete(&request, credentials).await?;

        let tool_calls = reply
            .tool_calls
            .iter()
            .map(|call| parse_proposal(call, catalog))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(proposed = tool_calls.len(), has_content = reply.content.is_some(), "plan ready");
        Ok(Plan {
            content: reply.content.filter(|c| !c.trim().is_empty()),
            tool_calls,
        })
    }

    /// 规划并写入记忆：窗口在写入前截取；只有解析成功才追加用户轮与原始提议
    pub async fn plan_into(
        &self,
        command: &str,
        catalog: &ToolCatalog,
        memory: &mut ConversationMemory,
        window: usize,
        credentials: &Credentials,
    ) -> Result<Plan, AgentError> {
        let history = memory.recent_window(window).to_vec();
        let plan = self
            .plan(command, catalog, &history, memory.user_context(), credentials)
            .await?;

        memory.append(HistoryEntry::user(command));
        let proposal = (!plan.tool_calls.is_empty()).then(|| plan.tool_calls.clone());
        memory.append(HistoryEntry::assistant(
            plan.content.clone().unwrap_or_default(),
            proposal,
        ));
        Ok(plan)
    }
}

/// 解析单个提议；空参数视为 `{}`，非对象或非法 JSON 为 PlanningError
fn parse_proposal(call: &ProposedCall, catalog: &ToolCatalog) -> Result<ToolInvocation, AgentError> {
    let raw = call.arguments.trim();
    let arguments: Map<String, Value> = if raw.is_empty() {
        Map::new()
    } else {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                return Err(AgentError::Planning {
                    tool: call.name.clone(),
                    reason: format!("expected an object, got {}", json_type(&other)),
                })
            }
            Err(e) => {
                return Err(AgentError::Planning {
                    tool: call.name.clone(),
                    reason: e.to_string(),
                })
            }
        }
    };
    Ok(ToolInvocation::new(
        call.name.clone(),
        arguments,
        catalog.scopes_for(&call.name),
    ))
}

fn json_type(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

const CAPABILITIES: &str = "\
- Contact Management (search, create, update, tag, tasks)
- Conversation & Messaging (SMS, email, chat history)
- Opportunity Management (pipeline tracking, stage updates)
- Calendar & Appointments (events, appointment notes)
- Payment Processing (orders, transactions)
- Location Data (business details, custom fields)";

const WORKFLOWS: &str = "\
1. Lead Management: Contact search → Tag/segment → Follow-up sequence
2. Sales Pipeline: Opportunity search → Stage progression → Deal closure
3. Customer Service: Message response → Issue resolution → Follow-up
4. Appointment Setting: Calendar check → Booking → Confirmation
5. Payment Processing: Order lookup → Transaction tracking → Fulfillment";

/// 构造 system 指令
pub fn system_directive(catalog: &ToolCatalog, history: &[HistoryEntry], user_context: &UserContext) -> String {
    let tools = catalog
        .iter()
        .map(|t| format!("{}: {} (Required scopes: {})", t.name, t.description, t.scopes.join(", ")))
        .collect::<Vec<_>>()
        .join("\n");
    let history_json = serde_json::to_string(history).unwrap_or_else(|_| "[]".to_string());
    let context_json = serde_json::to_string(user_context).unwrap_or_else(|_| "{}".to_string());

    format!(
        "You are a business assistant that manages a CRM on behalf of a business owner.\n\n\
CORE CAPABILITIES:\n{CAPABILITIES}\n\n\
WORKFLOW INTELLIGENCE:\n{WORKFLOWS}\n\n\
SMART PARAMETER INFERENCE:\n\
- Use context from previous commands to fill missing parameters\n\
- Reference recent contacts/opportunities when IDs are needed\n\
- Batch related operations in a single response when they are independent\n\n\
CONVERSATION CONTEXT:\n\
Recent conversation history: {history_json}\n\
User context: {context_json}\n\n\
AVAILABLE TOOLS:\n{tools}\n\n\
Call tools when the request needs business data or changes; otherwise answer directly and concisely."
    )
}
