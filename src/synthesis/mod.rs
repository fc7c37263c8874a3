//! 响应合成：工具结果 → 一条业务报告
//!
//! 先抽取实体并计算洞察，把最近实体写回 UserContext；随后优先交给推理引擎写报告，
//! 引擎未配置 / 未提供 Key / 调用失败时回退到确定性模板。

pub mod extractors;
pub mod insights;
pub mod report;

use std::sync::Arc;

use chrono::Utc;

use crate::config::Credentials;
use crate::llm::{EngineMessage, EngineRequest, ReasoningEngine};
use crate::memory::UserContext;
use crate::tools::ToolOutcome;

pub use extractors::{extract_entities, unwrap_content, BusinessData, EntityKind, Extractor, EXTRACTORS};
pub use insights::{business_insights, format_money, summarize_success, InsightClock};
pub use report::{next_steps, outcome_line, render_report};

/// 合成结果
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    pub content: String,
    /// 至少一个调用成功
    pub success: bool,
    pub used_engine: bool,
}

pub struct ResponseSynthesizer {
    engine: Option<Arc<dyn ReasoningEngine>>,
    temperature: f32,
    max_tokens: u32,
    recency_days: i64,
    entity_cap: usize,
}

impl ResponseSynthesizer {
    pub fn new(
        engine: Option<Arc<dyn ReasoningEngine>>,
        temperature: f32,
        max_tokens: u32,
        recency_days: i64,
        entity_cap: usize,
    ) -> Self {
        Self {
            engine,
            temperature,
            max_tokens,
            recency_days,
            entity_cap,
        }
    }

    /// 只用模板渲染
    pub fn deterministic(recency_days: i64, entity_cap: usize) -> Self {
        Self::new(None, 0.3, 600, recency_days, entity_cap)
    }

    pub async fn synthesize(
        &self,
        command: &str,
        outcomes: &[ToolOutcome],
        user_context: &mut UserContext,
        credentials: &Credentials,
    ) -> Report {
        let clock = InsightClock::new(Utc::now(), self.recency_days);
        let data = BusinessData::from_outcomes(outcomes);
        let success = outcomes.iter().any(|o| o.success);

        if let Some(contacts) = &data.contacts {
            user_context.set_recent_contacts(contacts.clone(), self.entity_cap);
        }
        if let Some(opps) = &data.opportunities {
            user_context.set_active_opportunities(opps.clone(), self.entity_cap);
        }

        if let Some(engine) = self.engine.as_ref().filter(|_| credentials.reasoning_key().is_some()) {
            let prompt = engine_prompt(command, outcomes, &data, user_context, &clock);
            let request = EngineRequest {
                messages: vec![EngineMessage::user(prompt)],
                functions: Vec::new(),
                temperature: self.temperature,
                max_tokens: self.max_tokens,
            };
            match engine.complete(&request, credentials).await {
                Ok(reply) => {
                    if let Some(content) = reply.content.filter(|c| !c.trim().is_empty()) {
                        return Report {
                            content,
                            success,
                            used_engine: true,
                        };
                    }
                    tracing::warn!("synthesis reply was empty, using template report");
                }
                Err(e) => tracing::warn!(error = %e, "synthesis via engine failed, using template report"),
            }
        }

        Report {
            content: render_report(outcomes, &data, &clock),
            success,
            used_engine: false,
        }
    }
}

fn engine_prompt(
    command: &str,
    outcomes: &[ToolOutcome],
    data: &BusinessData,
    user_context: &UserContext,
    clock: &InsightClock,
) -> String {
    let actions = outcomes
        .iter()
        .map(|o| {
            if o.success {
                summarize_success(o, clock)
            } else {
                format!("❌ {}: Failed - {}", o.name(), o.error.as_deref().unwrap_or("Unknown error"))
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    let insights = business_insights(data, clock).join("\n");

    format!(
        "BUSINESS COMMAND: \"{command}\"\n\n\
EXECUTED ACTIONS:\n{actions}\n\n\
BUSINESS INSIGHTS:\n{insights}\n\n\
CONTEXT:\n\
- Recent contacts: {}\n\
- Active opportunities: {}\n\n\
INSTRUCTIONS:\n\
Write a business-focused response with a clear summary of what was accomplished, key metrics, \
actionable next steps and any patterns worth following up. Use short sections and bullet points.",
        user_context.recent_contacts.len(),
        user_context.active_opportunities.len()
    )
}
