//! 确定性报告渲染（推理引擎不可用或失败时使用）

use crate::synthesis::extractors::{BusinessData, EntityKind};
use crate::synthesis::insights::{business_insights, summarize_success, InsightClock};
use crate::tools::ToolOutcome;

/// 单条结果的行：成功走摘要，失败列出错误
pub fn outcome_line(outcome: &ToolOutcome, clock: &InsightClock) -> String {
    if outcome.success {
        summarize_success(outcome, clock)
    } else {
        format!(
            "❌ {}: {}",
            outcome.name(),
            outcome.error.as_deref().unwrap_or("Unknown error")
        )
    }
}

/// 按触及的实体类型给出下一步建议
pub fn next_steps(data: &BusinessData) -> Vec<&'static str> {
    let mut steps = Vec::new();
    for kind in data.touched() {
        match kind {
            EntityKind::Contacts => {
                steps.push("Review and tag new contacts for better organization");
                steps.push("Set up follow-up sequences for recent leads");
            }
            EntityKind::Opportunities => {
                steps.push("Update opportunity stages based on recent activities");
                steps.push("Schedule follow-up calls for high-value prospects");
            }
            EntityKind::Events => steps.push("Confirm today's appointments and send reminders"),
            EntityKind::Transactions => steps.push("Reconcile recent transactions and follow up on failed payments"),
            EntityKind::Conversations => steps.push("Reply to unread conversations"),
        }
    }
    if steps.is_empty() {
        steps.push("Try a more specific command to dig deeper into your business data");
    }
    steps
}

pub fn render_report(outcomes: &[ToolOutcome], data: &BusinessData, clock: &InsightClock) -> String {
    let successful = outcomes.iter().filter(|o| o.success).count();
    let failed = outcomes.len() - successful;

    let mut out = String::from("## Command Execution Summary\n\n");
    out.push_str(&format!("✅ **{successful} action(s) completed successfully**\n"));
    if failed > 0 {
        out.push_str(&format!("❌ **{failed} action(s) failed**\n"));
    }
    out.push('\n');

    let insights = business_insights(data, clock);
    if !insights.is_empty() {
        out.push_str("## Business Insights\n\n");
        for line in insights {
            out.push_str(&line);
            out.push('\n');
        }
        out.push('\n');
    }

    out.push_str("## Action Details\n\n");
    for outcome in outcomes {
        out.push_str(&outcome_line(outcome, clock));
        out.push('\n');
    }

    out.push_str("\n## Suggested Next Steps\n\n");
    for step in next_steps(data) {
        out.push_str("• ");
        out.push_str(step);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ToolError;
    use crate::tools::ToolInvocation;
    use chrono::Utc;
    use serde_json::{json, Map};

    #[test]
    fn test_report_sections() {
        let outcomes = vec![
            ToolOutcome::succeeded(
                ToolInvocation::new("contacts_get-contacts", Map::new(), vec![]),
                json!({"contacts": [{"id": "a", "tags": ["vip"]}]}),
                10,
            ),
            ToolOutcome::failed(
                ToolInvocation::new("opportunities_search-opportunity", Map::new(), vec![]),
                &ToolError::RateLimit,
                5,
            ),
        ];
        let data = BusinessData::from_outcomes(&outcomes);
        let report = render_report(&outcomes, &data, &InsightClock::new(Utc::now(), 7));
        assert!(report.starts_with("## Command Execution Summary"));
        assert!(report.contains("✅ **1 action(s) completed successfully**"));
        assert!(report.contains("❌ **1 action(s) failed**"));
        assert!(report.contains("## Business Insights"));
        assert!(report.contains("✅ Found 1 contacts"));
        assert!(report.contains("❌ opportunities_search-opportunity: Rate limit"));
        assert!(report.contains("• Review and tag new contacts"));
        assert!(!report.contains("Update opportunity stages"));
    }

    #[test]
    fn test_no_entities_gets_generic_step() {
        let data = BusinessData::default();
        assert_eq!(next_steps(&data).len(), 1);
        let report = render_report(&[], &data, &InsightClock::new(Utc::now(), 7));
        assert!(!report.contains("## Business Insights"));
        assert!(!report.contains("failed"));
    }
}
