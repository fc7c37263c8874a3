//! 业务洞察与单条结果摘要
//!
//! 计数、近期窗口（默认 7 天）、金额合计、阶段分布。所有函数显式接收 `now`，便于测试。

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

use crate::synthesis::extractors::{extract_entities, unwrap_content, BusinessData, EntityKind};
use crate::tools::{parse_date, ToolOutcome};

/// 时间窗口参数
#[derive(Clone, Copy, Debug)]
pub struct InsightClock {
    pub now: DateTime<Utc>,
    pub recency_days: i64,
}

impl InsightClock {
    pub fn new(now: DateTime<Utc>, recency_days: i64) -> Self {
        Self { now, recency_days }
    }

    fn is_recent(&self, v: Option<&Value>) -> bool {
        let cutoff = self.now - Duration::days(self.recency_days);
        v.and_then(parse_date).is_some_and(|dt| dt > cutoff)
    }

    fn is_today(&self, v: Option<&Value>) -> bool {
        v.and_then(parse_date)
            .is_some_and(|dt| dt.date_naive() == self.now.date_naive())
    }
}

/// `$1,234` / `$1,234.50`
pub fn format_money(amount: f64) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let frac = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if negative { "-" } else { "" };
    if frac == 0 {
        format!("{sign}${grouped}")
    } else {
        format!("{sign}${grouped}.{frac:02}")
    }
}

fn sum_field(items: &[Value], field: &str) -> f64 {
    items
        .iter()
        .filter_map(|i| i.get(field).and_then(Value::as_f64))
        .sum()
}

fn count_recent(items: &[Value], clock: &InsightClock) -> usize {
    items.iter().filter(|c| clock.is_recent(c.get("dateAdded"))).count()
}

fn count_today(items: &[Value], clock: &InsightClock) -> usize {
    items.iter().filter(|e| clock.is_today(e.get("startTime"))).count()
}

fn count_unread(items: &[Value]) -> usize {
    items
        .iter()
        .filter(|c| c.get("unreadCount").and_then(Value::as_u64).is_some_and(|n| n > 0))
        .count()
}

fn count_tagged(items: &[Value]) -> usize {
    items
        .iter()
        .filter(|c| c.get("tags").and_then(Value::as_array).is_some_and(|t| !t.is_empty()))
        .count()
}

/// 按 status 统计的阶段分布（名称有序）
pub fn stage_distribution(opportunities: &[Value]) -> BTreeMap<String, usize> {
    let mut stages = BTreeMap::new();
    for opp in opportunities {
        let stage = opp
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();
        *stages.entry(stage).or_insert(0) += 1;
    }
    stages
}

/// 洞察行
pub fn business_insights(data: &BusinessData, clock: &InsightClock) -> Vec<String> {
    let mut insights = Vec::new();

    if let Some(contacts) = &data.contacts {
        insights.push(format!(
            "📊 Contact Analysis: {} total, {} added this week, {} tagged",
            contacts.len(),
            count_recent(contacts, clock),
            count_tagged(contacts)
        ));
    }

    if let Some(opps) = &data.opportunities {
        let stages = stage_distribution(opps)
            .into_iter()
            .map(|(stage, count)| format!("{count} in {stage}"))
            .collect::<Vec<_>>();
        let mut line = format!(
            "💰 Pipeline Analysis: {} total value",
            format_money(sum_field(opps, "monetaryValue"))
        );
        if !stages.is_empty() {
            line.push_str(", ");
            line.push_str(&stages.join(", "));
        }
        insights.push(line);
    }

    if let Some(events) = &data.events {
        insights.push(format!(
            "📅 Calendar: {} events, {} today",
            events.len(),
            count_today(events, clock)
        ));
    }

    if let Some(transactions) = &data.transactions {
        insights.push(format!(
            "💳 Transactions: {} total, {} processed",
            transactions.len(),
            format_money(sum_field(transactions, "amount"))
        ));
    }

    if let Some(conversations) = &data.conversations {
        insights.push(format!(
            "💬 Conversations: {} total, {} unread",
            conversations.len(),
            count_unread(conversations)
        ));
    }

    insights
}

/// 单条成功结果的一行摘要
pub fn summarize_success(outcome: &ToolOutcome, clock: &InsightClock) -> String {
    let name = outcome.name();
    let Some(raw) = outcome.result.as_ref() else {
        return format!("✅ {name}: Operation completed successfully");
    };
    let result = unwrap_content(raw);

    if let Some((kind, items)) = extract_entities(&result) {
        let n = items.len();
        return match kind {
            EntityKind::Contacts => {
                let recent = count_recent(&items, clock);
                with_suffix(format!("✅ Found {n} contacts"), recent > 0, || format!("{recent} added this week"))
            }
            EntityKind::Opportunities => {
                let total = sum_field(&items, "monetaryValue");
                with_suffix(format!("✅ Found {n} opportunities"), total > 0.0, || {
                    format!("Total value: {}", format_money(total))
                })
            }
            EntityKind::Events => {
                let today = count_today(&items, clock);
                with_suffix(format!("✅ Found {n} events"), today > 0, || format!("{today} today"))
            }
            EntityKind::Transactions => {
                let total = sum_field(&items, "amount");
                with_suffix(format!("✅ Found {n} transactions"), total > 0.0, || {
                    format!("Total: {}", format_money(total))
                })
            }
            EntityKind::Conversations => {
                let unread = count_unread(&items);
                with_suffix(format!("✅ Found {n} conversations"), unread > 0, || format!("{unread} unread"))
            }
        };
    }

    match &*result {
        Value::Object(map) => match map.get("id") {
            Some(id) => format!(
                "✅ {name}: Operation completed successfully (ID: {})",
                id.as_str().map(str::to_string).unwrap_or_else(|| id.to_string())
            ),
            None => format!("✅ {name}: Operation completed successfully"),
        },
        Value::String(s) => format!("✅ {name}: {}", s.chars().take(100).collect::<String>()),
        other => format!("✅ {name}: {}", other.to_string().chars().take(100).collect::<String>()),
    }
}

fn with_suffix(base: String, cond: bool, suffix: impl FnOnce() -> String) -> String {
    if cond {
        format!("{base} ({})", suffix())
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolInvocation;
    use chrono::TimeZone;
    use serde_json::{json, Map};

    fn clock() -> InsightClock {
        InsightClock::new(Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap(), 7)
    }

    fn ok(name: &str, result: Value) -> ToolOutcome {
        ToolOutcome::succeeded(ToolInvocation::new(name, Map::new(), vec![]), result, 1)
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(0.0), "$0");
        assert_eq!(format_money(1234.0), "$1,234");
        assert_eq!(format_money(1234567.5), "$1,234,567.50");
        assert_eq!(format_money(999.0), "$999");
    }

    #[test]
    fn test_contact_and_pipeline_insights() {
        let data = BusinessData {
            contacts: Some(vec![
                json!({"id": "a", "dateAdded": "2024-03-08T09:00:00Z", "tags": ["vip"]}),
                json!({"id": "b", "dateAdded": "2024-01-01T09:00:00Z", "tags": []}),
            ]),
            opportunities: Some(vec![
                json!({"monetaryValue": 5000, "status": "open"}),
                json!({"monetaryValue": 2500.5, "status": "won"}),
                json!({"status": "open"}),
            ]),
            ..BusinessData::default()
        };
        let lines = business_insights(&data, &clock());
        assert_eq!(lines[0], "📊 Contact Analysis: 2 total, 1 added this week, 1 tagged");
        assert_eq!(lines[1], "💰 Pipeline Analysis: $7,500.50 total value, 2 in open, 1 in won");
    }

    #[test]
    fn test_summary_lines() {
        let c = clock();
        let events = ok(
            "calendars_get-calendar-events",
            json!({"events": [{"startTime": "2024-03-10T15:00:00Z"}, {"startTime": "2024-03-11T15:00:00Z"}]}),
        );
        assert_eq!(summarize_success(&events, &c), "✅ Found 2 events (1 today)");

        let created = ok("contacts_create-contact", json!({"id": "c-42", "name": "Ann"}));
        assert_eq!(
            summarize_success(&created, &c),
            "✅ contacts_create-contact: Operation completed successfully (ID: c-42)"
        );

        let convs = ok(
            "conversations_search-conversation",
            json!({"conversations": [{"unreadCount": 2}, {"unreadCount": 0}]}),
        );
        assert_eq!(summarize_success(&convs, &c), "✅ Found 2 conversations (1 unread)");

        let text = ok("locations_get-location", json!("x".repeat(150)));
        assert_eq!(summarize_success(&text, &c).chars().filter(|ch| *ch == 'x').count(), 100);
    }
}
