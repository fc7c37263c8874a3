//! 实体抽取：从成功的工具结果中按形状识别实体集合
//!
//! 每类实体一个具名抽取器，按固定优先级尝试，取第一个结构匹配。
//! 远端可能把结果包成 `{content: [{type: "text", text: "<json>"}]}`，抽取前先解包。

use std::borrow::Cow;

use serde_json::Value;

use crate::tools::ToolOutcome;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Contacts,
    Opportunities,
    Events,
    Transactions,
    Conversations,
}

/// 具名抽取器：结果对象中的数组字段
#[derive(Clone, Copy, Debug)]
pub struct Extractor {
    pub kind: EntityKind,
    pub field: &'static str,
}

impl Extractor {
    pub fn extract<'a>(&self, result: &'a Value) -> Option<&'a Vec<Value>> {
        result.get(self.field).and_then(Value::as_array)
    }
}

/// 优先级顺序
pub const EXTRACTORS: [Extractor; 5] = [
    Extractor {
        kind: EntityKind::Contacts,
        field: "contacts",
    },
    Extractor {
        kind: EntityKind::Opportunities,
        field: "opportunities",
    },
    Extractor {
        kind: EntityKind::Events,
        field: "events",
    },
    Extractor {
        kind: EntityKind::Transactions,
        field: "transactions",
    },
    Extractor {
        kind: EntityKind::Conversations,
        field: "conversations",
    },
];

/// 解包 MCP 风格的文本内容；无法解包时原样返回
pub fn unwrap_content(result: &Value) -> Cow<'_, Value> {
    let parsed = result
        .get("content")
        .and_then(Value::as_array)
        .and_then(|items| {
            items.iter().find_map(|item| {
                if item.get("type").and_then(Value::as_str) != Some("text") {
                    return None;
                }
                let text = item.get("text").and_then(Value::as_str)?;
                serde_json::from_str::<Value>(text).ok().filter(Value::is_object)
            })
        });
    match parsed {
        Some(v) => Cow::Owned(v),
        None => Cow::Borrowed(result),
    }
}

/// 第一个匹配的实体集合
pub fn extract_entities(result: &Value) -> Option<(EntityKind, Vec<Value>)> {
    EXTRACTORS
        .iter()
        .find_map(|ex| ex.extract(result).map(|items| (ex.kind, items.clone())))
}

/// 一条指令内抽到的实体；同类实体后出现的结果覆盖先出现的
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BusinessData {
    pub contacts: Option<Vec<Value>>,
    pub opportunities: Option<Vec<Value>>,
    pub events: Option<Vec<Value>>,
    pub transactions: Option<Vec<Value>>,
    pub conversations: Option<Vec<Value>>,
}

impl BusinessData {
    pub fn from_outcomes(outcomes: &[ToolOutcome]) -> Self {
        let mut data = Self::default();
        for outcome in outcomes.iter().filter(|o| o.success) {
            let Some(result) = outcome.result.as_ref() else {
                continue;
            };
            let result = unwrap_content(result);
            if let Some((kind, items)) = extract_entities(&result) {
                data.set(kind, items);
            }
        }
        data
    }

    fn set(&mut self, kind: EntityKind, items: Vec<Value>) {
        let slot = match kind {
            EntityKind::Contacts => &mut self.contacts,
            EntityKind::Opportunities => &mut self.opportunities,
            EntityKind::Events => &mut self.events,
            EntityKind::Transactions => &mut self.transactions,
            EntityKind::Conversations => &mut self.conversations,
        };
        *slot = Some(items);
    }

    /// 触及的实体类型（非空集合）
    pub fn touched(&self) -> Vec<EntityKind> {
        [
            (EntityKind::Contacts, &self.contacts),
            (EntityKind::Opportunities, &self.opportunities),
            (EntityKind::Events, &self.events),
            (EntityKind::Transactions, &self.transactions),
            (EntityKind::Conversations, &self.conversations),
        ]
        .into_iter()
        .filter(|(_, items)| items.as_ref().is_some_and(|v| !v.is_empty()))
        .map(|(kind, _)| kind)
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ToolError;
    use crate::tools::ToolInvocation;
    use serde_json::{json, Map};

    fn ok(name: &str, result: Value) -> ToolOutcome {
        ToolOutcome::succeeded(ToolInvocation::new(name, Map::new(), vec![]), result, 1)
    }

    #[test]
    fn test_priority_order_first_match() {
        let v = json!({"opportunities": [{"id": "o"}], "contacts": [{"id": "c"}]});
        let (kind, items) = extract_entities(&v).unwrap();
        assert_eq!(kind, EntityKind::Contacts);
        assert_eq!(items[0]["id"], "c");
        assert!(extract_entities(&json!({"contacts": "nope"})).is_none());
    }

    #[test]
    fn test_unwraps_text_content() {
        let inner = json!({"contacts": [{"id": "c1"}]}).to_string();
        let wrapped = json!({"content": [{"type": "text", "text": inner}]});
        let unwrapped = unwrap_content(&wrapped);
        assert_eq!(unwrapped["contacts"][0]["id"], "c1");

        let plain = json!({"content": [{"type": "text", "text": "hello"}]});
        assert_eq!(*unwrap_content(&plain), plain);
    }

    #[test]
    fn test_business_data_skips_failures_and_overwrites() {
        let outcomes = vec![
            ok("contacts_get-contacts", json!({"contacts": [{"id": "a"}]})),
            ToolOutcome::failed(
                ToolInvocation::new("opportunities_search-opportunity", Map::new(), vec![]),
                &ToolError::RateLimit,
                1,
            ),
            ok("contacts_get-contacts", json!({"contacts": [{"id": "b"}, {"id": "c"}]})),
        ];
        let data = BusinessData::from_outcomes(&outcomes);
        assert_eq!(data.contacts.as_ref().map(Vec::len), Some(2));
        assert!(data.opportunities.is_none());
        assert_eq!(data.touched(), vec![EntityKind::Contacts]);
    }
}
