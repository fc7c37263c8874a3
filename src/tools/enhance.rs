//! 参数增强：调用前按目录标志补默认值
//!
//! - paginated 工具：limit / offset 缺省（或为 null）时补配置的默认值
//! - time_bound 工具：startDate / endDate 规范化为 ISO-8601（UTC，毫秒精度）；无法解析时返回 ValidationError

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::core::ToolError;
use crate::tools::ToolSpec;

const DATE_FIELDS: [&str; 2] = ["startDate", "endDate"];

/// 分页默认值
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PaginationDefaults {
    pub limit: u64,
    pub offset: u64,
}

impl Default for PaginationDefaults {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

/// 返回增强后的参数副本；原调用不被修改
pub fn enhance_arguments(
    spec: &ToolSpec,
    arguments: &Map<String, Value>,
    defaults: PaginationDefaults,
) -> Result<Map<String, Value>, ToolError> {
    let mut enhanced = arguments.clone();

    if spec.paginated {
        fill_default(&mut enhanced, "limit", defaults.limit);
        fill_default(&mut enhanced, "offset", defaults.offset);
    }

    if spec.time_bound {
        for field in DATE_FIELDS {
            let Some(raw) = enhanced.get(field) else {
                continue;
            };
            if raw.is_null() {
                continue;
            }
            let normalized = normalize_date(raw).ok_or_else(|| ToolError::Validation {
                tool: spec.name.clone(),
                detail: format!("{field} is not a valid date: {raw}"),
            })?;
            enhanced.insert(field.to_string(), Value::String(normalized));
        }
    }

    Ok(enhanced)
}

fn fill_default(args: &mut Map<String, Value>, key: &str, value: u64) {
    if args.get(key).map_or(true, Value::is_null) {
        args.insert(key.to_string(), Value::from(value));
    }
}

/// 规范化为 `YYYY-MM-DDTHH:MM:SS.mmmZ`
pub fn normalize_date(raw: &Value) -> Option<String> {
    parse_date(raw).map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// 接受 RFC 3339、`YYYY-MM-DD`、`YYYY-MM-DD HH:MM[:SS]`、`YYYY-MM-DDTHH:MM[:SS]`（按 UTC）与毫秒时间戳
pub fn parse_date(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        Value::String(s) => parse_date_str(s.trim()),
        _ => None,
    }
}

fn parse_date_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in [
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolCatalog;
    use serde_json::json;

    fn args(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap()
    }

    #[test]
    fn test_pagination_defaults_when_absent() {
        let catalog = ToolCatalog::business_default();
        let spec = catalog.get("contacts_get-contacts").unwrap();
        let out = enhance_arguments(spec, &args(json!({"query": "vip"})), PaginationDefaults::default()).unwrap();
        assert_eq!(out["limit"], 50);
        assert_eq!(out["offset"], 0);
        assert_eq!(out["query"], "vip");
    }

    #[test]
    fn test_pagination_keeps_explicit_values() {
        let catalog = ToolCatalog::business_default();
        let spec = catalog.get("conversations_search-conversation").unwrap();
        let out = enhance_arguments(spec, &args(json!({"limit": 10, "offset": 20})), PaginationDefaults::default()).unwrap();
        assert_eq!(out["limit"], 10);
        assert_eq!(out["offset"], 20);
    }

    #[test]
    fn test_write_tools_not_paginated() {
        let catalog = ToolCatalog::business_default();
        let spec = catalog.get("contacts_add-tags").unwrap();
        let input = args(json!({"contactId": "c1", "tags": ["vip"]}));
        let out = enhance_arguments(spec, &input, PaginationDefaults::default()).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_calendar_dates_normalized() {
        let catalog = ToolCatalog::business_default();
        let spec = catalog.get("calendars_get-calendar-events").unwrap();
        let out = enhance_arguments(
            spec,
            &args(json!({"calendarId": "cal", "startDate": "2024-03-01", "endDate": "2024-03-02T10:30:00+02:00"})),
            PaginationDefaults::default(),
        )
        .unwrap();
        assert_eq!(out["startDate"], "2024-03-01T00:00:00.000Z");
        assert_eq!(out["endDate"], "2024-03-02T08:30:00.000Z");
    }

    #[test]
    fn test_invalid_date_is_validation_error() {
        let catalog = ToolCatalog::business_default();
        let spec = catalog.get("calendars_get-calendar-events").unwrap();
        let err = enhance_arguments(spec, &args(json!({"startDate": "next tuesday"})), PaginationDefaults::default())
            .unwrap_err();
        assert!(matches!(err, ToolError::Validation { .. }));
    }

    #[test]
    fn test_epoch_millis() {
        assert_eq!(
            normalize_date(&json!(0)).as_deref(),
            Some("1970-01-01T00:00:00.000Z")
        );
    }
}
