//! 工具目录
//!
//! 每个远端业务工具由 ToolSpec 描述：名称、描述（供推理引擎理解）、参数 JSON Schema、所需权限范围，
//! 以及参数增强标志（paginated：补分页默认值；time_bound：规范化日期字段）。
//! ToolCatalog 按名注册与查找，保持注册顺序以便 prompt 与 function 列表稳定。

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{json, Value};

use crate::llm::FunctionSpec;

/// 单个工具的描述
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
    pub scopes: Vec<String>,
    /// 读 / 搜索类工具：缺省时补 limit / offset
    pub paginated: bool,
    /// 带时间范围的工具：startDate / endDate 规范化为 ISO-8601
    pub time_bound: bool,
}

impl ToolSpec {
    pub fn new(name: &str, description: &str, parameters: Value, scopes: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            paginated: false,
            time_bound: false,
        }
    }

    pub fn paginated(mut self) -> Self {
        self.paginated = true;
        self
    }

    pub fn time_bound(mut self) -> Self {
        self.time_bound = true;
        self
    }

    /// 名称中 `_` 之前的部分（contacts / calendars / ...）
    pub fn category(&self) -> &str {
        self.name.split('_').next().unwrap_or(&self.name)
    }

    /// 转为推理引擎的 function 描述，描述中带上所需权限
    pub fn to_function(&self) -> FunctionSpec {
        FunctionSpec {
            name: self.name.clone(),
            description: format!(
                "{} (Required scopes: {})",
                self.description,
                self.scopes.join(", ")
            ),
            parameters: self.parameters.clone(),
        }
    }
}

/// 工具目录：按注册顺序保存
#[derive(Clone, Debug, Default)]
pub struct ToolCatalog {
    tools: Vec<ToolSpec>,
}

/// 端点摘要
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointInfo {
    pub url: String,
    pub protocol: String,
    pub total_tools: usize,
    pub categories: Vec<String>,
    pub required_headers: Vec<String>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 同名工具覆盖旧定义（位置不变）
    pub fn register(&mut self, spec: ToolSpec) {
        match self.tools.iter_mut().find(|t| t.name == spec.name) {
            Some(existing) => *existing = spec,
            None => self.tools.push(spec),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.iter().find(|t| t.name == name)
    }

    /// 工具所需权限；未知工具返回空
    pub fn scopes_for(&self, name: &str) -> Vec<String> {
        self.get(name).map(|t| t.scopes.clone()).unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.iter()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn functions(&self) -> Vec<FunctionSpec> {
        self.tools.iter().map(ToolSpec::to_function).collect()
    }

    /// 按名称前缀分组
    pub fn tools_by_category(&self) -> BTreeMap<String, Vec<&ToolSpec>> {
        let mut map: BTreeMap<String, Vec<&ToolSpec>> = BTreeMap::new();
        for tool in &self.tools {
            map.entry(tool.category().to_string()).or_default().push(tool);
        }
        map
    }

    pub fn endpoint_info(&self, url: &str) -> EndpointInfo {
        EndpointInfo {
            url: url.to_string(),
            protocol: "HTTP Streamable".to_string(),
            total_tools: self.tools.len(),
            categories: self.tools_by_category().into_keys().collect(),
            required_headers: vec![
                "Authorization".to_string(),
                "locationId (optional)".to_string(),
            ],
        }
    }

    /// 内置业务工具目录（联系人、日历、会话、商机、位置、支付）
    ///
    /// paginated 标志只设在名称含 `get-` / `search-` 的工具上，与按名称约定补默认值的行为一致。
    pub fn business_default() -> Self {
        let mut c = Self::new();

        // 联系人
        c.register(
            ToolSpec::new(
                "contacts_get-contacts",
                "Get contacts from the business system",
                json!({
                    "type": "object",
                    "properties": {
                        "query": {"type": "string", "description": "Search query for contacts"},
                        "limit": {"type": "number", "description": "Number of results to return (max 100)"},
                        "offset": {"type": "number", "description": "Offset for pagination"},
                        "tags": {"type": "array", "items": {"type": "string"}, "description": "Filter by tags"},
                        "email": {"type": "string", "description": "Filter by email address"},
                        "phone": {"type": "string", "description": "Filter by phone number"}
                    }
                }),
                &["View Contacts"],
            )
            .paginated(),
        );
        c.register(
            ToolSpec::new(
                "contacts_get-contact",
                "Fetch contact details",
                json!({
                    "type": "object",
                    "properties": {
                        "contactId": {"type": "string", "description": "Contact ID to fetch"}
                    },
                    "required": ["contactId"]
                }),
                &["View Contacts"],
            )
            .paginated(),
        );
        c.register(ToolSpec::new(
            "contacts_create-contact",
            "Create a contact",
            json!({
                "type": "object",
                "properties": {
                    "firstName": {"type": "string", "description": "First name"},
                    "lastName": {"type": "string", "description": "Last name"},
                    "email": {"type": "string", "description": "Email address"},
                    "phone": {"type": "string", "description": "Phone number"},
                    "tags": {"type": "array", "items": {"type": "string"}, "description": "Tags to assign"},
                    "customFields": {"type": "object", "description": "Custom field values"}
                },
                "required": ["firstName", "email"]
            }),
            &["Edit Contacts"],
        ));
        c.register(ToolSpec::new(
            "contacts_update-contact",
            "Update a contact",
            json!({
                "type": "object",
                "properties": {
                    "contactId": {"type": "string", "description": "Contact ID to update"},
                    "firstName": {"type": "string"},
                    "lastName": {"type": "string"},
                    "email": {"type": "string"},
                    "phone": {"type": "string"},
                    "tags": {"type": "array", "items": {"type": "string"}},
                    "customFields": {"type": "object"}
                },
                "required": ["contactId"]
            }),
            &["Edit Contacts"],
        ));
        c.register(ToolSpec::new(
            "contacts_upsert-contact",
            "Update or create a new contact",
            json!({
                "type": "object",
                "properties": {
                    "firstName": {"type": "string", "description": "First name"},
                    "lastName": {"type": "string", "description": "Last name"},
                    "email": {"type": "string", "description": "Email address"},
                    "phone": {"type": "string", "description": "Phone number"},
                    "tags": {"type": "array", "items": {"type": "string"}, "description": "Tags to assign"},
                    "customFields": {"type": "object", "description": "Custom field values"}
                },
                "required": ["email"]
            }),
            &["Edit Contacts"],
        ));
        c.register(ToolSpec::new(
            "contacts_add-tags",
            "Add tags to a contact",
            json!({
                "type": "object",
                "properties": {
                    "contactId": {"type": "string", "description": "Contact ID"},
                    "tags": {"type": "array", "items": {"type": "string"}, "description": "Tags to add"}
                },
                "required": ["contactId", "tags"]
            }),
            &["Edit Contacts"],
        ));
        c.register(ToolSpec::new(
            "contacts_remove-tags",
            "Remove tags from a contact",
            json!({
                "type": "object",
                "properties": {
                    "contactId": {"type": "string", "description": "Contact ID"},
                    "tags": {"type": "array", "items": {"type": "string"}, "description": "Tags to remove"}
                },
                "required": ["contactId", "tags"]
            }),
            &["Edit Contacts"],
        ));
        c.register(
            ToolSpec::new(
                "contacts_get-all-tasks",
                "Get all tasks for a contact",
                json!({
                    "type": "object",
                    "properties": {
                        "contactId": {"type": "string", "description": "Contact ID"},
                        "limit": {"type": "number", "description": "Number of results"},
                        "offset": {"type": "number", "description": "Pagination offset"}
                    },
                    "required": ["contactId"]
                }),
                &["View Contacts"],
            )
            .paginated(),
        );

        // 日历
        c.register(
            ToolSpec::new(
                "calendars_get-calendar-events",
                "Get calendar events (requires userId, groupId, or calendarId)",
                json!({
                    "type": "object",
                    "properties": {
                        "calendarId": {"type": "string", "description": "Calendar ID"},
                        "userId": {"type": "string", "description": "User ID"},
                        "groupId": {"type": "string", "description": "Group ID"},
                        "startDate": {"type": "string", "description": "Start date (ISO format)"},
                        "endDate": {"type": "string", "description": "End date (ISO format)"},
                        "limit": {"type": "number", "description": "Number of results"}
                    }
                }),
                &["View Calendar Events"],
            )
            .paginated()
            .time_bound(),
        );
        c.register(
            ToolSpec::new(
                "calendars_get-appointment-notes",
                "Retrieve appointment notes",
                json!({
                    "type": "object",
                    "properties": {
                        "appointmentId": {"type": "string", "description": "Appointment ID"},
                        "contactId": {"type": "string", "description": "Contact ID"}
                    }
                }),
                &["View Calendars"],
            )
            .paginated()
            .time_bound(),
        );

        // 会话
        c.register(
            ToolSpec::new(
                "conversations_search-conversation",
                "Search/filter/sort conversations",
                json!({
                    "type": "object",
                    "properties": {
                        "contactId": {"type": "string", "description": "Filter by contact ID"},
                        "query": {"type": "string", "description": "Search query"},
                        "limit": {"type": "number", "description": "Number of results"},
                        "offset": {"type": "number", "description": "Pagination offset"},
                        "unread": {"type": "boolean", "description": "Filter unread conversations"},
                        "sortBy": {"type": "string", "description": "Sort field"},
                        "sortOrder": {"type": "string", "enum": ["asc", "desc"], "description": "Sort order"}
                    }
                }),
                &["View Conversations"],
            )
            .paginated(),
        );
        c.register(
            ToolSpec::new(
                "conversations_get-messages",
                "Get messages by conversation ID",
                json!({
                    "type": "object",
                    "properties": {
                        "conversationId": {"type": "string", "description": "Conversation ID"},
                        "limit": {"type": "number", "description": "Number of messages"},
                        "offset": {"type": "number", "description": "Pagination offset"}
                    },
                    "required": ["conversationId"]
                }),
                &["View Conversation Messages"],
            )
            .paginated(),
        );
        c.register(ToolSpec::new(
            "conversations_send-a-new-message",
            "Send a message into a conversation thread",
            json!({
                "type": "object",
                "properties": {
                    "conversationId": {"type": "string", "description": "Conversation ID"},
                    "message": {"type": "string", "description": "Message content"},
                    "type": {"type": "string", "enum": ["SMS", "Email", "WhatsApp"], "description": "Message type"},
                    "contactId": {"type": "string", "description": "Contact ID"}
                },
                "required": ["conversationId", "message"]
            }),
            &["Edit Conversation Messages"],
        ));

        // 商机
        c.register(
            ToolSpec::new(
                "opportunities_search-opportunity",
                "Search for opportunities by criteria",
                json!({
                    "type": "object",
                    "properties": {
                        "pipelineId": {"type": "string", "description": "Filter by pipeline ID"},
                        "status": {"type": "string", "description": "Filter by status"},
                        "contactId": {"type": "string", "description": "Filter by contact ID"},
                        "query": {"type": "string", "description": "Search query"},
                        "limit": {"type": "number", "description": "Number of results"},
                        "offset": {"type": "number", "description": "Pagination offset"},
                        "monetaryValue": {"type": "number", "description": "Filter by minimum value"}
                    }
                }),
                &["View Opportunities"],
            )
            .paginated(),
        );
        c.register(
            ToolSpec::new(
                "opportunities_get-pipelines",
                "Retrieve all opportunity pipelines",
                json!({
                    "type": "object",
                    "properties": {
                        "limit": {"type": "number", "description": "Number of results"}
                    }
                }),
                &["View Opportunities"],
            )
            .paginated(),
        );
        c.register(
            ToolSpec::new(
                "opportunities_get-opportunity",
                "Fetch an opportunity by ID",
                json!({
                    "type": "object",
                    "properties": {
                        "opportunityId": {"type": "string", "description": "Opportunity ID"}
                    },
                    "required": ["opportunityId"]
                }),
                &["View Opportunities"],
            )
            .paginated(),
        );
        c.register(ToolSpec::new(
            "opportunities_update-opportunity",
            "Update an existing opportunity",
            json!({
                "type": "object",
                "properties": {
                    "opportunityId": {"type": "string", "description": "Opportunity ID"},
                    "name": {"type": "string", "description": "Opportunity name"},
                    "monetaryValue": {"type": "number", "description": "Opportunity value"},
                    "status": {"type": "string", "description": "Status"},
                    "stageId": {"type": "string", "description": "Stage ID"}
                },
                "required": ["opportunityId"]
            }),
            &["Edit Opportunities"],
        ));

        // 位置（子账户）
        c.register(
            ToolSpec::new(
                "locations_get-location",
                "Get sub-account (location) details by ID",
                json!({
                    "type": "object",
                    "properties": {
                        "locationId": {"type": "string", "description": "Location ID"}
                    }
                }),
                &["View Locations"],
            )
            .paginated(),
        );
        c.register(
            ToolSpec::new(
                "locations_get-custom-fields",
                "Retrieve custom field definitions for a location",
                json!({
                    "type": "object",
                    "properties": {
                        "locationId": {"type": "string", "description": "Location ID"},
                        "objectType": {"type": "string", "description": "Object type (contact, opportunity, etc.)"}
                    }
                }),
                &["View Custom Fields"],
            )
            .paginated(),
        );

        // 支付
        c.register(
            ToolSpec::new(
                "payments_get-order-by-id",
                "Fetch order details by unique order ID",
                json!({
                    "type": "object",
                    "properties": {
                        "orderId": {"type": "string", "description": "Order ID"}
                    },
                    "required": ["orderId"]
                }),
                &["View Payment Orders"],
            )
            .paginated(),
        );
        c.register(ToolSpec::new(
            "payments_list-transactions",
            "Paginated list, supports filtering",
            json!({
                "type": "object",
                "properties": {
                    "contactId": {"type": "string", "description": "Filter by contact ID"},
                    "startDate": {"type": "string", "description": "Start date filter"},
                    "endDate": {"type": "string", "description": "End date filter"},
                    "limit": {"type": "number", "description": "Number of results"},
                    "offset": {"type": "number", "description": "Pagination offset"},
                    "status": {"type": "string", "description": "Transaction status"}
                }
            }),
            &["View Payment Transactions"],
        ));

        c
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_flag_matches_naming_convention() {
        let catalog = ToolCatalog::business_default();
        for tool in catalog.iter() {
            let by_name = tool.name.contains("get-") || tool.name.contains("search-");
            assert_eq!(tool.paginated, by_name, "{}", tool.name);
        }
    }

    #[test]
    fn test_time_bound_only_calendars() {
        let catalog = ToolCatalog::business_default();
        for tool in catalog.iter() {
            assert_eq!(tool.time_bound, tool.category() == "calendars", "{}", tool.name);
        }
    }

    #[test]
    fn test_scopes_and_functions() {
        let catalog = ToolCatalog::business_default();
        assert_eq!(catalog.len(), 21);
        assert_eq!(catalog.scopes_for("contacts_get-contacts"), vec!["View Contacts"]);
        assert!(catalog.scopes_for("nope").is_empty());

        let f = catalog
            .functions()
            .into_iter()
            .find(|f| f.name == "payments_list-transactions")
            .unwrap();
        assert!(f.description.contains("Required scopes: View Payment Transactions"));
    }

    #[test]
    fn test_categories() {
        let catalog = ToolCatalog::business_default();
        let info = catalog.endpoint_info("https://example.test/mcp/");
        assert_eq!(
            info.categories,
            vec!["calendars", "contacts", "conversations", "locations", "opportunities", "payments"]
        );
        assert_eq!(info.total_tools, catalog.len());
    }

    #[test]
    fn test_register_replaces_in_place() {
        let mut catalog = ToolCatalog::new();
        catalog.register(ToolSpec::new("a_one", "first", json!({}), &["S1"]));
        catalog.register(ToolSpec::new("b_two", "second", json!({}), &[]));
        catalog.register(ToolSpec::new("a_one", "replaced", json!({}), &["S2"]));
        let names: Vec<_> = catalog.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["a_one", "b_two"]);
        assert_eq!(catalog.get("a_one").unwrap().description, "replaced");
    }
}
