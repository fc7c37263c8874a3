//! 示例指令（按业务分类），供控制台 `/suggest` 使用

use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuggestionCategory {
    Contacts,
    Conversations,
    Opportunities,
    Calendar,
    Payments,
    Business,
}

impl SuggestionCategory {
    pub const ALL: [SuggestionCategory; 6] = [
        SuggestionCategory::Contacts,
        SuggestionCategory::Conversations,
        SuggestionCategory::Opportunities,
        SuggestionCategory::Calendar,
        SuggestionCategory::Payments,
        SuggestionCategory::Business,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SuggestionCategory::Contacts => "contacts",
            SuggestionCategory::Conversations => "conversations",
            SuggestionCategory::Opportunities => "opportunities",
            SuggestionCategory::Calendar => "calendar",
            SuggestionCategory::Payments => "payments",
            SuggestionCategory::Business => "business",
        }
    }

    pub fn commands(&self) -> &'static [&'static str] {
        match self {
            SuggestionCategory::Contacts => &[
                "Find all VIP contacts added this week",
                "Search for contacts with email domain @gmail.com",
                "Get all contacts tagged as 'Hot Lead'",
                "Create a new contact for Sarah Johnson with email sarah@example.com",
                "Add the 'Customer' tag to contact John Smith",
                "Show open tasks for my most recent contact",
            ],
            SuggestionCategory::Conversations => &[
                "Show all unread conversations",
                "Get the message history with my latest lead",
                "Send a follow-up SMS to Sarah Johnson",
                "Find conversations that need a reply",
            ],
            SuggestionCategory::Opportunities => &[
                "Show opportunities in proposal stage over $10,000",
                "List my sales pipelines and their stages",
                "Find stalled opportunities that need attention",
                "Mark the Acme deal as won",
            ],
            SuggestionCategory::Calendar => &[
                "Show today's appointments with contact details",
                "Get calendar events for next week",
                "Show notes for my last appointment",
            ],
            SuggestionCategory::Payments => &[
                "Show recent transactions over $1,000",
                "Find failed payments that need attention",
                "Look up order details by order id",
            ],
            SuggestionCategory::Business => &[
                "Show my business location details",
                "List custom fields configured for my account",
                "Give me a quick overview of contacts, deals and today's appointments",
            ],
        }
    }
}

impl fmt::Display for SuggestionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SuggestionCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        SuggestionCategory::ALL
            .into_iter()
            .find(|c| c.as_str() == lower)
            .ok_or_else(|| format!("unknown category '{s}'"))
    }
}

/// 指定分类的示例；None 表示全部
pub fn suggestions(category: Option<SuggestionCategory>) -> Vec<&'static str> {
    match category {
        Some(c) => c.commands().to_vec(),
        None => SuggestionCategory::ALL
            .iter()
            .flat_map(|c| c.commands().iter().copied())
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_filter() {
        assert_eq!("Payments".parse::<SuggestionCategory>(), Ok(SuggestionCategory::Payments));
        assert!("weather".parse::<SuggestionCategory>().is_err());
        let all = suggestions(None);
        let contacts = suggestions(Some(SuggestionCategory::Contacts));
        assert!(all.len() > contacts.len());
        assert!(contacts.iter().all(|c| all.contains(c)));
    }
}
