use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Normal
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Notification {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 42)]
    pub user_id: u64,
    #[serde(rename = "type")]
    #[schema(example = "leave_request_approved")]
    pub kind: String,
    pub title: String,
    pub message: String,
    #[schema(example = "high")]
    pub priority: String,
    pub is_read: bool,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub read_at: Option<DateTime<Utc>>,
    pub action_url: Option<String>,
    pub action_label: Option<String>,
    pub related_leave_request_id: Option<u64>,
    #[schema(value_type = Object)]
    pub metadata: Option<sqlx::types::JsonValue>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub expires_at: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct NotificationTemplate {
    pub kind: String,
    pub title_template: String,
    pub message_template: String,
    pub email_subject_template: Option<String>,
    pub email_body_template: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct NotificationPreferences {
    pub user_id: u64,
    pub email_enabled: bool,
    pub in_app_enabled: bool,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn priority_defaults_to_normal() {
        assert_eq!(Priority::default(), Priority::Normal);
    }

    #[test]
    fn priority_tags_round_trip() {
        assert_eq!(Priority::from_str("urgent").unwrap(), Priority::Urgent);
        assert_eq!(Priority::High.to_string(), "high");
        assert!(Priority::from_str("critical").is_err());
    }
}
