use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct BusinessConfig {
    #[schema(example = "adpa")]
    pub id: String,
    #[schema(example = "ADPA")]
    pub name: String,
    #[schema(example = 14)]
    pub trial_days: i64,
    /// ISO weekday numbers, e.g. [1,2,3,4,5]
    #[schema(value_type = Object)]
    pub working_days: Option<sqlx::types::JsonValue>,
    #[schema(example = "Europe/Lisbon")]
    pub time_zone: String,
    #[schema(example = "USD")]
    pub currency: String,
    #[schema(example = "en")]
    pub language: String,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct LeaveTypeConfig {
    pub business_id: String,
    #[schema(example = "ANNUAL")]
    pub code: String,
    #[schema(example = "Annual Leave")]
    pub name: String,
    #[schema(example = 21)]
    pub max_days_per_year: Option<i64>,
    pub requires_medical_certificate: bool,
    #[schema(example = 7)]
    pub advance_notice_days: i64,
    pub is_active: bool,
}
