use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubscriptionStatus {
    Trial,
    Active,
    PastDue,
    Expired,
    Canceled,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, ToSchema)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PlanCode {
    Free,
    Starter,
    Professional,
    Enterprise,
}

/// Mirror of a payment-processor subscription, upserted by external id.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Subscription {
    pub id: u64,
    pub user_id: u64,
    pub stripe_subscription_id: String,
    pub stripe_customer_id: String,
    pub plan_code: String,
    #[schema(example = "active")]
    pub status: String,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub current_period_start: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub trial_start: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub trial_end: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub canceled_at: Option<DateTime<Utc>>,
}

/// Mirror of a payment-processor invoice, upserted by external id.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, ToSchema)]
pub struct Invoice {
    pub id: u64,
    pub user_id: u64,
    pub subscription_id: Option<u64>,
    pub stripe_invoice_id: String,
    #[schema(example = 4900)]
    pub amount_due: i64,
    #[schema(example = 4900)]
    pub amount_paid: i64,
    #[schema(example = "usd")]
    pub currency: String,
    #[schema(example = "paid")]
    pub status: String,
    pub invoice_number: Option<String>,
    pub hosted_invoice_url: Option<String>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub period_start: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub period_end: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub paid_at: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct SubscriptionPlan {
    pub code: String,
    pub name: String,
    pub stripe_price_id_monthly: Option<String>,
    pub stripe_price_id_yearly: Option<String>,
    pub features: Option<sqlx::types::JsonValue>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_tags_round_trip() {
        assert_eq!(
            SubscriptionStatus::from_str("trial").unwrap(),
            SubscriptionStatus::Trial
        );
        assert_eq!(SubscriptionStatus::Canceled.to_string(), "canceled");
        assert_eq!(SubscriptionStatus::PastDue.to_string(), "past_due");
        assert_eq!(
            SubscriptionStatus::from_str("past_due").unwrap(),
            SubscriptionStatus::PastDue
        );
    }

    #[test]
    fn plan_codes_round_trip() {
        assert_eq!(PlanCode::from_str("professional").unwrap(), PlanCode::Professional);
        assert_eq!(PlanCode::Free.to_string(), "free");
        assert!(PlanCode::from_str("platinum").is_err());
    }
}
