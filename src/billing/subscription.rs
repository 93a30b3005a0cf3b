use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::MySqlPool;
use utoipa::ToSchema;

use crate::auth::auth::AuthUser;
use crate::config::Config;
use crate::model::subscription::{
    Invoice, PlanCode, Subscription, SubscriptionPlan, SubscriptionStatus,
};

/// Days left in a trial window, rounded toward the future (ceiling). A
/// partially elapsed day still counts, so a trial ending later today reports
/// 1 and a trial 2.25 days overdue reports -2.
pub fn trial_days_left(trial_end: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let secs = (trial_end - now).num_seconds();
    (secs + 86_399).div_euclid(86_400)
}

#[derive(sqlx::FromRow)]
struct UserSubscription {
    subscription_status: String,
    subscription_plan: String,
    trial_start_date: Option<DateTime<Utc>>,
    trial_end_date: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct SubscriptionInfo {
    #[schema(example = "trial")]
    pub status: String,
    #[schema(example = "professional")]
    pub plan: String,
    #[schema(example = "Professional")]
    pub plan_name: Option<String>,
    #[schema(example = 9)]
    pub trial_days_left: Option<i64>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub trial_end_date: Option<DateTime<Utc>>,
    pub is_trial_active: bool,
    #[schema(value_type = Object)]
    pub features: serde_json::Value,
    /// The mirrored payment-processor subscription, when one exists
    pub subscription: Option<Subscription>,
}

/// Current subscription state for the caller. An overrun trial is flipped to
/// `expired` on read, so the stored status catches up lazily.
#[utoipa::path(
    get,
    path = "/api/v1/billing/subscription",
    responses(
        (status = 200, description = "Subscription state", body = SubscriptionInfo),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Billing"
)]
pub async fn get_subscription(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let user = sqlx::query_as::<_, UserSubscription>(
        r#"
        SELECT subscription_status, subscription_plan, trial_start_date, trial_end_date
        FROM users
        WHERE id = ?
        "#,
    )
    .bind(auth.user_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to fetch subscription state");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let user = match user {
        Some(u) => u,
        None => {
            return Ok(HttpResponse::NotFound().json(serde_json::json!({
                "message": "User not found"
            })));
        }
    };

    let mut status = user.subscription_status.clone();
    let mut days_left = None;
    let mut is_trial_active = false;

    if let Some(trial_end) = user.trial_end_date {
        let on_trial = status == SubscriptionStatus::Trial.to_string();
        let left = trial_days_left(trial_end, Utc::now());
        days_left = Some(left);
        is_trial_active = left > 0 && on_trial;

        if left <= 0 && on_trial {
            status = SubscriptionStatus::Expired.to_string();
            if let Err(e) =
                sqlx::query("UPDATE users SET subscription_status = ? WHERE id = ?")
                    .bind(&status)
                    .bind(auth.user_id)
                    .execute(pool.get_ref())
                    .await
            {
                tracing::error!(error = %e, "Failed to expire trial");
            }
        }
    }

    let plan = sqlx::query_as::<_, SubscriptionPlan>(
        r#"
        SELECT code, name, stripe_price_id_monthly, stripe_price_id_yearly, features
        FROM subscription_plans
        WHERE code = ?
        "#,
    )
    .bind(&user.subscription_plan)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to fetch plan features");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let (plan_name, features) = match plan {
        Some(p) => (Some(p.name), p.features.unwrap_or_else(|| serde_json::json!([]))),
        None => (None, serde_json::json!([])),
    };

    let subscription = sqlx::query_as::<_, Subscription>(
        r#"
        SELECT id, user_id, stripe_subscription_id, stripe_customer_id, plan_code, status,
               current_period_start, current_period_end, cancel_at_period_end,
               trial_start, trial_end, canceled_at
        FROM subscriptions
        WHERE user_id = ?
        ORDER BY id DESC
        LIMIT 1
        "#,
    )
    .bind(auth.user_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to fetch subscription mirror");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(SubscriptionInfo {
        status,
        plan: user.subscription_plan,
        plan_name,
        trial_days_left: days_left,
        trial_end_date: user.trial_end_date,
        is_trial_active,
        features,
        subscription,
    }))
}

/// Start a free trial. A user gets exactly one; a second request is a 409.
#[utoipa::path(
    post,
    path = "/api/v1/billing/trial",
    responses(
        (status = 200, description = "Trial started"),
        (status = 401, description = "Unauthorized"),
        (status = 409, description = "Trial already used")
    ),
    security(("bearer_auth" = [])),
    tag = "Billing"
)]
pub async fn start_trial(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> actix_web::Result<impl Responder> {
    let existing_trial = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
        "SELECT trial_start_date FROM users WHERE id = ?",
    )
    .bind(auth.user_id)
    .fetch_one(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to check trial history");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    if existing_trial.is_some() {
        return Ok(HttpResponse::Conflict().json(serde_json::json!({
            "message": "Trial already used"
        })));
    }

    let trial_days = sqlx::query_scalar::<_, i64>(
        "SELECT trial_days FROM business_configs WHERE id = ?",
    )
    .bind(&auth.business_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to fetch business trial days");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?
    .unwrap_or(config.default_trial_days);

    let trial_start = Utc::now();
    let trial_end = trial_start + Duration::days(trial_days);

    // Trials run on the professional plan
    sqlx::query(
        r#"
        UPDATE users
        SET trial_start_date = ?,
            trial_end_date = ?,
            subscription_status = ?,
            subscription_plan = ?
        WHERE id = ?
        "#,
    )
    .bind(trial_start)
    .bind(trial_end)
    .bind(SubscriptionStatus::Trial.to_string())
    .bind(PlanCode::Professional.to_string())
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to start trial");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    tracing::info!(user_id = auth.user_id, trial_days, "Free trial started");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Trial started",
        "trial_end_date": trial_end,
        "trial_days": trial_days
    })))
}

/// The caller's most recent mirrored invoices
#[utoipa::path(
    get,
    path = "/api/v1/billing/invoices",
    responses(
        (status = 200, description = "Latest invoices"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Billing"
)]
pub async fn list_invoices(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let invoices = sqlx::query_as::<_, Invoice>(
        r#"
        SELECT id, user_id, subscription_id, stripe_invoice_id, amount_due, amount_paid,
               currency, status, invoice_number, hosted_invoice_url,
               period_start, period_end, paid_at
        FROM invoices
        WHERE user_id = ?
        ORDER BY created_at DESC
        LIMIT 10
        "#,
    )
    .bind(auth.user_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to fetch invoices");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "invoices": invoices })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn full_days_remaining() {
        let end = at("2024-02-15T00:00:00Z");
        let now = at("2024-02-01T00:00:00Z");
        assert_eq!(trial_days_left(end, now), 14);
    }

    #[test]
    fn partial_day_rounds_up() {
        let end = at("2024-02-01T12:00:00Z");
        let now = at("2024-02-01T00:00:00Z");
        assert_eq!(trial_days_left(end, now), 1);
    }

    #[test]
    fn overdue_trial_rounds_toward_zero() {
        // 2.25 days past the end reports -2, not -3
        let end = at("2024-02-01T00:00:00Z");
        let now = at("2024-02-03T06:00:00Z");
        assert_eq!(trial_days_left(end, now), -2);
    }

    #[test]
    fn whole_days_overdue_are_exact() {
        let end = at("2024-02-01T00:00:00Z");
        let now = at("2024-02-04T00:00:00Z");
        assert_eq!(trial_days_left(end, now), -3);
    }

    #[test]
    fn trial_ending_now_is_zero() {
        let end = at("2024-02-01T00:00:00Z");
        assert_eq!(trial_days_left(end, end), 0);
    }
}
