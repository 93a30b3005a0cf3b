use actix_web::{HttpRequest, HttpResponse, Responder, web};
use anyhow::{Context, Result};
use sqlx::MySqlPool;
use tracing::{debug, error, info, warn};

use crate::billing::stripe::{
    CheckoutSession, StripeEvent, StripeInvoice, StripeSubscription, epoch_to_datetime,
    verify_webhook_signature,
};
use crate::config::Config;
use crate::model::subscription::{PlanCode, SubscriptionStatus};

/// Stripe webhook receiver. The raw body is needed for signature
/// verification, so the payload arrives as bytes and is parsed manually.
#[utoipa::path(
    post,
    path = "/stripe/webhooks",
    responses(
        (status = 200, description = "Event acknowledged", body = Object,
         example = json!({ "received": true })),
        (status = 400, description = "Invalid signature or payload"),
        (status = 500, description = "Processing failed")
    ),
    tag = "Billing"
)]
pub async fn stripe_webhook(
    req: HttpRequest,
    body: web::Bytes,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let signature = match req
        .headers()
        .get("Stripe-Signature")
        .and_then(|h| h.to_str().ok())
    {
        Some(s) => s,
        None => {
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Missing Stripe-Signature header"
            }));
        }
    };

    match verify_webhook_signature(&body, signature, &config.stripe_webhook_secret) {
        Ok(true) => {}
        Ok(false) => {
            warn!("Webhook signature verification failed");
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Invalid signature"
            }));
        }
        Err(e) => {
            warn!(error = %e, "Malformed Stripe-Signature header");
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Invalid signature"
            }));
        }
    }

    let event: StripeEvent = match serde_json::from_slice(&body) {
        Ok(e) => e,
        Err(e) => {
            warn!(error = %e, "Webhook payload is not a valid event");
            return HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Invalid payload"
            }));
        }
    };

    info!(event_id = %event.id, kind = %event.kind, "Processing webhook event");

    let result = match event.kind.as_str() {
        "checkout.session.completed" => handle_checkout_completed(pool.get_ref(), &event).await,
        "customer.subscription.created" | "customer.subscription.updated" => {
            handle_subscription_upsert(pool.get_ref(), &event).await
        }
        "customer.subscription.deleted" => handle_subscription_deleted(pool.get_ref(), &event).await,
        "invoice.payment_succeeded" => handle_invoice(pool.get_ref(), &event, false).await,
        "invoice.payment_failed" => handle_invoice(pool.get_ref(), &event, true).await,
        other => {
            debug!(kind = %other, "Unhandled event type");
            Ok(())
        }
    };

    match result {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "received": true })),
        Err(e) => {
            error!(error = %e, event_id = %event.id, kind = %event.kind, "Webhook processing failed");
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "Webhook processing failed"
            }))
        }
    }
}

/// Link the Stripe customer to a local user by checkout email. The
/// subscription row itself is written by the subscription events.
async fn handle_checkout_completed(pool: &MySqlPool, event: &StripeEvent) -> Result<()> {
    let session: CheckoutSession = serde_json::from_value(event.data.object.clone())
        .context("malformed checkout.session object")?;

    if session.mode != "subscription" {
        return Ok(());
    }

    let customer = match &session.customer {
        Some(c) => c,
        None => {
            warn!(session_id = %session.id, "Checkout session has no customer");
            return Ok(());
        }
    };

    let email = session
        .customer_details
        .as_ref()
        .and_then(|d| d.email.as_deref());

    let email = match email {
        Some(e) => e.to_lowercase(),
        None => {
            warn!(session_id = %session.id, "Checkout session has no customer email");
            return Ok(());
        }
    };

    let updated = sqlx::query("UPDATE users SET stripe_customer_id = ? WHERE email = ?")
        .bind(customer)
        .bind(&email)
        .execute(pool)
        .await?
        .rows_affected();

    if updated == 0 {
        // Not fatal: Stripe must not retry a customer we will never know.
        warn!(session_id = %session.id, "No local user for checkout email");
    }

    Ok(())
}

#[derive(sqlx::FromRow)]
struct PlanRow {
    code: String,
}

/// Upsert the subscription mirror keyed by the external subscription id.
/// Replayed deliveries update the same row instead of creating duplicates.
async fn handle_subscription_upsert(pool: &MySqlPool, event: &StripeEvent) -> Result<()> {
    let subscription: StripeSubscription = serde_json::from_value(event.data.object.clone())
        .context("malformed subscription object")?;

    let price_id = match subscription.price_id() {
        Some(p) => p,
        None => {
            warn!(subscription_id = %subscription.id, "Subscription has no price item");
            return Ok(());
        }
    };

    let plan = sqlx::query_as::<_, PlanRow>(
        r#"
        SELECT code
        FROM subscription_plans
        WHERE stripe_price_id_monthly = ? OR stripe_price_id_yearly = ?
        "#,
    )
    .bind(price_id)
    .bind(price_id)
    .fetch_optional(pool)
    .await?;

    let plan = match plan {
        Some(p) => p,
        None => {
            warn!(price_id, "No plan mapped to price id, skipping event");
            return Ok(());
        }
    };

    let user_id = sqlx::query_scalar::<_, u64>(
        "SELECT id FROM users WHERE stripe_customer_id = ?",
    )
    .bind(&subscription.customer)
    .fetch_optional(pool)
    .await?;

    let user_id = match user_id {
        Some(id) => id,
        None => {
            warn!(customer = %subscription.customer, "No local user for Stripe customer, skipping event");
            return Ok(());
        }
    };

    sqlx::query(
        r#"
        INSERT INTO subscriptions
            (user_id, stripe_subscription_id, stripe_customer_id, plan_code, status,
             current_period_start, current_period_end, cancel_at_period_end,
             trial_start, trial_end, canceled_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            plan_code = VALUES(plan_code),
            status = VALUES(status),
            current_period_start = VALUES(current_period_start),
            current_period_end = VALUES(current_period_end),
            cancel_at_period_end = VALUES(cancel_at_period_end),
            trial_start = VALUES(trial_start),
            trial_end = VALUES(trial_end),
            canceled_at = VALUES(canceled_at)
        "#,
    )
    .bind(user_id)
    .bind(&subscription.id)
    .bind(&subscription.customer)
    .bind(&plan.code)
    .bind(&subscription.status)
    .bind(epoch_to_datetime(subscription.current_period_start))
    .bind(epoch_to_datetime(subscription.current_period_end))
    .bind(subscription.cancel_at_period_end)
    .bind(epoch_to_datetime(subscription.trial_start))
    .bind(epoch_to_datetime(subscription.trial_end))
    .bind(epoch_to_datetime(subscription.canceled_at))
    .execute(pool)
    .await?;

    sqlx::query("UPDATE users SET subscription_status = ?, subscription_plan = ? WHERE id = ?")
        .bind(&subscription.status)
        .bind(&plan.code)
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(())
}

async fn handle_subscription_deleted(pool: &MySqlPool, event: &StripeEvent) -> Result<()> {
    let subscription: StripeSubscription = serde_json::from_value(event.data.object.clone())
        .context("malformed subscription object")?;

    sqlx::query(
        r#"
        UPDATE subscriptions
        SET status = ?, canceled_at = NOW()
        WHERE stripe_subscription_id = ?
        "#,
    )
    .bind(SubscriptionStatus::Canceled.to_string())
    .bind(&subscription.id)
    .execute(pool)
    .await?;

    let user_id = sqlx::query_scalar::<_, u64>(
        "SELECT user_id FROM subscriptions WHERE stripe_subscription_id = ?",
    )
    .bind(&subscription.id)
    .fetch_optional(pool)
    .await?;

    if let Some(user_id) = user_id {
        sqlx::query("UPDATE users SET subscription_status = ?, subscription_plan = ? WHERE id = ?")
            .bind(SubscriptionStatus::Canceled.to_string())
            .bind(PlanCode::Free.to_string())
            .bind(user_id)
            .execute(pool)
            .await?;
    }

    Ok(())
}

#[derive(sqlx::FromRow)]
struct SubscriptionRef {
    id: u64,
    user_id: u64,
}

/// Upsert the invoice mirror keyed by the external invoice id.
async fn handle_invoice(pool: &MySqlPool, event: &StripeEvent, payment_failed: bool) -> Result<()> {
    let invoice: StripeInvoice = serde_json::from_value(event.data.object.clone())
        .context("malformed invoice object")?;

    let stripe_subscription_id = match &invoice.subscription {
        Some(s) => s,
        None => {
            debug!(invoice_id = %invoice.id, "Invoice not tied to a subscription, skipping");
            return Ok(());
        }
    };

    if payment_failed {
        sqlx::query("UPDATE subscriptions SET status = ? WHERE stripe_subscription_id = ?")
            .bind(SubscriptionStatus::PastDue.to_string())
            .bind(stripe_subscription_id)
            .execute(pool)
            .await?;
    }

    let subscription = sqlx::query_as::<_, SubscriptionRef>(
        "SELECT id, user_id FROM subscriptions WHERE stripe_subscription_id = ?",
    )
    .bind(stripe_subscription_id)
    .fetch_optional(pool)
    .await?;

    let subscription = match subscription {
        Some(s) => s,
        None => {
            warn!(invoice_id = %invoice.id, "No local subscription for invoice, skipping event");
            return Ok(());
        }
    };

    sqlx::query(
        r#"
        INSERT INTO invoices
            (user_id, subscription_id, stripe_invoice_id, amount_due, amount_paid,
             currency, status, invoice_number, hosted_invoice_url,
             period_start, period_end, paid_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON DUPLICATE KEY UPDATE
            amount_due = VALUES(amount_due),
            amount_paid = VALUES(amount_paid),
            status = VALUES(status),
            hosted_invoice_url = VALUES(hosted_invoice_url),
            paid_at = VALUES(paid_at)
        "#,
    )
    .bind(subscription.user_id)
    .bind(subscription.id)
    .bind(&invoice.id)
    .bind(invoice.amount_due)
    .bind(invoice.amount_paid)
    .bind(&invoice.currency)
    .bind(&invoice.status)
    .bind(&invoice.number)
    .bind(&invoice.hosted_invoice_url)
    .bind(epoch_to_datetime(invoice.period_start))
    .bind(epoch_to_datetime(invoice.period_end))
    .bind(epoch_to_datetime(invoice.paid_at()))
    .execute(pool)
    .await?;

    Ok(())
}
