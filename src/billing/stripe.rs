use anyhow::{Result, anyhow};
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Webhook timestamps older than this are treated as replays.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Verify a `Stripe-Signature` header (`t=<unix>,v1=<hex hmac>`) against the
/// raw request body. Returns Ok(false) for a wrong signature or a stale
/// timestamp; Err only for a malformed header.
pub fn verify_webhook_signature(payload: &[u8], header: &str, secret: &str) -> Result<bool> {
    verify_at(payload, header, secret, Utc::now().timestamp())
}

fn verify_at(payload: &[u8], header: &str, secret: &str, now: i64) -> Result<bool> {
    let mut timestamp: Option<&str> = None;
    let mut signature: Option<&str> = None;

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", v)) => timestamp = Some(v),
            Some(("v1", v)) => signature = Some(v),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| anyhow!("signature header missing timestamp"))?;
    let signature = signature.ok_or_else(|| anyhow!("signature header missing v1 signature"))?;

    let ts: i64 = timestamp
        .parse()
        .map_err(|_| anyhow!("signature timestamp is not an integer"))?;

    if (now - ts).abs() > SIGNATURE_TOLERANCE_SECS {
        return Ok(false);
    }

    let expected = hex::decode(signature).map_err(|_| anyhow!("signature is not valid hex"))?;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| anyhow!("invalid webhook secret"))?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(payload);

    // Mac::verify_slice is a constant-time comparison
    Ok(mac.verify_slice(&expected).is_ok())
}

pub fn epoch_to_datetime(epoch: Option<i64>) -> Option<DateTime<Utc>> {
    epoch.and_then(|secs| DateTime::from_timestamp(secs, 0))
}

/// Envelope shared by every webhook event.
#[derive(Debug, Deserialize)]
pub struct StripeEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: StripeEventData,
}

#[derive(Debug, Deserialize)]
pub struct StripeEventData {
    pub object: Value,
}

#[derive(Debug, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub mode: String,
    pub customer: Option<String>,
    pub customer_details: Option<CustomerDetails>,
}

#[derive(Debug, Deserialize)]
pub struct CustomerDetails {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StripeSubscription {
    pub id: String,
    pub customer: String,
    pub status: String,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub canceled_at: Option<i64>,
    pub trial_start: Option<i64>,
    pub trial_end: Option<i64>,
    #[serde(default)]
    pub items: SubscriptionItems,
}

#[derive(Debug, Default, Deserialize)]
pub struct SubscriptionItems {
    #[serde(default)]
    pub data: Vec<SubscriptionItem>,
}

#[derive(Debug, Deserialize)]
pub struct SubscriptionItem {
    pub price: Price,
}

#[derive(Debug, Deserialize)]
pub struct Price {
    pub id: String,
}

impl StripeSubscription {
    pub fn price_id(&self) -> Option<&str> {
        self.items.data.first().map(|item| item.price.id.as_str())
    }
}

#[derive(Debug, Deserialize)]
pub struct StripeInvoice {
    pub id: String,
    pub subscription: Option<String>,
    #[serde(default)]
    pub amount_due: i64,
    #[serde(default)]
    pub amount_paid: i64,
    pub currency: String,
    pub status: Option<String>,
    pub number: Option<String>,
    pub hosted_invoice_url: Option<String>,
    pub period_start: Option<i64>,
    pub period_end: Option<i64>,
    pub status_transitions: Option<StatusTransitions>,
}

#[derive(Debug, Deserialize)]
pub struct StatusTransitions {
    pub paid_at: Option<i64>,
}

impl StripeInvoice {
    pub fn paid_at(&self) -> Option<i64> {
        self.status_transitions.as_ref().and_then(|t| t.paid_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "whsec_test123secret456";

    fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.", timestamp).as_bytes());
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }

    #[test]
    fn valid_signature_is_accepted() {
        let payload = b"{\"type\":\"checkout.session.completed\"}";
        let ts = 1_700_000_000;
        let header = format!("t={},v1={}", ts, sign(payload, SECRET, ts));

        assert!(verify_at(payload, &header, SECRET, ts).unwrap());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let payload = b"{\"type\":\"checkout.session.completed\"}";
        let ts = 1_700_000_000;
        let header = format!("t={},v1={}", ts, sign(payload, "wrong_secret", ts));

        assert!(!verify_at(payload, &header, SECRET, ts).unwrap());
    }

    #[test]
    fn modified_payload_is_rejected() {
        let payload = b"{\"type\":\"checkout.session.completed\"}";
        let tampered = b"{\"type\":\"checkout.session.completed\",\"extra\":true}";
        let ts = 1_700_000_000;
        let header = format!("t={},v1={}", ts, sign(payload, SECRET, ts));

        assert!(!verify_at(tampered, &header, SECRET, ts).unwrap());
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let payload = b"{}";
        let ts = 1_700_000_000;
        let header = format!("t={},v1={}", ts, sign(payload, SECRET, ts));

        // 10 minutes later, beyond the 5-minute tolerance
        assert!(!verify_at(payload, &header, SECRET, ts + 600).unwrap());
    }

    #[test]
    fn missing_timestamp_errors() {
        assert!(verify_at(b"{}", "v1=deadbeef", SECRET, 0).is_err());
    }

    #[test]
    fn missing_signature_errors() {
        assert!(verify_at(b"{}", "t=1234567890", SECRET, 1234567890).is_err());
    }

    #[test]
    fn malformed_header_errors() {
        assert!(verify_at(b"{}", "garbage", SECRET, 0).is_err());
    }

    #[test]
    fn event_envelope_parses() {
        let body = serde_json::json!({
            "id": "evt_1",
            "type": "customer.subscription.updated",
            "data": { "object": {
                "id": "sub_1",
                "customer": "cus_1",
                "status": "active",
                "current_period_start": 1_700_000_000,
                "current_period_end": 1_702_592_000,
                "cancel_at_period_end": false,
                "items": { "data": [ { "price": { "id": "price_pro_monthly" } } ] }
            }}
        });

        let event: StripeEvent = serde_json::from_value(body).unwrap();
        assert_eq!(event.kind, "customer.subscription.updated");

        let sub: StripeSubscription = serde_json::from_value(event.data.object).unwrap();
        assert_eq!(sub.price_id(), Some("price_pro_monthly"));
        assert_eq!(sub.status, "active");
    }

    #[test]
    fn subscription_without_items_has_no_price() {
        let sub: StripeSubscription = serde_json::from_value(serde_json::json!({
            "id": "sub_2",
            "customer": "cus_2",
            "status": "canceled"
        }))
        .unwrap();
        assert_eq!(sub.price_id(), None);
    }

    #[test]
    fn invoice_paid_at_comes_from_status_transitions() {
        let invoice: StripeInvoice = serde_json::from_value(serde_json::json!({
            "id": "in_1",
            "subscription": "sub_1",
            "amount_due": 4900,
            "amount_paid": 4900,
            "currency": "usd",
            "status": "paid",
            "status_transitions": { "paid_at": 1_700_000_123 }
        }))
        .unwrap();
        assert_eq!(invoice.paid_at(), Some(1_700_000_123));
    }

    #[test]
    fn epoch_conversion_handles_none() {
        assert!(epoch_to_datetime(None).is_none());
        let dt = epoch_to_datetime(Some(0)).unwrap();
        assert_eq!(dt.timestamp(), 0);
    }
}
