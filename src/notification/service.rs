use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use sqlx::MySqlPool;
use tracing::{info, warn};

use crate::model::notification::{NotificationTemplate, Priority};
use crate::notification::unread_cache;

/// Parameters for a template-driven notification insert.
pub struct CreateNotification {
    pub user_id: u64,
    pub kind: String,
    pub data: Map<String, Value>,
    pub priority: Priority,
    pub action_url: Option<String>,
    pub action_label: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub related_leave_request_id: Option<u64>,
}

/// Substitute `{{placeholder}}` tokens from the data map. Unknown
/// placeholders are left verbatim, matching the stored-template contract.
pub fn render_template(template: &str, data: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after = &rest[open + 2..];

        match after.find("}}") {
            Some(close) => {
                let key = &after[..close];
                let is_ident = !key.is_empty()
                    && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

                let replacement = if is_ident {
                    data.get(key).and_then(|v| match v {
                        Value::String(s) => Some(s.clone()),
                        Value::Number(n) => Some(n.to_string()),
                        Value::Bool(b) => Some(b.to_string()),
                        _ => None,
                    })
                } else {
                    None
                };

                match replacement {
                    Some(s) => out.push_str(&s),
                    None => {
                        out.push_str("{{");
                        out.push_str(key);
                        out.push_str("}}");
                    }
                }
                rest = &after[close + 2..];
            }
            None => {
                // unterminated token, keep the tail verbatim
                out.push_str("{{");
                out.push_str(after);
                return out;
            }
        }
    }

    out.push_str(rest);
    out
}

async fn load_active_template(pool: &MySqlPool, kind: &str) -> Result<NotificationTemplate> {
    sqlx::query_as::<_, NotificationTemplate>(
        r#"
        SELECT kind, title_template, message_template,
               email_subject_template, email_body_template, is_active
        FROM notification_templates
        WHERE kind = ? AND is_active = TRUE
        "#,
    )
    .bind(kind)
    .fetch_optional(pool)
    .await
    .context("failed to load notification template")?
    .ok_or_else(|| anyhow!("no active notification template for type {kind}"))
}

/// Render the template for `params.kind`, insert the notification row and
/// fire the best-effort email dispatch. Email failures never bubble up.
pub async fn create_notification(pool: &MySqlPool, params: CreateNotification) -> Result<()> {
    let template = load_active_template(pool, &params.kind).await?;

    let title = render_template(&template.title_template, &params.data);
    let message = render_template(&template.message_template, &params.data);

    sqlx::query(
        r#"
        INSERT INTO notifications
            (user_id, kind, title, message, priority, action_url, action_label,
             related_leave_request_id, metadata, expires_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(params.user_id)
    .bind(&params.kind)
    .bind(&title)
    .bind(&message)
    .bind(params.priority.to_string())
    .bind(&params.action_url)
    .bind(&params.action_label)
    .bind(params.related_leave_request_id)
    .bind(Value::Object(params.data.clone()))
    .bind(params.expires_at)
    .execute(pool)
    .await
    .context("failed to insert notification")?;

    unread_cache::invalidate(params.user_id).await;

    if let Err(e) = send_email_notification(pool, params.user_id, &template, &params.data).await {
        warn!(error = %e, user_id = params.user_id, kind = %params.kind,
              "Email dispatch failed, notification row kept");
    }

    Ok(())
}

#[derive(sqlx::FromRow)]
struct EmailTarget {
    email: String,
    name: String,
}

/// Log-only email dispatch. Honours `notification_preferences.email_enabled`;
/// a user without a preferences row gets email by default.
async fn send_email_notification(
    pool: &MySqlPool,
    user_id: u64,
    template: &NotificationTemplate,
    data: &Map<String, Value>,
) -> Result<()> {
    let email_enabled = sqlx::query_scalar::<_, bool>(
        "SELECT email_enabled FROM notification_preferences WHERE user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    .unwrap_or(true);

    if !email_enabled {
        return Ok(());
    }

    let target = match sqlx::query_as::<_, EmailTarget>(
        "SELECT email, name FROM users WHERE id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?
    {
        Some(t) => t,
        None => return Ok(()),
    };

    let subject = render_template(
        template
            .email_subject_template
            .as_deref()
            .unwrap_or(&template.title_template),
        data,
    );
    let body = render_template(
        template
            .email_body_template
            .as_deref()
            .unwrap_or(&template.message_template),
        data,
    );

    // No delivery integration yet; the dispatch is recorded in the log.
    info!(
        to = %target.email,
        recipient = %target.name,
        subject = %subject,
        body_len = body.len(),
        "Email notification dispatched"
    );

    Ok(())
}

fn data_value(v: impl Into<Value>) -> Value {
    v.into()
}

/// Data map shared by the leave-workflow notification kinds.
pub fn leave_data(
    employee_name: &str,
    leave_type: &str,
    start_date: &str,
    end_date: &str,
    duration: i64,
    reason: &str,
) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("employee_name".into(), data_value(employee_name));
    data.insert("leave_type".into(), data_value(leave_type));
    data.insert("start_date".into(), data_value(start_date));
    data.insert("end_date".into(), data_value(end_date));
    data.insert("duration".into(), data_value(duration));
    data.insert("reason".into(), data_value(reason));
    data
}

pub async fn notify_request_submitted(
    pool: &MySqlPool,
    employee_id: u64,
    leave_request_id: u64,
    data: Map<String, Value>,
) -> Result<()> {
    create_notification(
        pool,
        CreateNotification {
            user_id: employee_id,
            kind: "leave_request_submitted".to_string(),
            data,
            priority: Priority::Normal,
            action_url: Some("/dashboard?tab=overview".to_string()),
            action_label: Some("View Request".to_string()),
            expires_at: None,
            related_leave_request_id: Some(leave_request_id),
        },
    )
    .await
}

pub async fn notify_approval_required(
    pool: &MySqlPool,
    approver_id: u64,
    leave_request_id: u64,
    data: Map<String, Value>,
) -> Result<()> {
    create_notification(
        pool,
        CreateNotification {
            user_id: approver_id,
            kind: "approval_required".to_string(),
            data,
            priority: Priority::High,
            action_url: Some("/dashboard?tab=approvals".to_string()),
            action_label: Some("Review Request".to_string()),
            expires_at: None,
            related_leave_request_id: Some(leave_request_id),
        },
    )
    .await
}

pub async fn notify_request_decided(
    pool: &MySqlPool,
    employee_id: u64,
    leave_request_id: u64,
    approved: bool,
    data: Map<String, Value>,
) -> Result<()> {
    let kind = if approved {
        "leave_request_approved"
    } else {
        "leave_request_rejected"
    };

    create_notification(
        pool,
        CreateNotification {
            user_id: employee_id,
            kind: kind.to_string(),
            data,
            priority: Priority::High,
            action_url: Some("/dashboard?tab=overview".to_string()),
            action_label: Some("View Details".to_string()),
            expires_at: None,
            related_leave_request_id: Some(leave_request_id),
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data() -> Map<String, Value> {
        let mut m = Map::new();
        m.insert("employee_name".into(), json!("Jane Doe"));
        m.insert("duration".into(), json!(5));
        m.insert("approved".into(), json!(true));
        m.insert("meta".into(), json!({"nested": 1}));
        m
    }

    #[test]
    fn substitutes_known_placeholders() {
        let out = render_template("{{employee_name}} is away {{duration}} days", &data());
        assert_eq!(out, "Jane Doe is away 5 days");
    }

    #[test]
    fn unknown_placeholder_left_verbatim() {
        let out = render_template("Hello {{who}}", &data());
        assert_eq!(out, "Hello {{who}}");
    }

    #[test]
    fn scalars_render_via_display() {
        let out = render_template("approved={{approved}}", &data());
        assert_eq!(out, "approved=true");
    }

    #[test]
    fn non_scalar_values_are_not_substituted() {
        let out = render_template("meta={{meta}}", &data());
        assert_eq!(out, "meta={{meta}}");
    }

    #[test]
    fn unterminated_token_passes_through() {
        let out = render_template("broken {{employee_name", &data());
        assert_eq!(out, "broken {{employee_name");
    }

    #[test]
    fn unterminated_token_after_substitution() {
        let out = render_template("{{employee_name}} is broken {{duration", &data());
        assert_eq!(out, "Jane Doe is broken {{duration");
    }

    #[test]
    fn non_identifier_token_left_alone() {
        let out = render_template("{{not a key}} {{employee_name}}", &data());
        assert_eq!(out, "{{not a key}} Jane Doe");
    }

    #[test]
    fn template_without_tokens_unchanged() {
        let out = render_template("plain text", &data());
        assert_eq!(out, "plain text");
    }

    #[test]
    fn leave_data_carries_workflow_fields() {
        let d = leave_data("Jane", "ANNUAL", "2024-01-15", "2024-01-19", 5, "vacation");
        assert_eq!(d.get("leave_type").unwrap(), "ANNUAL");
        assert_eq!(d.get("duration").unwrap(), 5);
        let rendered = render_template("{{employee_name}}: {{start_date}}..{{end_date}}", &d);
        assert_eq!(rendered, "Jane: 2024-01-15..2024-01-19");
    }
}
