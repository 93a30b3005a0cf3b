use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sqlx::MySqlPool;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::model::notification::{Notification, NotificationPreferences, Priority};
use crate::notification::{service, unread_cache};

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct NotificationFilter {
    /// Max rows to return (default 50, capped at 200)
    #[schema(example = 50)]
    pub limit: Option<u64>,
    #[schema(example = 0)]
    pub offset: Option<u64>,
    /// Filter by notification type
    #[serde(rename = "type")]
    #[schema(example = "approval_required")]
    pub kind: Option<String>,
    /// Only unread notifications
    pub unread_only: Option<bool>,
}

#[derive(Serialize, ToSchema)]
pub struct NotificationListResponse {
    pub data: Vec<Notification>,
    pub limit: u64,
    pub offset: u64,
    pub total: i64,
}

// Helper enum for typed SQLx binding
enum FilterValue<'a> {
    U64(u64),
    Str(&'a str),
}

/// List the caller's notifications, newest first
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    params(NotificationFilter),
    responses(
        (status = 200, description = "Notification list", body = NotificationListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn list_notifications(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<NotificationFilter>,
) -> actix_web::Result<impl Responder> {
    let limit = query.limit.unwrap_or(50).min(200);
    let offset = query.offset.unwrap_or(0);

    let mut where_sql = String::from(" WHERE user_id = ?");
    let mut args: Vec<FilterValue> = vec![FilterValue::U64(auth.user_id)];

    if let Some(kind) = query.kind.as_deref() {
        where_sql.push_str(" AND kind = ?");
        args.push(FilterValue::Str(kind));
    }

    if query.unread_only.unwrap_or(false) {
        where_sql.push_str(" AND is_read = FALSE");
    }

    let count_sql = format!("SELECT COUNT(*) FROM notifications{}", where_sql);
    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::Str(s) => count_q.bind(*s),
        };
    }

    let total = count_q.fetch_one(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to count notifications");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let data_sql = format!(
        r#"
        SELECT id, user_id, kind, title, message, priority, is_read, read_at,
               action_url, action_label, related_leave_request_id, metadata,
               expires_at, created_at
        FROM notifications
        {}
        ORDER BY created_at DESC
        LIMIT ? OFFSET ?
        "#,
        where_sql
    );

    let mut data_q = sqlx::query_as::<_, Notification>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(v),
            FilterValue::Str(s) => data_q.bind(s),
        };
    }

    let notifications = data_q
        .bind(limit)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch notifications");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(NotificationListResponse {
        data: notifications,
        limit,
        offset,
        total,
    }))
}

#[derive(Deserialize, ToSchema)]
pub struct CreateNotificationReq {
    #[serde(rename = "type")]
    #[schema(example = "leave_request_submitted")]
    pub kind: String,
    #[schema(value_type = Object)]
    pub data: Option<Map<String, Value>>,
    #[schema(example = "normal")]
    pub priority: Option<Priority>,
    pub action_url: Option<String>,
    pub action_label: Option<String>,
    #[schema(value_type = Option<String>, format = "date-time")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Create a notification for the caller from a stored template
#[utoipa::path(
    post,
    path = "/api/v1/notifications",
    request_body = CreateNotificationReq,
    responses(
        (status = 200, description = "Notification created"),
        (status = 400, description = "Unknown or inactive template"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn create_notification(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateNotificationReq>,
) -> actix_web::Result<impl Responder> {
    let payload = payload.into_inner();

    let result = service::create_notification(
        pool.get_ref(),
        service::CreateNotification {
            user_id: auth.user_id,
            kind: payload.kind.clone(),
            data: payload.data.unwrap_or_default(),
            priority: payload.priority.unwrap_or_default(),
            action_url: payload.action_url,
            action_label: payload.action_label,
            expires_at: payload.expires_at,
            related_leave_request_id: None,
        },
    )
    .await;

    match result {
        Ok(()) => Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true }))),
        Err(e) => {
            tracing::error!(error = %e, kind = %payload.kind, "Failed to create notification");
            Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Failed to create notification"
            })))
        }
    }
}

/// Unread-notification count, cached to the 30s poll cadence
#[utoipa::path(
    get,
    path = "/api/v1/notifications/unread-count",
    responses(
        (status = 200, description = "Unread count", body = Object,
         example = json!({ "count": 3 })),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn unread_count(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let count = unread_cache::unread_count(pool.get_ref(), auth.user_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch unread count");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "count": count })))
}

/// Mark one notification read. Idempotent: re-marking succeeds without effect.
#[utoipa::path(
    post,
    path = "/api/v1/notifications/{id}/read",
    params(("id" = u64, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Marked read"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn mark_read(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let notification_id = path.into_inner();

    // read_at keeps the first transition's timestamp on repeat calls
    sqlx::query(
        r#"
        UPDATE notifications
        SET is_read = TRUE,
            read_at = COALESCE(read_at, NOW())
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(notification_id)
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, notification_id, "Failed to mark notification read");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    unread_cache::invalidate(auth.user_id).await;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}

/// Mark all of the caller's notifications read
#[utoipa::path(
    post,
    path = "/api/v1/notifications/mark-all-read",
    responses(
        (status = 200, description = "All marked read"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn mark_all_read(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    sqlx::query(
        r#"
        UPDATE notifications
        SET is_read = TRUE,
            read_at = NOW()
        WHERE user_id = ? AND is_read = FALSE
        "#,
    )
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to mark all notifications read");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    unread_cache::invalidate(auth.user_id).await;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}

/// Delete one of the caller's notifications
#[utoipa::path(
    delete,
    path = "/api/v1/notifications/{id}",
    params(("id" = u64, Path, description = "Notification ID")),
    responses(
        (status = 200, description = "Deleted"),
        (status = 404, description = "Notification not found"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn delete_notification(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let notification_id = path.into_inner();

    let result = sqlx::query("DELETE FROM notifications WHERE id = ? AND user_id = ?")
        .bind(notification_id)
        .bind(auth.user_id)
        .execute(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, notification_id, "Failed to delete notification");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Notification not found"
        })));
    }

    unread_cache::invalidate(auth.user_id).await;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}

/// Notification preferences; a user without a stored row gets the defaults
#[utoipa::path(
    get,
    path = "/api/v1/notifications/preferences",
    responses(
        (status = 200, description = "Preferences", body = NotificationPreferences),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn get_preferences(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let prefs = sqlx::query_as::<_, NotificationPreferences>(
        r#"
        SELECT user_id, email_enabled, in_app_enabled, updated_at
        FROM notification_preferences
        WHERE user_id = ?
        "#,
    )
    .bind(auth.user_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to fetch notification preferences");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let prefs = prefs.unwrap_or(NotificationPreferences {
        user_id: auth.user_id,
        email_enabled: true,
        in_app_enabled: true,
        updated_at: None,
    });

    Ok(HttpResponse::Ok().json(prefs))
}

#[derive(Deserialize, ToSchema)]
pub struct UpdatePreferencesReq {
    pub email_enabled: Option<bool>,
    pub in_app_enabled: Option<bool>,
}

/// Partial-update preferences, creating the row on first write
#[utoipa::path(
    put,
    path = "/api/v1/notifications/preferences",
    request_body = UpdatePreferencesReq,
    responses(
        (status = 200, description = "Preferences updated"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Notifications"
)]
pub async fn update_preferences(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<UpdatePreferencesReq>,
) -> actix_web::Result<impl Responder> {
    // Absent fields keep their stored (or default) value
    sqlx::query(
        r#"
        INSERT INTO notification_preferences (user_id, email_enabled, in_app_enabled, updated_at)
        VALUES (?, COALESCE(?, TRUE), COALESCE(?, TRUE), NOW())
        ON DUPLICATE KEY UPDATE
            email_enabled = COALESCE(?, email_enabled),
            in_app_enabled = COALESCE(?, in_app_enabled),
            updated_at = NOW()
        "#,
    )
    .bind(auth.user_id)
    .bind(payload.email_enabled)
    .bind(payload.in_app_enabled)
    .bind(payload.email_enabled)
    .bind(payload.in_app_enabled)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to update notification preferences");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "success": true })))
}
