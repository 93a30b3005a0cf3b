use crate::auth::auth::AuthUser;
use crate::model::business::{BusinessConfig, LeaveTypeConfig};
use crate::utils::db_utils::{SqlValue, build_update_sql, execute_update};
use actix_web::{HttpResponse, Responder, web};
use serde_json::Value;
use sqlx::MySqlPool;

/// Columns HR/Director may change through the config endpoint.
const UPDATABLE_CONFIG_FIELDS: &[&str] = &[
    "name",
    "trial_days",
    "working_days",
    "time_zone",
    "currency",
    "language",
];

/// Business configuration and active leave types for the caller's business
#[utoipa::path(
    get,
    path = "/api/v1/business/config",
    responses(
        (status = 200, description = "Business configuration"),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Business not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Business"
)]
pub async fn get_config(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    let config = sqlx::query_as::<_, BusinessConfig>(
        r#"
        SELECT id, name, trial_days, working_days, time_zone, currency, language, created_at
        FROM business_configs
        WHERE id = ?
        "#,
    )
    .bind(&auth.business_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, business_id = %auth.business_id, "Failed to fetch business config");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let config = match config {
        Some(c) => c,
        None => {
            return Ok(HttpResponse::NotFound().json(serde_json::json!({
                "message": "Business not found"
            })));
        }
    };

    let leave_types = sqlx::query_as::<_, LeaveTypeConfig>(
        r#"
        SELECT business_id, code, name, max_days_per_year,
               requires_medical_certificate, advance_notice_days, is_active
        FROM leave_type_configs
        WHERE business_id = ? AND is_active = TRUE
        ORDER BY code
        "#,
    )
    .bind(&auth.business_id)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to fetch leave type configs");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "config": config,
        "leave_types": leave_types
    })))
}

/// Partial update of the business configuration (HR/Director)
#[utoipa::path(
    put,
    path = "/api/v1/business/config",
    request_body = Object,
    responses(
        (status = 200, description = "Configuration updated"),
        (status = 400, description = "Unknown field or empty payload"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Business not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Business"
)]
pub async fn update_config(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    body: web::Json<Value>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_director()?;

    let update = build_update_sql(
        "business_configs",
        UPDATABLE_CONFIG_FIELDS,
        &body,
        "id",
        SqlValue::String(auth.business_id.clone()),
    )?;

    let affected = execute_update(pool.get_ref(), update).await.map_err(|e| {
        tracing::error!(error = %e, business_id = %auth.business_id, "Failed to update business config");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    if affected == 0 {
        return Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Business not found"
        })));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Business configuration updated"
    })))
}
