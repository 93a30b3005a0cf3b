use crate::auth::auth::AuthUser;
use crate::model::leave_request::{LeaveStatus, LeaveType, days_between_inclusive};
use crate::model::role::Role;
use crate::notification::service;
use actix_web::{HttpResponse, Responder, web};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{MySqlPool, prelude::FromRow};
use utoipa::{IntoParams, ToSchema};

#[derive(Deserialize, ToSchema)]
pub struct CreateLeave {
    #[schema(example = "ANNUAL")]
    pub leave_type: LeaveType,
    #[schema(example = "2024-01-15", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2024-01-19", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "Family vacation")]
    pub reason: String,
    #[schema(example = "Jane Doe - 555-0123")]
    pub emergency_contact: Option<String>,
    #[schema(example = "Tasks delegated to team members")]
    pub work_handover: Option<String>,
}

#[derive(Serialize, Deserialize, FromRow, ToSchema)]
pub struct LeaveResponse {
    #[schema(example = 1)]
    pub id: u64,
    #[schema(example = 1000)]
    pub employee_id: u64,
    #[schema(example = "ANNUAL")]
    pub leave_type: String,
    #[schema(example = "2024-01-15", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2024-01-19", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = 5)]
    pub duration_days: i64,
    pub reason: String,
    pub emergency_contact: Option<String>,
    pub work_handover: Option<String>,
    #[schema(example = "PENDING")]
    pub status: String,
    pub decided_by: Option<u64>,
    #[schema(example = "2024-01-02T14:30:00Z", format = "date-time", value_type = Option<String>)]
    pub decided_at: Option<DateTime<Utc>>,
    pub decision_comment: Option<String>,
    #[schema(example = "2024-01-01T10:00:00Z", format = "date-time", value_type = Option<String>)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct LeaveListResponse {
    pub data: Vec<LeaveResponse>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 10)]
    pub per_page: u32,
    #[schema(example = 1)]
    pub total: i64,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct LeaveFilter {
    /// Filter by employee ID (approver roles only)
    #[schema(example = 123)]
    pub employee_id: Option<u64>,
    /// Filter by leave status
    #[schema(example = "PENDING")]
    pub status: Option<String>,
    /// Filter by leave type
    #[schema(example = "ANNUAL")]
    pub leave_type: Option<String>,
    /// Pagination page number (start with 1)
    #[schema(example = 1)]
    pub page: Option<u64>,
    /// Pagination per page number
    #[schema(example = 10)]
    pub per_page: Option<u64>,
}

// Helper enum for typed SQLx binding
enum FilterValue<'a> {
    U64(u64),
    Str(&'a str),
}

const LEAVE_COLUMNS: &str = "id, employee_id, leave_type, start_date, end_date, duration_days, \
     reason, emergency_contact, work_handover, status, decided_by, decided_at, \
     decision_comment, created_at";

/// Field-level submission checks, before any database work.
fn validate_submission(payload: &CreateLeave) -> Result<(), &'static str> {
    if payload.reason.trim().is_empty() {
        return Err("Reason is required");
    }
    if payload.start_date > payload.end_date {
        return Err("start_date cannot be after end_date");
    }
    Ok(())
}

/// Whether the business offers this leave type. A business with no
/// `leave_type_configs` rows gets the built-in set.
async fn leave_type_allowed(
    pool: &MySqlPool,
    business_id: &str,
    code: &str,
) -> Result<bool, sqlx::Error> {
    let active = sqlx::query_scalar::<_, bool>(
        "SELECT is_active FROM leave_type_configs WHERE business_id = ? AND code = ?",
    )
    .bind(business_id)
    .bind(code)
    .fetch_optional(pool)
    .await?;

    match active {
        Some(active) => Ok(active),
        None => {
            let configured = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM leave_type_configs WHERE business_id = ?",
            )
            .bind(business_id)
            .fetch_one(pool)
            .await?;
            Ok(configured == 0)
        }
    }
}

/// Supervisor of the employee's department, falling back to any HR user.
async fn resolve_approver(
    pool: &MySqlPool,
    business_id: &str,
    department: Option<&str>,
) -> Result<Option<u64>, sqlx::Error> {
    sqlx::query_scalar::<_, u64>(
        r#"
        SELECT id
        FROM users
        WHERE business_id = ?
          AND is_active = TRUE
          AND ((role_id = ? AND department = ?) OR role_id = ?)
        ORDER BY CASE WHEN role_id = ? THEN 0 ELSE 1 END, id
        LIMIT 1
        "#,
    )
    .bind(business_id)
    .bind(Role::Supervisor.id())
    .bind(department)
    .bind(Role::Hr.id())
    .bind(Role::Supervisor.id())
    .fetch_optional(pool)
    .await
}

async fn user_name(pool: &MySqlPool, user_id: u64) -> String {
    sqlx::query_scalar::<_, String>("SELECT name FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .ok()
        .flatten()
        .unwrap_or_else(|| "Unknown".to_string())
}

/* =========================
Submit leave request
========================= */
#[utoipa::path(
    post,
    path = "/api/v1/leave",
    request_body(
        content = CreateLeave,
        description = "Leave request payload",
        content_type = "application/json"
    ),
    responses(
        (status = 200, description = "Leave request submitted",
         body = Object,
         example = json!({
            "message": "Leave request submitted",
            "id": 12,
            "status": "PENDING",
            "duration_days": 5
         })
        ),
        (status = 400, description = "Bad request"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn create_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    payload: web::Json<CreateLeave>,
) -> actix_web::Result<impl Responder> {
    if let Err(msg) = validate_submission(&payload) {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({ "message": msg })));
    }

    let leave_type = payload.leave_type.to_string();

    let allowed = leave_type_allowed(pool.get_ref(), &auth.business_id, &leave_type)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to check leave type configuration");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    if !allowed {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Leave type is not offered by this business"
        })));
    }

    let duration = days_between_inclusive(payload.start_date, payload.end_date);

    let result = sqlx::query(
        r#"
        INSERT INTO leave_requests
            (business_id, employee_id, leave_type, start_date, end_date,
             duration_days, reason, emergency_contact, work_handover, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 'PENDING')
        "#,
    )
    .bind(&auth.business_id)
    .bind(auth.user_id)
    .bind(&leave_type)
    .bind(payload.start_date)
    .bind(payload.end_date)
    .bind(duration)
    .bind(payload.reason.trim())
    .bind(&payload.emergency_contact)
    .bind(&payload.work_handover)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, employee_id = auth.user_id, "Failed to create leave request");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let request_id = result.last_insert_id();

    // Fan-out: confirmation to the employee, review prompt to the approver.
    // The request itself stands even if either notification fails.
    let employee_name = user_name(pool.get_ref(), auth.user_id).await;
    let data = service::leave_data(
        &employee_name,
        &leave_type,
        &payload.start_date.to_string(),
        &payload.end_date.to_string(),
        duration,
        payload.reason.trim(),
    );

    if let Err(e) =
        service::notify_request_submitted(pool.get_ref(), auth.user_id, request_id, data.clone())
            .await
    {
        tracing::warn!(error = %e, request_id, "Submission confirmation notification failed");
    }

    match resolve_approver(pool.get_ref(), &auth.business_id, auth.department.as_deref()).await {
        Ok(Some(approver_id)) => {
            if let Err(e) =
                service::notify_approval_required(pool.get_ref(), approver_id, request_id, data)
                    .await
            {
                tracing::warn!(error = %e, request_id, approver_id, "Approval notification failed");
            }
        }
        Ok(None) => {
            tracing::warn!(
                request_id,
                business_id = %auth.business_id,
                "No approver found for business"
            );
        }
        Err(e) => {
            tracing::warn!(error = %e, request_id, "Approver lookup failed");
        }
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Leave request submitted",
        "id": request_id,
        "status": "PENDING",
        "duration_days": duration
    })))
}

/* =========================
List leave requests
========================= */
#[utoipa::path(
    get,
    path = "/api/v1/leave",
    params(LeaveFilter),
    responses(
        (status = 200, description = "Paginated leave list", body = LeaveListResponse),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_list(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<LeaveFilter>,
) -> actix_web::Result<impl Responder> {
    let per_page = query.per_page.unwrap_or(10).min(100);
    let page = query.page.unwrap_or(1).max(1);
    let offset = (page - 1) * per_page;

    let mut where_sql = String::from(" WHERE business_id = ?");
    let mut args: Vec<FilterValue> = vec![FilterValue::Str(&auth.business_id)];

    // Employees only ever see their own requests
    if auth.is_employee() {
        where_sql.push_str(" AND employee_id = ?");
        args.push(FilterValue::U64(auth.user_id));
    } else if let Some(emp_id) = query.employee_id {
        where_sql.push_str(" AND employee_id = ?");
        args.push(FilterValue::U64(emp_id));
    }

    if let Some(status) = query.status.as_deref() {
        where_sql.push_str(" AND status = ?");
        args.push(FilterValue::Str(status));
    }

    if let Some(leave_type) = query.leave_type.as_deref() {
        where_sql.push_str(" AND leave_type = ?");
        args.push(FilterValue::Str(leave_type));
    }

    let count_sql = format!("SELECT COUNT(*) FROM leave_requests{}", where_sql);

    let mut count_q = sqlx::query_scalar::<_, i64>(&count_sql);
    for arg in &args {
        count_q = match arg {
            FilterValue::U64(v) => count_q.bind(*v),
            FilterValue::Str(s) => count_q.bind(*s),
        };
    }

    let total = count_q.fetch_one(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to count leave requests");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let data_sql = format!(
        "SELECT {} FROM leave_requests{} ORDER BY created_at DESC LIMIT ? OFFSET ?",
        LEAVE_COLUMNS, where_sql
    );

    let mut data_q = sqlx::query_as::<_, LeaveResponse>(&data_sql);
    for arg in args {
        data_q = match arg {
            FilterValue::U64(v) => data_q.bind(v),
            FilterValue::Str(s) => data_q.bind(s),
        };
    }

    let leaves = data_q
        .bind(per_page)
        .bind(offset)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch leave list");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data: leaves,
        page: page as u32,
        per_page: per_page as u32,
        total,
    }))
}

/* =========================
Fetch one leave request
========================= */
#[utoipa::path(
    get,
    path = "/api/v1/leave/{leave_id}",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to fetch")
    ),
    responses(
        (status = 200, description = "Leave request found", body = LeaveResponse),
        (status = 401, description = "Unauthorized"),
        (status = 404, description = "Leave request not found", body = Object, example = json!({
            "message": "Leave request not found"
        }))
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn get_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
) -> actix_web::Result<impl Responder> {
    let leave_id = path.into_inner();

    let sql = format!(
        "SELECT {} FROM leave_requests WHERE id = ? AND business_id = ?",
        LEAVE_COLUMNS
    );

    let leave = sqlx::query_as::<_, LeaveResponse>(&sql)
        .bind(leave_id)
        .bind(&auth.business_id)
        .fetch_optional(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, leave_id, "Failed to fetch leave request");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    match leave {
        // An employee's requests are private to them; a 404 leaks nothing.
        Some(data) if !auth.is_employee() || data.employee_id == auth.user_id => {
            Ok(HttpResponse::Ok().json(data))
        }
        _ => Ok(HttpResponse::NotFound().json(serde_json::json!({
            "message": "Leave request not found"
        }))),
    }
}

/* =========================
Pending approvals (approver roles)
========================= */
#[utoipa::path(
    get,
    path = "/api/v1/leave/approvals",
    responses(
        (status = 200, description = "Pending leave requests", body = LeaveListResponse),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn pending_approvals(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
) -> actix_web::Result<impl Responder> {
    auth.require_approver()?;

    let sql = format!(
        "SELECT {} FROM leave_requests WHERE business_id = ? AND status = 'PENDING' \
         ORDER BY created_at ASC",
        LEAVE_COLUMNS
    );

    let pending = sqlx::query_as::<_, LeaveResponse>(&sql)
        .bind(&auth.business_id)
        .fetch_all(pool.get_ref())
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch pending approvals");
            actix_web::error::ErrorInternalServerError("Internal Server Error")
        })?;

    let total = pending.len() as i64;

    Ok(HttpResponse::Ok().json(LeaveListResponse {
        data: pending,
        page: 1,
        per_page: total.max(1) as u32,
        total,
    }))
}

/* =========================
Approve / reject (approver roles)
========================= */
#[derive(Debug, Copy, Clone, Eq, PartialEq, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionAction {
    Approved,
    Rejected,
}

impl DecisionAction {
    pub fn status(&self) -> LeaveStatus {
        match self {
            DecisionAction::Approved => LeaveStatus::Approved,
            DecisionAction::Rejected => LeaveStatus::Rejected,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct DecideLeave {
    #[schema(example = "APPROVED")]
    pub action: DecisionAction,
    #[schema(example = "Enjoy your holiday")]
    pub comment: Option<String>,
}

#[derive(FromRow)]
struct PendingLeave {
    employee_id: u64,
    leave_type: String,
    start_date: NaiveDate,
    end_date: NaiveDate,
    duration_days: i64,
    reason: String,
}

#[utoipa::path(
    post,
    path = "/api/v1/leave/{leave_id}/decision",
    params(
        ("leave_id" = u64, Path, description = "ID of the leave request to decide")
    ),
    request_body = DecideLeave,
    responses(
        (status = 200, description = "Decision recorded", body = Object, example = json!({
            "message": "Request approved successfully"
        })),
        (status = 400, description = "Already processed", body = Object, example = json!({
            "message": "Leave request not found or already processed"
        })),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Leave request not found")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn decide_leave(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    path: web::Path<u64>,
    payload: web::Json<DecideLeave>,
) -> actix_web::Result<impl Responder> {
    auth.require_approver()?;

    let leave_id = path.into_inner();

    let request = sqlx::query_as::<_, PendingLeave>(
        r#"
        SELECT employee_id, leave_type, start_date, end_date, duration_days, reason
        FROM leave_requests
        WHERE id = ? AND business_id = ?
        "#,
    )
    .bind(leave_id)
    .bind(&auth.business_id)
    .fetch_optional(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, leave_id, "Failed to fetch leave request");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let request = match request {
        Some(r) => r,
        None => {
            return Ok(HttpResponse::NotFound().json(serde_json::json!({
                "message": "Leave request not found"
            })));
        }
    };

    let status = payload.action.status().to_string();

    // Guarded transition: only a PENDING row moves. A concurrent second
    // decision affects zero rows and is reported as already processed.
    let result = sqlx::query(
        r#"
        UPDATE leave_requests
        SET status = ?,
            decided_by = ?,
            decided_at = NOW(),
            decision_comment = ?
        WHERE id = ? AND status = 'PENDING'
        "#,
    )
    .bind(&status)
    .bind(auth.user_id)
    .bind(&payload.comment)
    .bind(leave_id)
    .execute(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, leave_id, "Leave decision failed");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    if result.rows_affected() == 0 {
        return Ok(HttpResponse::BadRequest().json(serde_json::json!({
            "message": "Leave request not found or already processed"
        })));
    }

    // The transition happened exactly once, so exactly one employee
    // notification goes out.
    let employee_name = user_name(pool.get_ref(), request.employee_id).await;
    let approver_name = user_name(pool.get_ref(), auth.user_id).await;

    let mut data = service::leave_data(
        &employee_name,
        &request.leave_type,
        &request.start_date.to_string(),
        &request.end_date.to_string(),
        request.duration_days,
        &request.reason,
    );
    data.insert("approver_name".into(), approver_name.into());
    data.insert(
        "rejection_reason".into(),
        payload.comment.clone().unwrap_or_default().into(),
    );

    let approved = payload.action == DecisionAction::Approved;
    if let Err(e) = service::notify_request_decided(
        pool.get_ref(),
        request.employee_id,
        leave_id,
        approved,
        data,
    )
    .await
    {
        tracing::warn!(error = %e, leave_id, "Decision notification failed");
    }

    let verb = if approved { "approved" } else { "rejected" };
    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": format!("Request {} successfully", verb)
    })))
}

/* =========================
Calendar (approved leaves per month)
========================= */
#[derive(Deserialize, IntoParams, ToSchema)]
pub struct CalendarQuery {
    /// Calendar month, 1-12
    #[schema(example = 1)]
    pub month: u32,
    #[schema(example = 2024)]
    pub year: i32,
}

#[derive(Serialize, FromRow, ToSchema)]
pub struct CalendarEntry {
    pub id: u64,
    #[schema(example = "John Employee")]
    pub employee_name: String,
    #[schema(example = "2024-01-15", format = "date", value_type = String)]
    pub start_date: NaiveDate,
    #[schema(example = "2024-01-19", format = "date", value_type = String)]
    pub end_date: NaiveDate,
    #[schema(example = "ANNUAL")]
    pub leave_type: String,
}

/// First and last day of a calendar month, or None for an invalid month.
fn month_bounds(year: i32, month: u32) -> Option<(NaiveDate, NaiveDate)> {
    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let next_first = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    Some((first, next_first.pred_opt()?))
}

#[utoipa::path(
    get,
    path = "/api/v1/leave/calendar",
    params(CalendarQuery),
    responses(
        (status = 200, description = "Approved leaves overlapping the month"),
        (status = 400, description = "Invalid month"),
        (status = 401, description = "Unauthorized")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_calendar(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<CalendarQuery>,
) -> actix_web::Result<impl Responder> {
    let (first_day, last_day) = match month_bounds(query.year, query.month) {
        Some(bounds) => bounds,
        None => {
            return Ok(HttpResponse::BadRequest().json(serde_json::json!({
                "message": "Invalid month or year"
            })));
        }
    };

    let leaves = sqlx::query_as::<_, CalendarEntry>(
        r#"
        SELECT lr.id, u.name AS employee_name, lr.start_date, lr.end_date, lr.leave_type
        FROM leave_requests lr
        JOIN users u ON u.id = lr.employee_id
        WHERE lr.business_id = ?
          AND lr.status = 'APPROVED'
          AND lr.start_date <= ?
          AND lr.end_date >= ?
        ORDER BY lr.start_date
        "#,
    )
    .bind(&auth.business_id)
    .bind(last_day)
    .bind(first_day)
    .fetch_all(pool.get_ref())
    .await
    .map_err(|e| {
        tracing::error!(error = %e, "Failed to fetch leave calendar");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "leaves": leaves })))
}

/* =========================
Reports (HR/Director)
========================= */
#[derive(Deserialize, IntoParams, ToSchema)]
pub struct ReportQuery {
    /// Restrict the report to one department
    #[schema(example = "IT")]
    pub department: Option<String>,
}

#[derive(Serialize, Default, ToSchema)]
pub struct ReportSummary {
    pub total_requests: i64,
    pub approved_requests: i64,
    pub pending_requests: i64,
    pub rejected_requests: i64,
}

#[derive(Serialize, FromRow, ToSchema)]
pub struct LeaveTypeCount {
    #[schema(example = "ANNUAL")]
    pub leave_type: String,
    #[schema(example = 25)]
    pub count: i64,
}

#[derive(Serialize, FromRow, ToSchema)]
pub struct DepartmentStat {
    #[schema(example = "IT")]
    pub department: String,
    pub total_requests: i64,
    pub approved: i64,
    pub pending: i64,
    pub rejected: i64,
    #[schema(example = 3.2)]
    pub average_days: Option<f64>,
}

/// Fold per-status counts into the report summary.
fn summarize(status_counts: &[(String, i64)]) -> ReportSummary {
    let mut summary = ReportSummary::default();
    for (status, count) in status_counts {
        summary.total_requests += count;
        match status.as_str() {
            "APPROVED" => summary.approved_requests += count,
            "PENDING" => summary.pending_requests += count,
            "REJECTED" => summary.rejected_requests += count,
            _ => {}
        }
    }
    summary
}

#[utoipa::path(
    get,
    path = "/api/v1/leave/reports",
    params(ReportQuery),
    responses(
        (status = 200, description = "Leave statistics"),
        (status = 401, description = "Unauthorized"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Leave"
)]
pub async fn leave_reports(
    auth: AuthUser,
    pool: web::Data<MySqlPool>,
    query: web::Query<ReportQuery>,
) -> actix_web::Result<impl Responder> {
    auth.require_hr_or_director()?;

    let mut dept_filter = String::new();
    if query.department.is_some() {
        dept_filter.push_str(" AND u.department = ?");
    }

    let status_sql = format!(
        r#"
        SELECT lr.status, COUNT(*)
        FROM leave_requests lr
        JOIN users u ON u.id = lr.employee_id
        WHERE lr.business_id = ?{}
        GROUP BY lr.status
        "#,
        dept_filter
    );

    let mut status_q = sqlx::query_as::<_, (String, i64)>(&status_sql).bind(&auth.business_id);
    if let Some(dept) = &query.department {
        status_q = status_q.bind(dept);
    }

    let status_counts = status_q.fetch_all(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to aggregate leave statuses");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let type_sql = format!(
        r#"
        SELECT lr.leave_type, COUNT(*) AS count
        FROM leave_requests lr
        JOIN users u ON u.id = lr.employee_id
        WHERE lr.business_id = ?{}
        GROUP BY lr.leave_type
        ORDER BY count DESC
        "#,
        dept_filter
    );

    let mut type_q = sqlx::query_as::<_, LeaveTypeCount>(&type_sql).bind(&auth.business_id);
    if let Some(dept) = &query.department {
        type_q = type_q.bind(dept);
    }

    let leave_types = type_q.fetch_all(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to aggregate leave types");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    let dept_sql = format!(
        r#"
        SELECT COALESCE(u.department, 'Unassigned') AS department,
               COUNT(*) AS total_requests,
               CAST(SUM(lr.status = 'APPROVED') AS SIGNED) AS approved,
               CAST(SUM(lr.status = 'PENDING') AS SIGNED) AS pending,
               CAST(SUM(lr.status = 'REJECTED') AS SIGNED) AS rejected,
               CAST(AVG(lr.duration_days) AS DOUBLE) AS average_days
        FROM leave_requests lr
        JOIN users u ON u.id = lr.employee_id
        WHERE lr.business_id = ?{}
        GROUP BY COALESCE(u.department, 'Unassigned')
        ORDER BY total_requests DESC
        "#,
        dept_filter
    );

    let mut dept_q = sqlx::query_as::<_, DepartmentStat>(&dept_sql).bind(&auth.business_id);
    if let Some(dept) = &query.department {
        dept_q = dept_q.bind(dept);
    }

    let department_stats = dept_q.fetch_all(pool.get_ref()).await.map_err(|e| {
        tracing::error!(error = %e, "Failed to aggregate department statistics");
        actix_web::error::ErrorInternalServerError("Internal Server Error")
    })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "summary": summarize(&status_counts),
        "leave_types": leave_types,
        "department_stats": department_stats
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn payload(start: &str, end: &str, reason: &str) -> CreateLeave {
        CreateLeave {
            leave_type: LeaveType::Annual,
            start_date: d(start),
            end_date: d(end),
            reason: reason.to_string(),
            emergency_contact: None,
            work_handover: None,
        }
    }

    #[test]
    fn end_before_start_is_rejected() {
        let p = payload("2024-01-19", "2024-01-15", "vacation");
        assert!(validate_submission(&p).is_err());
    }

    #[test]
    fn same_day_span_is_accepted() {
        let p = payload("2024-01-15", "2024-01-15", "appointment");
        assert!(validate_submission(&p).is_ok());
    }

    #[test]
    fn blank_reason_is_rejected() {
        let p = payload("2024-01-15", "2024-01-19", "   ");
        assert!(validate_submission(&p).is_err());
    }

    #[test]
    fn decision_action_maps_to_status() {
        assert_eq!(DecisionAction::Approved.status(), LeaveStatus::Approved);
        assert_eq!(DecisionAction::Rejected.status(), LeaveStatus::Rejected);
    }

    #[test]
    fn month_bounds_cover_full_month() {
        let (first, last) = month_bounds(2024, 1).unwrap();
        assert_eq!(first, d("2024-01-01"));
        assert_eq!(last, d("2024-01-31"));

        // leap February
        let (_, last) = month_bounds(2024, 2).unwrap();
        assert_eq!(last, d("2024-02-29"));

        // December rolls into next year
        let (first, last) = month_bounds(2023, 12).unwrap();
        assert_eq!(first, d("2023-12-01"));
        assert_eq!(last, d("2023-12-31"));
    }

    #[test]
    fn month_bounds_reject_invalid_month() {
        assert!(month_bounds(2024, 0).is_none());
        assert!(month_bounds(2024, 13).is_none());
    }

    #[test]
    fn summary_folds_status_counts() {
        let counts = vec![
            ("APPROVED".to_string(), 38),
            ("PENDING".to_string(), 4),
            ("REJECTED".to_string(), 3),
        ];
        let s = summarize(&counts);
        assert_eq!(s.total_requests, 45);
        assert_eq!(s.approved_requests, 38);
        assert_eq!(s.pending_requests, 4);
        assert_eq!(s.rejected_requests, 3);
    }

    #[test]
    fn summary_of_empty_is_zero() {
        let s = summarize(&[]);
        assert_eq!(s.total_requests, 0);
        assert_eq!(s.approved_requests, 0);
    }
}
