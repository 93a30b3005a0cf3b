use crate::api::leave::{
    CalendarEntry, CalendarQuery, CreateLeave, DecideLeave, DecisionAction, DepartmentStat,
    LeaveFilter, LeaveListResponse, LeaveResponse, LeaveTypeCount, ReportQuery, ReportSummary,
};
use crate::billing::subscription::SubscriptionInfo;
use crate::model::business::{BusinessConfig, LeaveTypeConfig};
use crate::model::leave_request::{LeaveStatus, LeaveType};
use crate::model::notification::{Notification, NotificationPreferences, Priority};
use crate::model::subscription::{Invoice, Subscription};
use crate::models::{LoginReqDto, RegisterReq};
use crate::notification::handlers::{
    CreateNotificationReq, NotificationFilter, NotificationListResponse, UpdatePreferencesReq,
};
use utoipa::Modify;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "CloudLeave API",
        version = "1.0.0",
        description = r#"
## CloudLeave — Leave Management for Teams

This API powers **CloudLeave**, a multi-tenant leave management service for small and mid-size businesses.

### 🔹 Key Features
- **Leave Requests**
  - Submit, list, and view leave requests with automatic approver routing
- **Approval Workflow**
  - Supervisors, HR, and directors review and decide pending requests
- **Notifications**
  - Template-driven in-app notifications with per-user preferences
- **Billing**
  - Stripe-mirrored subscriptions, free trials, and invoice history
- **Business Configuration**
  - Per-business leave types, trial length, and working days

### 🔐 Security
Most endpoints are protected using **JWT Bearer authentication**.
Approval and configuration endpoints additionally require **Supervisor**, **HR**, or **Director** roles.

### 📦 Response Format
- JSON-based RESTful responses
- Pagination supported for list endpoints

---
Built with **Rust**, **Actix Web**, **SQLx**, and **Utoipa**.
"#,
    ),
    paths(
        crate::auth::handlers::register,
        crate::auth::handlers::login,
        crate::auth::handlers::refresh_token,
        crate::auth::handlers::logout,

        crate::api::leave::create_leave,
        crate::api::leave::leave_list,
        crate::api::leave::get_leave,
        crate::api::leave::pending_approvals,
        crate::api::leave::decide_leave,
        crate::api::leave::leave_calendar,
        crate::api::leave::leave_reports,

        crate::notification::handlers::list_notifications,
        crate::notification::handlers::create_notification,
        crate::notification::handlers::unread_count,
        crate::notification::handlers::mark_read,
        crate::notification::handlers::mark_all_read,
        crate::notification::handlers::delete_notification,
        crate::notification::handlers::get_preferences,
        crate::notification::handlers::update_preferences,

        crate::billing::webhook::stripe_webhook,
        crate::billing::subscription::get_subscription,
        crate::billing::subscription::start_trial,
        crate::billing::subscription::list_invoices,

        crate::api::business::get_config,
        crate::api::business::update_config
    ),
    components(
        schemas(
            RegisterReq,
            LoginReqDto,
            LeaveType,
            LeaveStatus,
            CreateLeave,
            LeaveResponse,
            LeaveListResponse,
            LeaveFilter,
            DecideLeave,
            DecisionAction,
            CalendarQuery,
            CalendarEntry,
            ReportQuery,
            ReportSummary,
            LeaveTypeCount,
            DepartmentStat,
            Priority,
            Notification,
            NotificationPreferences,
            NotificationFilter,
            NotificationListResponse,
            CreateNotificationReq,
            UpdatePreferencesReq,
            Subscription,
            Invoice,
            SubscriptionInfo,
            BusinessConfig,
            LeaveTypeConfig
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Auth", description = "Registration and session APIs"),
        (name = "Leave", description = "Leave request and approval APIs"),
        (name = "Notifications", description = "Notification and preference APIs"),
        (name = "Billing", description = "Subscription, trial, and invoice APIs"),
        (name = "Business", description = "Per-business configuration APIs"),
    )
)]
pub struct ApiDoc;

pub struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
