//! OpenAPI document assembled from the handler annotations.

use utoipa::OpenApi;

use crate::account::payroll::{PayrollStatus, SalaryRecord, SalaryView};
use crate::account::{ChangepassRequest, PasswordChanged, SignupRequest, UserView};
use crate::admin::{LockStatus, LockToggleRequest, RoleToggleRequest, UserDeleted};
use crate::audit::{AuditAction, AuditEvent};

use super::handlers;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health,
        handlers::auth::signup,
        handlers::auth::changepass,
        handlers::payroll::payment,
        handlers::payroll::upload_payments,
        handlers::payroll::update_payment,
        handlers::admin::list_users,
        handlers::admin::delete_user,
        handlers::admin::toggle_role,
        handlers::admin::toggle_access,
        handlers::events::events,
    ),
    components(schemas(
        handlers::health::Health,
        SignupRequest,
        ChangepassRequest,
        PasswordChanged,
        UserView,
        SalaryRecord,
        SalaryView,
        PayrollStatus,
        RoleToggleRequest,
        LockToggleRequest,
        UserDeleted,
        LockStatus,
        AuditEvent,
        AuditAction,
    )),
    tags(
        (name = "auth", description = "Signup and credential changes"),
        (name = "payroll", description = "Salary records"),
        (name = "admin", description = "User administration"),
        (name = "audit", description = "Security event trail"),
        (name = "health", description = "Service probes"),
    )
)]
pub struct ApiDoc;

#[must_use]
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_all_routes() {
        let doc = openapi();
        let paths = &doc.paths.paths;
        for path in [
            "/health",
            "/api/auth/signup",
            "/api/auth/changepass",
            "/api/empl/payment",
            "/api/acct/payments",
            "/api/admin/user",
            "/api/admin/user/{email}",
            "/api/admin/user/role",
            "/api/admin/user/access",
            "/api/security/events",
        ] {
            assert!(paths.contains_key(path), "missing {path}");
        }
    }
}
