//! Audit trail read endpoint for auditors.

use axum::extract::Extension;
use axum::http::HeaderMap;
use axum::response::Json;

use crate::admin::AUDITOR_ROLE;
use crate::api::{authn, AppState};
use crate::audit::{AuditEvent, EVENTS_PATH};
use crate::error::DomainError;

#[utoipa::path(
    get,
    path = "/api/security/events",
    responses(
        (status = 200, description = "All security events, ascending by id", body = [AuditEvent]),
        (status = 401, description = "Authentication failed", body = String),
        (status = 403, description = "Role not eligible", body = String)
    ),
    tag = "audit",
)]
pub async fn events(
    state: Extension<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<AuditEvent>>, DomainError> {
    authn::require_role(&state, &headers, EVENTS_PATH, &[AUDITOR_ROLE]).await?;
    state.audit.events().await.map(Json).map_err(Into::into)
}
