//! Administrator endpoints: user listing, deletion, role and lock toggles.

use axum::extract::{Extension, Path};
use axum::http::HeaderMap;
use axum::response::Json;

use crate::account::UserView;
use crate::admin::{
    LockStatus, LockToggleRequest, RoleToggleRequest, UserDeleted, ADMINISTRATOR_ROLE,
};
use crate::api::{authn, AppState};
use crate::audit::{ADMIN_USER_PATH, LOCK_TOGGLE_PATH, ROLE_TOGGLE_PATH};
use crate::error::DomainError;

use super::MISSING_PAYLOAD_ERRORMSG;

#[utoipa::path(
    get,
    path = "/api/admin/user",
    responses(
        (status = 200, description = "All users with role sets", body = [UserView]),
        (status = 401, description = "Authentication failed", body = String),
        (status = 403, description = "Role not eligible", body = String)
    ),
    tag = "admin",
)]
pub async fn list_users(
    state: Extension<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<UserView>>, DomainError> {
    authn::require_role(&state, &headers, ADMIN_USER_PATH, &[ADMINISTRATOR_ROLE]).await?;
    state.admin.list_users().await.map(Json)
}

#[utoipa::path(
    delete,
    path = "/api/admin/user/{email}",
    params(
        ("email" = String, Path, description = "User to delete")
    ),
    responses(
        (status = 200, description = "User deleted with all dependent rows", body = UserDeleted),
        (status = 403, description = "Administrator cannot be deleted", body = String),
        (status = 404, description = "Unknown user", body = String)
    ),
    tag = "admin",
)]
pub async fn delete_user(
    state: Extension<AppState>,
    headers: HeaderMap,
    Path(email): Path<String>,
) -> Result<Json<UserDeleted>, DomainError> {
    let authenticated =
        authn::require_role(&state, &headers, ADMIN_USER_PATH, &[ADMINISTRATOR_ROLE]).await?;
    state
        .admin
        .delete_user(&authenticated.user.email, &email)
        .await
        .map(Json)
}

#[utoipa::path(
    put,
    path = "/api/admin/user/role",
    request_body = RoleToggleRequest,
    responses(
        (status = 200, description = "Refreshed user after the toggle", body = UserView),
        (status = 400, description = "Role rule violated", body = String),
        (status = 403, description = "Administrator role protected", body = String),
        (status = 404, description = "Unknown user or role", body = String)
    ),
    tag = "admin",
)]
pub async fn toggle_role(
    state: Extension<AppState>,
    headers: HeaderMap,
    payload: Option<Json<RoleToggleRequest>>,
) -> Result<Json<UserView>, DomainError> {
    let authenticated =
        authn::require_role(&state, &headers, ROLE_TOGGLE_PATH, &[ADMINISTRATOR_ROLE]).await?;
    let Some(Json(request)) = payload else {
        return Err(DomainError::Validation(MISSING_PAYLOAD_ERRORMSG.to_string()));
    };
    state
        .admin
        .toggle_role(&authenticated.user.email, request)
        .await
        .map(Json)
}

#[utoipa::path(
    put,
    path = "/api/admin/user/access",
    request_body = LockToggleRequest,
    responses(
        (status = 200, description = "Lock state toggled", body = LockStatus),
        (status = 403, description = "Administrator cannot be locked", body = String),
        (status = 404, description = "Unknown user", body = String)
    ),
    tag = "admin",
)]
pub async fn toggle_access(
    state: Extension<AppState>,
    headers: HeaderMap,
    payload: Option<Json<LockToggleRequest>>,
) -> Result<Json<LockStatus>, DomainError> {
    let authenticated =
        authn::require_role(&state, &headers, LOCK_TOGGLE_PATH, &[ADMINISTRATOR_ROLE]).await?;
    let Some(Json(request)) = payload else {
        return Err(DomainError::Validation(MISSING_PAYLOAD_ERRORMSG.to_string()));
    };
    state
        .admin
        .toggle_lock(&authenticated.user.email, request)
        .await
        .map(Json)
}
