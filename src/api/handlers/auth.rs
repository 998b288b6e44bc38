//! Signup and password change endpoints.

use axum::extract::Extension;
use axum::response::Json;
use axum::http::HeaderMap;

use crate::account::{ChangepassRequest, PasswordChanged, SignupRequest, UserView};
use crate::api::{authn, AppState};
use crate::audit::CHANGEPASS_PATH;
use crate::error::DomainError;

use super::MISSING_PAYLOAD_ERRORMSG;

#[utoipa::path(
    post,
    path = "/api/auth/signup",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "User registered", body = UserView),
        (status = 400, description = "Validation error or user exists", body = String)
    ),
    tag = "auth",
)]
pub async fn signup(
    state: Extension<AppState>,
    payload: Option<Json<SignupRequest>>,
) -> Result<Json<UserView>, DomainError> {
    let Some(Json(request)) = payload else {
        return Err(DomainError::Validation(MISSING_PAYLOAD_ERRORMSG.to_string()));
    };
    state.accounts.signup(request).await.map(Json)
}

#[utoipa::path(
    post,
    path = "/api/auth/changepass",
    request_body = ChangepassRequest,
    responses(
        (status = 200, description = "Password updated", body = PasswordChanged),
        (status = 400, description = "Weak, breached, or unchanged password", body = String),
        (status = 401, description = "Authentication failed", body = String)
    ),
    tag = "auth",
)]
pub async fn changepass(
    state: Extension<AppState>,
    headers: HeaderMap,
    payload: Option<Json<ChangepassRequest>>,
) -> Result<Json<PasswordChanged>, DomainError> {
    // Any authenticated user may change their own password.
    let authenticated = authn::require_role(&state, &headers, CHANGEPASS_PATH, &[]).await?;
    let Some(Json(request)) = payload else {
        return Err(DomainError::Validation(MISSING_PAYLOAD_ERRORMSG.to_string()));
    };
    state
        .accounts
        .change_password(&authenticated.user.email, request)
        .await
        .map(Json)
}
