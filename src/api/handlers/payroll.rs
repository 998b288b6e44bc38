//! Payroll endpoints: the employee's own payments and the accountant's
//! batch upload and update.

use axum::extract::{Extension, Query};
use axum::http::HeaderMap;
use axum::response::Json;
use serde::Deserialize;

use crate::account::payroll::{PayrollStatus, SalaryRecord, SalaryView};
use crate::admin::{ACCOUNTANT_ROLE, USER_ROLE};
use crate::api::{authn, AppState};
use crate::audit::{PAYMENTS_PATH, PAYMENT_PATH};
use crate::error::DomainError;

use super::MISSING_PAYLOAD_ERRORMSG;

#[derive(Debug, Deserialize)]
pub struct PaymentParams {
    period: Option<String>,
}

#[utoipa::path(
    get,
    path = "/api/empl/payment",
    params(
        ("period" = Option<String>, Query, description = "Month filter, mm-yyyy")
    ),
    responses(
        (status = 200, description = "Own salary records", body = [SalaryView]),
        (status = 400, description = "Malformed period filter", body = String),
        (status = 401, description = "Authentication failed", body = String),
        (status = 403, description = "Role not eligible", body = String)
    ),
    tag = "payroll",
)]
pub async fn payment(
    state: Extension<AppState>,
    headers: HeaderMap,
    Query(params): Query<PaymentParams>,
) -> Result<Json<Vec<SalaryView>>, DomainError> {
    let authenticated =
        authn::require_role(&state, &headers, PAYMENT_PATH, &[USER_ROLE, ACCOUNTANT_ROLE])
            .await?;
    state
        .payroll
        .list(&authenticated.user, params.period.as_deref())
        .await
        .map(Json)
}

#[utoipa::path(
    post,
    path = "/api/acct/payments",
    request_body = [SalaryRecord],
    responses(
        (status = 200, description = "All records added", body = PayrollStatus),
        (status = 400, description = "Any record invalid, none added", body = String),
        (status = 401, description = "Authentication failed", body = String),
        (status = 403, description = "Role not eligible", body = String)
    ),
    tag = "payroll",
)]
pub async fn upload_payments(
    state: Extension<AppState>,
    headers: HeaderMap,
    payload: Option<Json<Vec<SalaryRecord>>>,
) -> Result<Json<PayrollStatus>, DomainError> {
    authn::require_role(&state, &headers, PAYMENTS_PATH, &[ACCOUNTANT_ROLE]).await?;
    let Some(Json(records)) = payload else {
        return Err(DomainError::Validation(MISSING_PAYLOAD_ERRORMSG.to_string()));
    };
    state.payroll.upload(records).await.map(Json)
}

#[utoipa::path(
    put,
    path = "/api/acct/payments",
    request_body = SalaryRecord,
    responses(
        (status = 200, description = "Record updated", body = PayrollStatus),
        (status = 400, description = "Invalid record or no such row", body = String),
        (status = 401, description = "Authentication failed", body = String),
        (status = 403, description = "Role not eligible", body = String)
    ),
    tag = "payroll",
)]
pub async fn update_payment(
    state: Extension<AppState>,
    headers: HeaderMap,
    payload: Option<Json<SalaryRecord>>,
) -> Result<Json<PayrollStatus>, DomainError> {
    authn::require_role(&state, &headers, PAYMENTS_PATH, &[ACCOUNTANT_ROLE]).await?;
    let Some(Json(record)) = payload else {
        return Err(DomainError::Validation(MISSING_PAYLOAD_ERRORMSG.to_string()));
    };
    state.payroll.update(record).await.map(Json)
}
