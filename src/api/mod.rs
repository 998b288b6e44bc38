//! HTTP surface: router, middleware layers, and server startup.

pub mod authn;
pub mod handlers;
mod openapi;

pub use openapi::openapi;

use std::sync::Arc;

use anyhow::Result;
use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{HeaderName, HeaderValue, Request};
use axum::routing::{get, post, put};
use axum::{Extension, Router};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::request_id::PropagateRequestIdLayer;
use tower_http::set_header::SetRequestHeaderLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, Span};
use ulid::Ulid;

use crate::account::payroll::PayrollService;
use crate::account::AccountService;
use crate::admin::AdminService;
use crate::audit::AuditLogger;
use crate::security::{AuthGate, BruteForceProtector, CredentialHasher, SecurityConfig};
use crate::store::Stores;

/// Shared handles behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountService>,
    pub payroll: Arc<PayrollService>,
    pub admin: Arc<AdminService>,
    pub audit: AuditLogger,
    pub gate: Arc<AuthGate>,
}

impl AppState {
    /// Wire the services on top of a store bundle.
    ///
    /// # Errors
    /// Returns an error if the credential hasher cannot be initialized.
    pub fn new(stores: &Stores, config: SecurityConfig) -> Result<Self> {
        let hasher = Arc::new(CredentialHasher::new()?);
        let audit = AuditLogger::new(stores.audit.clone());
        let protector =
            BruteForceProtector::new(stores.users.clone(), audit.clone(), config);
        let gate = Arc::new(AuthGate::new(
            stores.users.clone(),
            stores.roles.clone(),
            hasher.clone(),
            protector,
        ));
        Ok(Self {
            accounts: Arc::new(AccountService::new(
                stores.users.clone(),
                stores.roles.clone(),
                hasher,
                audit.clone(),
            )),
            payroll: Arc::new(PayrollService::new(
                stores.users.clone(),
                stores.payroll.clone(),
            )),
            admin: Arc::new(AdminService::new(
                stores.users.clone(),
                stores.roles.clone(),
                audit.clone(),
            )),
            audit,
            gate,
        })
    }
}

#[must_use]
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/openapi.json", get(handlers::health::openapi_json))
        .route("/api/auth/signup", post(handlers::auth::signup))
        .route("/api/auth/changepass", post(handlers::auth::changepass))
        .route("/api/empl/payment", get(handlers::payroll::payment))
        .route(
            "/api/acct/payments",
            post(handlers::payroll::upload_payments).put(handlers::payroll::update_payment),
        )
        .route("/api/admin/user", get(handlers::admin::list_users))
        .route("/api/admin/user/:email", axum::routing::delete(handlers::admin::delete_user))
        .route("/api/admin/user/role", put(handlers::admin::toggle_role))
        .route("/api/admin/user/access", put(handlers::admin::toggle_access))
        .route("/api/security/events", get(handlers::events::events))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestHeaderLayer::if_not_present(
                    HeaderName::from_static("x-request-id"),
                    |_req: &_| HeaderValue::from_str(Ulid::new().to_string().as_str()).ok(),
                ))
                .layer(PropagateRequestIdLayer::new(HeaderName::from_static(
                    "x-request-id",
                )))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(Extension(state)),
        )
}

/// Start the server
/// # Errors
/// Return error if failed to start the server
pub async fn serve(port: u16, state: AppState) -> Result<()> {
    let app = router(state);
    let listener = TcpListener::bind(format!("::0:{port}")).await?;

    info!("Listening on [::]:{}", port);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Gracefully shutdown");
        })
        .await?;

    Ok(())
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}
