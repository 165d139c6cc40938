use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use chrono::{DateTime, Utc};
use metrics_exporter_prometheus::PrometheusHandle;
use policy_desk_storage::Database;

use crate::auth::{self, TokenService};
use crate::policies;
use crate::report::{ReportRenderer, TextReportRenderer};
use crate::telemetry;

#[derive(Clone)]
pub struct AppState {
    metrics: PrometheusHandle,
    storage: Database,
    tokens: TokenService,
    reports: Arc<dyn ReportRenderer>,
    clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl AppState {
    pub fn new(metrics: PrometheusHandle, storage: Database, tokens: TokenService) -> Self {
        Self {
            metrics,
            storage,
            tokens,
            reports: Arc::new(TextReportRenderer),
            clock: Arc::new(Utc::now),
        }
    }

    #[cfg(test)]
    pub fn with_clock(mut self, clock: Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(&self) -> &PrometheusHandle {
        &self.metrics
    }

    pub fn storage(&self) -> &Database {
        &self.storage
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn reports(&self) -> &dyn ReportRenderer {
        self.reports.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }
}

pub fn app_router(state: AppState) -> Router {
    // `/policies/:id` is shared by id-based and policy-number-based routes;
    // each handler decides how to interpret the segment. The fixed GET
    // sub-routes shadow `:id` for every method, so DELETE is repeated there.
    let admin_api = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .route("/policies", post(policies::create).get(policies::list))
        .route(
            "/policies/search",
            get(policies::search).delete(policies::delete_fixed_segment),
        )
        .route(
            "/policies/notifications",
            get(policies::notifications).delete(policies::delete_fixed_segment),
        )
        .route(
            "/policies/:id",
            get(policies::get_by_id).delete(policies::delete),
        )
        .route("/policies/:id/renew", put(policies::renew))
        .route("/policies/:id/send-sms", post(policies::send_sms))
        .route("/policies/:id/report", get(policies::report));

    Router::new()
        .route("/healthz", get(healthz))
        .route("/metrics", get(metrics))
        .nest("/api/admin", admin_api)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        telemetry::render_metrics(state.metrics()),
    )
}
