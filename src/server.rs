use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::info;

use crate::config::Config;
use crate::listings::{Listing, SourceId};
use crate::pipeline::{run_check, CheckContext, CycleError, CycleReport};
use crate::quota::QuotaStatus;
use crate::router::SourceRouter;
use crate::scheduler::{next_run_after, parse_check_times};

#[derive(Clone)]
struct ApiState {
    ctx: Arc<CheckContext>,
}

#[derive(Debug, Serialize)]
struct ApiResponse<T: Serialize> {
    ok: bool,
    data: T,
}

#[derive(Debug, Serialize)]
struct ApiErrorBody {
    ok: bool,
    error: String,
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn conflict(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::CONFLICT,
            message: message.into(),
        }
    }

    fn internal(error: impl std::fmt::Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ApiErrorBody {
            ok: false,
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<ApiResponse<T>>, ApiError>;

#[derive(Debug, Clone, Deserialize)]
struct ListingsQuery {
    limit: Option<usize>,
    offset: Option<usize>,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    quota_healthy: bool,
}

#[derive(Debug, Serialize)]
struct StatusResponse {
    total_listings: usize,
    check_times: Vec<String>,
    next_check: Option<DateTime<Local>>,
    cycle_running: bool,
    quotas: BTreeMap<SourceId, QuotaStatus>,
}

#[derive(Debug, Serialize)]
struct ListingsResponse {
    total: usize,
    limit: usize,
    offset: usize,
    listings: Vec<Listing>,
}

pub async fn run_server(ctx: Arc<CheckContext>, bind: SocketAddr) -> Result<()> {
    let state = ApiState { ctx };

    let app = Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route("/listings", get(listings))
        .route("/quotas", get(quotas))
        .route("/config", get(show_config))
        .route("/check-now", post(check_now))
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("REST API listening on http://{bind}");
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<ApiState>) -> Json<ApiResponse<HealthResponse>> {
    let router = SourceRouter::new(
        &state.ctx.registry,
        &state.ctx.store,
        &state.ctx.config.providers,
    );
    ok(HealthResponse {
        status: "ok",
        quota_healthy: router.quota_health(),
    })
}

async fn status(State(state): State<ApiState>) -> ApiResult<StatusResponse> {
    let ctx = &state.ctx;
    let stored = ctx.store.load_listings().map_err(ApiError::internal)?;
    let router = SourceRouter::new(&ctx.registry, &ctx.store, &ctx.config.providers);

    let next_check = parse_check_times(&ctx.config.schedule.check_times)
        .ok()
        .map(|times| next_run_after(&Local::now(), &times));

    Ok(ok(StatusResponse {
        total_listings: stored.len(),
        check_times: ctx.config.schedule.check_times.clone(),
        next_check,
        cycle_running: ctx.is_busy(),
        quotas: router.quota_status(),
    }))
}

async fn listings(
    State(state): State<ApiState>,
    Query(query): Query<ListingsQuery>,
) -> ApiResult<ListingsResponse> {
    let stored = state.ctx.store.load_listings().map_err(ApiError::internal)?;
    let limit = query.limit.unwrap_or(50).max(1);
    let offset = query.offset.unwrap_or(0);

    let total = stored.len();
    let page = newest_first_page(stored, limit, offset);

    Ok(ok(ListingsResponse {
        total,
        limit,
        offset,
        listings: page,
    }))
}

async fn quotas(State(state): State<ApiState>) -> ApiResult<BTreeMap<SourceId, QuotaStatus>> {
    let router = SourceRouter::new(
        &state.ctx.registry,
        &state.ctx.store,
        &state.ctx.config.providers,
    );
    Ok(ok(router.quota_status()))
}

async fn show_config(State(state): State<ApiState>) -> Json<ApiResponse<Config>> {
    ok(state.ctx.config.clone())
}

/// Runs a check cycle inline and returns its report. A cycle already in
/// flight rejects the trigger with 409.
async fn check_now(State(state): State<ApiState>) -> ApiResult<CycleReport> {
    info!("manual check triggered via API");
    match run_check(&state.ctx).await {
        Ok(report) => Ok(ok(report)),
        Err(CycleError::Busy) => Err(ApiError::conflict(CycleError::Busy.to_string())),
        Err(CycleError::Failed(error)) => Err(ApiError::internal(format!("{error:#}"))),
    }
}

fn ok<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse { ok: true, data })
}

fn newest_first_page(
    stored: BTreeMap<String, Listing>,
    limit: usize,
    offset: usize,
) -> Vec<Listing> {
    let mut listings: Vec<Listing> = stored.into_values().collect();
    listings.sort_by(|a, b| b.first_seen.cmp(&a.first_seen).then(a.id.cmp(&b.id)));
    listings.into_iter().skip(offset).take(limit).collect()
}

#[cfg(test)]
mod tests {
    use super::newest_first_page;
    use crate::listings::{Listing, SourceId};
    use chrono::Duration;
    use std::collections::BTreeMap;

    #[test]
    fn pages_come_back_newest_first() {
        let mut stored = BTreeMap::new();
        for (id, age_days) in [("old", 5), ("new", 0), ("mid", 2)] {
            let mut listing = Listing::new(id, "1 Test St", "92037", 100, SourceId::Homesage);
            listing.first_seen = listing.first_seen - Duration::days(age_days);
            stored.insert(listing.id.clone(), listing);
        }

        let page = newest_first_page(stored.clone(), 2, 0);
        let ids: Vec<&str> = page.iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid"]);

        let rest = newest_first_page(stored, 2, 2);
        assert_eq!(rest.len(), 1);
        assert_eq!(rest[0].id, "old");
    }
}
