//! Usage information and runtime limit administration.
//!
//! # Endpoints
//!
//! - `GET /` - Served routes and the limit currently applied to each
//! - `GET /admin/limits` - Configured and runtime limits
//! - `PUT /admin/limits` - Set a runtime limit
//! - `DELETE /admin/limits/{endpoint}` - Remove a runtime limit
//!
//! Runtime limits take effect on the next request. Limits from
//! `BANDWIDTH_LIMITS` cannot be removed, only overridden.

use axum::Json;
use axum::extract::{Path, State};
use tracing::{info, instrument};

use crate::error::{AppError, AppResult};
use crate::metrics;
use crate::models::{InfoResponse, LimitResponse, LimitsResponse, RouteInfo, SetLimitRequest};
use crate::state::AppState;
use crate::validation::{validate_endpoint_name, validate_rate};

/// Usage information.
#[instrument(skip(state))]
pub async fn info(State(state): State<AppState>) -> Json<InfoResponse> {
    let limits = state.effective_limits();

    let routes = state
        .routes()
        .iter()
        .map(|route| {
            let endpoint = state.routes().resolve(route.path(), &limits);
            RouteInfo {
                path: route.path().to_string(),
                limit: endpoint.and_then(|endpoint| limits.get(endpoint)),
                endpoint: endpoint.map(str::to_string),
            }
        })
        .collect();

    Json(InfoResponse {
        name: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        enforcement: state.config.enforcement.to_string(),
        routes,
    })
}

/// List configured and runtime limits.
#[instrument(skip(state))]
pub async fn list_limits(State(state): State<AppState>) -> Json<LimitsResponse> {
    Json(LimitsResponse::new(
        &state.config.bandwidth_limits,
        &state.limiter.snapshot(),
    ))
}

/// Set or replace a runtime limit.
#[instrument(skip(state))]
pub async fn set_limit(
    State(state): State<AppState>,
    Json(request): Json<SetLimitRequest>,
) -> AppResult<Json<LimitResponse>> {
    validate_endpoint_name(&request.endpoint)?;
    let rate = validate_rate(request.limit)?;

    let previous = state.limiter.limit(request.endpoint.clone(), rate);
    metrics::record_limit_update("set");

    Ok(Json(LimitResponse {
        status: "success".to_string(),
        endpoint: request.endpoint,
        limit: Some(rate),
        previous,
    }))
}

/// Remove a runtime limit.
#[instrument(skip(state))]
pub async fn delete_limit(
    State(state): State<AppState>,
    Path(endpoint): Path<String>,
) -> AppResult<Json<LimitResponse>> {
    validate_endpoint_name(&endpoint)?;

    let previous = state.limiter.remove(&endpoint).ok_or_else(|| {
        AppError::NotFound(format!("No runtime limit set for endpoint '{endpoint}'"))
    })?;
    metrics::record_limit_update("remove");

    if let Some(configured) = state.config.bandwidth_limits.get(&endpoint) {
        info!(endpoint = %endpoint, limit = configured.get(), "Configured limit applies again");
    }

    Ok(Json(LimitResponse {
        status: "success".to_string(),
        endpoint,
        limit: None,
        previous: Some(previous),
    }))
}
