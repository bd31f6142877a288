//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response logging
//! └────────┬─────────┘
//!          │
//!          ▼
//! ┌──────────────────┐
//! │    Bandwidth     │ ← paces limited bodies, or 429 in reject mode
//! └────────┬─────────┘
//!          │
//!          ▼
//!      Handler
//! ```
//!
//! # Route Groups
//!
//! - `/`, `/health` - Usage information and health
//! - `/data`, `/slow`, `/fast`, `/stream` - Sample payloads
//! - `/admin/limits` - Runtime limit administration
//!
//! Every route is registered through [`TrackedRouter`] so the bandwidth
//! layer can map request paths to endpoint identifiers.

use std::sync::Arc;

use axum::Router;
use axum::routing::{delete, get};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::Config;
use crate::handlers;
use crate::middleware::BandwidthLayer;
use crate::routing::{RouteDescriptor, TrackedRouter};
use crate::state::AppState;

/// Build the application router with all routes and middleware configured.
///
/// Returns the router together with its state, whose limiter is the
/// runtime limit provider consulted by the bandwidth layer.
pub fn build_router(config: Config) -> (Router, AppState) {
    let (router, routes) = TrackedRouter::<AppState>::new()
        .route(
            RouteDescriptor::new("/").handler(&handlers::info),
            get(handlers::info),
        )
        .route(
            RouteDescriptor::new("/health").handler(&handlers::health_check),
            get(handlers::health_check),
        )
        .route(
            RouteDescriptor::new("/data").handler(&handlers::get_data),
            get(handlers::get_data),
        )
        .route(
            RouteDescriptor::new("/slow")
                .name("slow")
                .handler(&handlers::slow_response),
            get(handlers::slow_response),
        )
        .route(
            RouteDescriptor::new("/fast")
                .name("fast")
                .handler(&handlers::fast_response),
            get(handlers::fast_response),
        )
        .route(
            RouteDescriptor::new("/stream").handler(&handlers::stream_data),
            get(handlers::stream_data),
        )
        .route(
            RouteDescriptor::new("/admin/limits").name("admin_limits"),
            get(handlers::list_limits).put(handlers::set_limit),
        )
        // Paths match literally, so a templated route carries no identifier.
        .route(
            RouteDescriptor::new("/admin/limits/{endpoint}"),
            delete(handlers::delete_limit),
        )
        .into_parts();

    let state = AppState::new(config, routes);
    let config = &state.config;

    info!(
        routes = state.routes().len(),
        configured_limits = config.bandwidth_limits.len(),
        enforcement = %config.enforcement,
        max_buffered_body_size = config.max_buffered_body_size,
        "Bandwidth limiting configured"
    );
    for (endpoint, rate) in &config.bandwidth_limits {
        info!(endpoint = %endpoint, rate = rate.get(), "Configured bandwidth limit");
    }

    let bandwidth = BandwidthLayer::new(
        Arc::new(state.clone()),
        config.bandwidth_limits.clone(),
    )
    .with_enforcement(config.enforcement)
    .with_max_buffered_body_size(config.max_buffered_body_size);

    let router = router
        .layer(bandwidth)
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    (router, state)
}
