//! # Response Throttle
//!
//! Per-route response bandwidth limiting for Axum:
//!
//! - **Route resolution**: request path → endpoint identifier (declared
//!   route name, else handler name) → byte rate
//! - **Pacing**: response bodies re-emitted chunk by chunk, unmodified and
//!   in order, no faster than the endpoint's rate
//! - **Runtime limits**: lock-free limit snapshots, changed without restart
//! - **Observability**: structured logging and Prometheus metrics
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Middleware (Trace → Bandwidth)                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  RouteResolver (TrackedRouter table + EffectiveLimits)      │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Pacing (PacedStream / PacedBody, tokio timers)             │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Limits (configured LimitMap + BandwidthLimiter)            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use response_throttle::{Config, build_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let addr = config.server_addr();
//!     let (app, state) = build_router(config);
//!
//!     // Limits set through the state apply to the next request.
//!     if let Some(rate) = response_throttle::BytesPerSecond::new(10_000) {
//!         state.limiter.limit("get_data", rate);
//!     }
//!
//!     let listener = tokio::net::TcpListener::bind(addr).await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! ```bash
//! BANDWIDTH_LIMITS=get_data=10000,slow=50 cargo run
//! ```

pub mod application;
pub mod config;
pub mod error;
pub mod handlers;
pub mod limits;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod pacing;
pub mod routes;
pub mod routing;
pub mod state;
pub mod utils;
pub mod validation;

// Re-exports for convenience
pub use application::{ActiveApp, Application, WrappedApp};
pub use config::Config;
pub use error::{AppError, AppResult, BandwidthLimitExceeded};
pub use limits::{BandwidthLimiter, BytesPerSecond, LimitMap, LimitProvider, SharedLimits};
pub use middleware::{BandwidthLayer, Enforcement};
pub use pacing::{PacedBody, PacedStream};
pub use routes::build_router;
pub use routing::{RouteDescriptor, RouteResolver, RouteTable, TrackedRouter};
pub use state::AppState;
