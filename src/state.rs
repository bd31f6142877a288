//! Shared application state for Axum handlers.
//!
//! The state is also the [`Application`] the bandwidth middleware consults:
//! it owns the route table recorded while building the router and exposes
//! the runtime [`BandwidthLimiter`] as its limit provider.
//!
//! # Thread Safety
//!
//! All state components are wrapped in `Arc` or use lock-free snapshots
//! (`BandwidthLimiter`), so cloning per handler is cheap and concurrent
//! reads never block a limit update.

use std::sync::Arc;
use std::time::Instant;

use crate::application::Application;
use crate::config::Config;
use crate::limits::{BandwidthLimiter, EffectiveLimits, LimitProvider};
use crate::routing::RouteTable;

/// Shared application state for Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// Runtime-mutable limits, overriding configured ones
    pub limiter: BandwidthLimiter,
    /// Timestamp when the application started
    pub started_at: Instant,
    routes: Arc<RouteTable>,
}

impl AppState {
    /// Create state for a router whose routes were recorded in `routes`.
    ///
    /// The runtime limiter starts empty; static limits stay in
    /// `config.bandwidth_limits`.
    pub fn new(config: Config, routes: RouteTable) -> Self {
        Self {
            config: Arc::new(config),
            limiter: BandwidthLimiter::new(),
            started_at: Instant::now(),
            routes: Arc::new(routes),
        }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Configured limits overlaid by the runtime limiter, as the middleware sees them.
    pub fn effective_limits(&self) -> EffectiveLimits<'_> {
        EffectiveLimits::new(&self.config.bandwidth_limits, Some(&self.limiter))
    }

    /// Get the application uptime in seconds.
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

impl Application for AppState {
    fn route_table(&self) -> Option<&RouteTable> {
        Some(&self.routes)
    }

    fn limit_provider(&self) -> Option<&dyn LimitProvider> {
        Some(&self.limiter)
    }
}
