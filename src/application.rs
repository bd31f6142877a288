//! The view of the hosting application that the bandwidth middleware needs.
//!
//! The middleware never inspects the host's state directly. It asks an
//! [`Application`] for three things:
//!
//! - the route table it serves, if it owns one;
//! - the supplementary [`LimitProvider`], if it exposes one;
//! - the application it wraps, if it is an outer layer.
//!
//! Outer layers ([`WrappedApp`]) own no routes; resolution always walks down
//! to the innermost application that owns a route table.

use std::sync::Arc;

use crate::limits::LimitProvider;
use crate::routing::RouteTable;

/// Deepest nesting followed before giving up.
pub const MAX_NESTING_DEPTH: usize = 32;

/// A hosting application as seen by the bandwidth middleware.
pub trait Application: Send + Sync {
    fn route_table(&self) -> Option<&RouteTable> {
        None
    }

    fn limit_provider(&self) -> Option<&dyn LimitProvider> {
        None
    }

    fn inner(&self) -> Option<&dyn Application> {
        None
    }
}

/// The innermost application in the chain that owns a route table.
pub fn innermost(app: &dyn Application) -> Option<&dyn Application> {
    let mut current = Some(app);
    let mut found = None;

    for _ in 0..MAX_NESTING_DEPTH {
        let Some(app) = current else { break };
        if app.route_table().is_some() {
            found = Some(app);
        }
        current = app.inner();
    }

    found
}

/// An outer layer around another application.
///
/// Carries no routes and no limits of its own.
#[derive(Clone)]
pub struct WrappedApp {
    inner: Arc<dyn Application>,
}

impl WrappedApp {
    pub fn new(inner: Arc<dyn Application>) -> Self {
        Self { inner }
    }
}

impl Application for WrappedApp {
    fn inner(&self) -> Option<&dyn Application> {
        Some(self.inner.as_ref())
    }
}

/// Request extension naming the application serving this request.
///
/// When present it takes precedence over the application the middleware was
/// constructed with. Insert it with `axum::Extension` in an outer layer.
#[derive(Clone)]
pub struct ActiveApp(pub Arc<dyn Application>);

impl ActiveApp {
    pub fn new(app: Arc<dyn Application>) -> Self {
        Self(app)
    }
}

impl std::fmt::Debug for ActiveApp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ActiveApp").finish_non_exhaustive()
    }
}
