//! Route table and endpoint resolution.
//!
//! axum's `Router` does not expose its routes, so the table consulted by the
//! bandwidth middleware is recorded alongside route registration by
//! [`TrackedRouter`]. Each entry is a [`RouteDescriptor`]: the path, an
//! optional declared route name, and an optional handler name.
//!
//! # Resolution
//!
//! ```text
//! path ──► entries with exactly equal path (table order)
//!              │
//!              ├─ declared name in limits?  ──► endpoint
//!              ├─ handler name in limits?   ──► endpoint
//!              └─ neither                   ──► next entry
//!
//! no entry left ──► no match (response passes through untouched)
//! ```
//!
//! There is no prefix matching and no path-parameter interpolation: a route
//! registered as `/items/{id}` only matches the literal path `/items/{id}`.

use std::sync::Arc;

use axum::Router;
use axum::routing::MethodRouter;
use tracing::trace;

use crate::application::{Application, innermost};
use crate::limits::{BytesPerSecond, EffectiveLimits, LimitMap};

/// Declared name of a handler function, derived from its type name.
///
/// Returns the last path segment (`get_data` for
/// `my_app::handlers::get_data`). Closures have no declared name.
pub fn handler_name<H: ?Sized>(handler: &H) -> Option<&'static str> {
    let full = std::any::type_name_of_val(handler);
    let path = full.split('<').next().unwrap_or(full);
    let name = path.rsplit("::").next()?;

    if name.is_empty() || name.contains('{') {
        return None;
    }
    Some(name)
}

/// One entry of the route table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor {
    path: String,
    name: Option<String>,
    handler: Option<String>,
}

impl RouteDescriptor {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            name: None,
            handler: None,
        }
    }

    /// Set the declared route name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Record the handler's declared name from the handler itself.
    pub fn handler<H>(mut self, handler: &H) -> Self {
        self.handler = handler_name(handler).map(str::to_string);
        self
    }

    /// Record a handler identifier explicitly.
    pub fn handler_id(mut self, id: impl Into<String>) -> Self {
        self.handler = Some(id.into());
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn declared_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn handler_name(&self) -> Option<&str> {
        self.handler.as_deref()
    }

    /// Candidate endpoint identifiers in preference order.
    fn candidates(&self) -> impl Iterator<Item = &str> {
        self.name.as_deref().into_iter().chain(self.handler.as_deref())
    }
}

/// Ordered list of route descriptors.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<RouteDescriptor>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, descriptor: RouteDescriptor) {
        self.entries.push(descriptor);
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteDescriptor> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Endpoint identifier for `path`, if it has a limit in `limits`.
    pub fn resolve(&self, path: &str, limits: &EffectiveLimits<'_>) -> Option<&str> {
        self.entries
            .iter()
            .filter(|entry| entry.path == path)
            .find_map(|entry| entry.candidates().find(|id| limits.contains(id)))
    }
}

impl FromIterator<RouteDescriptor> for RouteTable {
    fn from_iter<I: IntoIterator<Item = RouteDescriptor>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// An endpoint and the rate that applies to it for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLimit {
    pub endpoint: String,
    pub rate: BytesPerSecond,
}

/// Maps a request to the limit that applies to it.
///
/// Holds the configured limits; the supplementary limits and the route
/// table are read from the active application on every call.
#[derive(Debug, Clone, Default)]
pub struct RouteResolver {
    configured: Arc<LimitMap>,
}

impl RouteResolver {
    pub fn new(configured: LimitMap) -> Self {
        Self {
            configured: Arc::new(configured),
        }
    }

    pub fn configured(&self) -> &LimitMap {
        &self.configured
    }

    /// Resolve `path` against `app`.
    ///
    /// Returns `None` when no route table is reachable, no entry matches, or
    /// the matched entry has no limit.
    pub fn resolve(&self, app: &dyn Application, path: &str) -> Option<ResolvedLimit> {
        let Some(app) = innermost(app) else {
            trace!(path, "No route table reachable from application");
            return None;
        };
        let table = app.route_table()?;
        let limits = EffectiveLimits::new(&self.configured, app.limit_provider());

        let endpoint = table.resolve(path, &limits)?;
        let rate = limits.get(endpoint)?;
        trace!(path, endpoint, rate = rate.get(), "Resolved bandwidth limit");

        Some(ResolvedLimit {
            endpoint: endpoint.to_string(),
            rate,
        })
    }
}

/// An axum `Router` that records a [`RouteTable`] as routes are added.
///
/// # Example
///
/// ```rust,ignore
/// let (router, table) = TrackedRouter::new()
///     .route(RouteDescriptor::new("/data").handler(&get_data), get(get_data))
///     .route(RouteDescriptor::new("/slow").name("slow"), get(slow_response))
///     .into_parts();
/// ```
pub struct TrackedRouter<S = ()> {
    router: Router<S>,
    table: RouteTable,
}

impl<S> TrackedRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            router: Router::new(),
            table: RouteTable::new(),
        }
    }

    /// Register `method_router` at the descriptor's path and record it.
    pub fn route(mut self, descriptor: RouteDescriptor, method_router: MethodRouter<S>) -> Self {
        self.router = self.router.route(descriptor.path(), method_router);
        self.table.push(descriptor);
        self
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    pub fn into_parts(self) -> (Router<S>, RouteTable) {
        (self.router, self.table)
    }
}

impl<S> Default for TrackedRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
