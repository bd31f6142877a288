//! Per-route response bandwidth middleware.
//!
//! # Flow
//!
//! ```text
//! Request ──► resolve endpoint (route table + limits) ──► no limit ──► inner service, untouched
//!                          │
//!                          └─ limit R ──► inner service ──► Throttle: pace body at R
//!                                                       └─► Reject:   429 if body > R bytes
//! ```
//!
//! Resolution runs before the inner service is called and reads the limits
//! afresh for every request, so limit changes made through the
//! application's limit provider apply to the next request.
//!
//! # Active Application
//!
//! The route table and supplementary limits come from the application the
//! layer was built with, unless the request carries an
//! [`ActiveApp`] extension, in which case that application is used.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use tower::{Layer, Service};
use tracing::{debug, trace};

use crate::application::{ActiveApp, Application};
use crate::error::BandwidthLimitExceeded;
use crate::limits::LimitMap;
use crate::metrics;
use crate::pacing::{BodyShape, throttle_body};
use crate::routing::{ResolvedLimit, RouteResolver};

/// Default size up to which a known-length body is paced as one buffer (1 MiB).
pub const DEFAULT_MAX_BUFFERED_BODY_SIZE: u64 = 1024 * 1024;

/// What to do with a response on a limited endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Enforcement {
    /// Deliver the full body, paced at the endpoint's rate.
    #[default]
    Throttle,
    /// Answer 429 when a body of known size exceeds one second's budget.
    /// Bodies of unknown size are throttled.
    Reject,
}

/// Error parsing an [`Enforcement`] mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseEnforcementError(String);

impl fmt::Display for ParseEnforcementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown enforcement mode '{}'; expected 'throttle' or 'reject'",
            self.0
        )
    }
}

impl std::error::Error for ParseEnforcementError {}

impl FromStr for Enforcement {
    type Err = ParseEnforcementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "throttle" => Ok(Self::Throttle),
            "reject" => Ok(Self::Reject),
            _ => Err(ParseEnforcementError(s.to_string())),
        }
    }
}

impl fmt::Display for Enforcement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Throttle => f.write_str("throttle"),
            Self::Reject => f.write_str("reject"),
        }
    }
}

/// Bandwidth throttling layer for the Tower middleware stack.
///
/// # Example
///
/// ```rust,ignore
/// let app: Arc<dyn Application> = Arc::new(state.clone());
/// let router = router.layer(BandwidthLayer::new(app, configured_limits));
/// ```
#[derive(Clone)]
pub struct BandwidthLayer {
    app: Arc<dyn Application>,
    resolver: RouteResolver,
    enforcement: Enforcement,
    max_buffered_body_size: u64,
}

impl BandwidthLayer {
    /// Create a layer for `app` with statically configured `limits`.
    ///
    /// Limits exposed by the application's provider override `limits` for
    /// the same endpoint.
    pub fn new(app: Arc<dyn Application>, limits: LimitMap) -> Self {
        Self {
            app,
            resolver: RouteResolver::new(limits),
            enforcement: Enforcement::default(),
            max_buffered_body_size: DEFAULT_MAX_BUFFERED_BODY_SIZE,
        }
    }

    pub fn with_enforcement(mut self, enforcement: Enforcement) -> Self {
        self.enforcement = enforcement;
        self
    }

    pub fn with_max_buffered_body_size(mut self, size: u64) -> Self {
        self.max_buffered_body_size = size;
        self
    }
}

impl<S> Layer<S> for BandwidthLayer {
    type Service = BandwidthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BandwidthService {
            inner,
            app: self.app.clone(),
            resolver: self.resolver.clone(),
            enforcement: self.enforcement,
            max_buffered_body_size: self.max_buffered_body_size,
        }
    }
}

/// Bandwidth throttling service wrapper.
#[derive(Clone)]
pub struct BandwidthService<S> {
    inner: S,
    app: Arc<dyn Application>,
    resolver: RouteResolver,
    enforcement: Enforcement,
    max_buffered_body_size: u64,
}

impl<S> Service<Request<Body>> for BandwidthService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let app = req
            .extensions()
            .get::<ActiveApp>()
            .map(|active| active.0.clone())
            .unwrap_or_else(|| self.app.clone());
        let resolved = self.resolver.resolve(app.as_ref(), req.uri().path());

        let enforcement = self.enforcement;
        let max_buffered = self.max_buffered_body_size;
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let Some(limit) = resolved else {
                trace!(path = %req.uri().path(), "No bandwidth limit, passing through");
                metrics::record_passthrough();
                return inner.call(req).await;
            };

            let response = inner.call(req).await?;
            Ok(limit_response(response, limit, enforcement, max_buffered).await)
        })
    }
}

async fn limit_response(
    response: Response<Body>,
    limit: ResolvedLimit,
    enforcement: Enforcement,
    max_buffered: u64,
) -> Response<Body> {
    let (parts, body) = response.into_parts();

    if enforcement == Enforcement::Reject
        && let Some(len) = http_body::Body::size_hint(&body).exact()
        && !limit.rate.admits(len)
    {
        metrics::record_rejected(&limit.endpoint);
        return BandwidthLimitExceeded::new(limit.endpoint, limit.rate).into_response();
    }

    let shape = BodyShape::detect(&body, max_buffered);
    debug!(
        endpoint = %limit.endpoint,
        rate = limit.rate.get(),
        shape = ?shape,
        "Throttling response body"
    );
    metrics::record_throttled(&limit.endpoint);

    let started = Instant::now();
    let body = throttle_body(body, limit.rate, max_buffered).await;
    if let BodyShape::Buffered(_) = shape {
        metrics::record_buffered_delay(&limit.endpoint, started.elapsed().as_secs_f64());
    }

    Response::from_parts(parts, body)
}
