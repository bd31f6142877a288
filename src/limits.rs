//! Bandwidth limits keyed by endpoint identifier.
//!
//! # Sources
//!
//! Two sources of limits are consulted for every request:
//!
//! - **Configured limits**: a plain [`LimitMap`] handed to the middleware at
//!   construction time (typically from `BANDWIDTH_LIMITS`).
//! - **Supplementary limits**: a [`LimitProvider`] exposed by the running
//!   application, either a bare [`SharedLimits`] or a [`BandwidthLimiter`]
//!   owning one. This is the only way to change limits without restarting.
//!
//! Supplementary entries take precedence over configured ones for the same
//! endpoint. The overlay is rebuilt on every request ([`EffectiveLimits`]),
//! so runtime changes apply to the next request.
//!
//! # Concurrency
//!
//! [`SharedLimits`] stores its map behind `ArcSwap`. Readers take an atomic
//! snapshot without locking; writers publish a modified copy with `rcu`. A
//! reader racing a writer sees either the old or the new map, never a
//! partially updated one.

use std::collections::HashMap;
use std::fmt;
use std::num::NonZeroU64;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::{Serialize, Serializer};
use tracing::{debug, info};

use crate::error::BandwidthLimitExceeded;

/// A strictly positive byte rate.
///
/// Zero cannot be represented, so pacing never divides by zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BytesPerSecond(NonZeroU64);

impl BytesPerSecond {
    /// Returns `None` for a zero rate.
    pub const fn new(rate: u64) -> Option<Self> {
        match NonZeroU64::new(rate) {
            Some(rate) => Some(Self(rate)),
            None => None,
        }
    }

    pub const fn get(self) -> u64 {
        self.0.get()
    }

    /// Time needed to deliver `len` bytes at this rate.
    pub fn delay_for(self, len: usize) -> Duration {
        if len == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(len as f64 / self.0.get() as f64)
    }

    /// Whether `bytes` fit in one second's budget.
    pub fn admits(self, bytes: u64) -> bool {
        bytes <= self.0.get()
    }
}

impl fmt::Display for BytesPerSecond {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for BytesPerSecond {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(self.get())
    }
}

/// Endpoint identifier → byte rate.
pub type LimitMap = HashMap<String, BytesPerSecond>;

/// Anything that can hand out the current limit mapping.
///
/// Implementations must return a consistent snapshot; callers never lock.
pub trait LimitProvider: Send + Sync {
    fn limits(&self) -> Arc<LimitMap>;
}

/// Runtime-mutable limit mapping with lock-free snapshot reads.
///
/// Clones share the same underlying mapping.
#[derive(Clone)]
pub struct SharedLimits {
    inner: Arc<ArcSwap<LimitMap>>,
}

impl SharedLimits {
    pub fn new(limits: LimitMap) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(limits)),
        }
    }

    /// Set the limit for `endpoint`, returning the previous one.
    pub fn set(&self, endpoint: impl Into<String>, rate: BytesPerSecond) -> Option<BytesPerSecond> {
        let endpoint = endpoint.into();
        let previous = self.inner.rcu(|current| {
            let mut next = LimitMap::clone(current);
            next.insert(endpoint.clone(), rate);
            next
        });
        previous.get(&endpoint).copied()
    }

    /// Remove the limit for `endpoint`, returning it if one was set.
    pub fn remove(&self, endpoint: &str) -> Option<BytesPerSecond> {
        let previous = self.inner.rcu(|current| {
            let mut next = LimitMap::clone(current);
            next.remove(endpoint);
            next
        });
        previous.get(endpoint).copied()
    }

    /// Replace the whole mapping at once.
    pub fn replace(&self, limits: LimitMap) {
        self.inner.store(Arc::new(limits));
    }

    pub fn get(&self, endpoint: &str) -> Option<BytesPerSecond> {
        self.inner.load().get(endpoint).copied()
    }

    pub fn snapshot(&self) -> Arc<LimitMap> {
        self.inner.load_full()
    }

    pub fn len(&self) -> usize {
        self.inner.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.load().is_empty()
    }
}

impl Default for SharedLimits {
    fn default() -> Self {
        Self::new(LimitMap::new())
    }
}

impl fmt::Debug for SharedLimits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedLimits")
            .field("limits", &self.inner.load())
            .finish()
    }
}

impl LimitProvider for SharedLimits {
    fn limits(&self) -> Arc<LimitMap> {
        self.snapshot()
    }
}

/// Limiter object owning a `routes` mapping of per-endpoint limits.
///
/// Register it as the application's limit provider (see
/// [`Application::limit_provider`](crate::application::Application::limit_provider))
/// and every change made through it applies to the next request.
///
/// # Example
///
/// ```rust
/// use response_throttle::limits::{BandwidthLimiter, BytesPerSecond};
///
/// let limiter = BandwidthLimiter::new();
/// let rate = BytesPerSecond::new(10_000).unwrap();
/// limiter.limit("get_data", rate);
/// assert_eq!(limiter.get("get_data"), Some(rate));
/// ```
#[derive(Debug, Clone, Default)]
pub struct BandwidthLimiter {
    routes: SharedLimits,
}

impl BandwidthLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: LimitMap) -> Self {
        Self {
            routes: SharedLimits::new(limits),
        }
    }

    /// The mapping this limiter owns.
    pub fn routes(&self) -> &SharedLimits {
        &self.routes
    }

    /// Limit `endpoint` to `rate`, replacing any existing limit.
    pub fn limit(&self, endpoint: impl Into<String>, rate: BytesPerSecond) -> Option<BytesPerSecond> {
        let endpoint = endpoint.into();
        let previous = self.routes.set(endpoint.clone(), rate);
        info!(
            endpoint = %endpoint,
            rate = rate.get(),
            previous = previous.map(BytesPerSecond::get),
            "Bandwidth limit set"
        );
        previous
    }

    /// Lift the limit on `endpoint`.
    pub fn remove(&self, endpoint: &str) -> Option<BytesPerSecond> {
        let removed = self.routes.remove(endpoint);
        if removed.is_some() {
            info!(endpoint = %endpoint, "Bandwidth limit removed");
        }
        removed
    }

    pub fn get(&self, endpoint: &str) -> Option<BytesPerSecond> {
        self.routes.get(endpoint)
    }

    pub fn snapshot(&self) -> Arc<LimitMap> {
        self.routes.snapshot()
    }

    /// Hard check for hosts that reject instead of throttle.
    ///
    /// Fails when a body of `bytes` would need more than one second at the
    /// endpoint's rate. Unlimited endpoints always pass.
    pub fn check(&self, endpoint: &str, bytes: u64) -> Result<(), BandwidthLimitExceeded> {
        match self.get(endpoint) {
            Some(rate) if !rate.admits(bytes) => {
                debug!(endpoint = %endpoint, bytes, limit = rate.get(), "Body exceeds bandwidth budget");
                Err(BandwidthLimitExceeded::new(endpoint, rate))
            }
            _ => Ok(()),
        }
    }
}

impl LimitProvider for BandwidthLimiter {
    fn limits(&self) -> Arc<LimitMap> {
        self.routes.snapshot()
    }
}

/// Per-request view of configured limits overlaid by a supplementary source.
///
/// Holds one snapshot of the supplementary mapping, so all lookups within a
/// request see the same version of it.
#[derive(Debug)]
pub struct EffectiveLimits<'a> {
    configured: &'a LimitMap,
    supplementary: Option<Arc<LimitMap>>,
}

impl<'a> EffectiveLimits<'a> {
    pub fn new(configured: &'a LimitMap, provider: Option<&dyn LimitProvider>) -> Self {
        Self {
            configured,
            supplementary: provider.map(|provider| provider.limits()),
        }
    }

    /// Supplementary entries win over configured ones.
    pub fn get(&self, endpoint: &str) -> Option<BytesPerSecond> {
        self.supplementary
            .as_ref()
            .and_then(|limits| limits.get(endpoint))
            .or_else(|| self.configured.get(endpoint))
            .copied()
    }

    pub fn contains(&self, endpoint: &str) -> bool {
        self.get(endpoint).is_some()
    }
}
