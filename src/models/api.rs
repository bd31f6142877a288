use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::limits::{BytesPerSecond, LimitMap};

/// Request to set a runtime bandwidth limit.
///
/// `limit` is signed so that negative values reach validation and are
/// reported as invalid limits rather than as malformed JSON.
#[derive(Debug, Deserialize)]
pub struct SetLimitRequest {
    /// Endpoint identifier (route name or handler name)
    pub endpoint: String,
    /// Bytes per second
    pub limit: i64,
}

/// Response after setting or removing a runtime limit.
#[derive(Debug, Serialize)]
pub struct LimitResponse {
    /// Always "success"
    pub status: String,
    pub endpoint: String,
    /// The new limit, absent after removal
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<BytesPerSecond>,
    /// The runtime limit this change replaced, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous: Option<BytesPerSecond>,
}

/// All limits known to the service.
///
/// Sorted by endpoint for stable output.
#[derive(Debug, Serialize)]
pub struct LimitsResponse {
    /// Limits from `BANDWIDTH_LIMITS`
    pub configured: BTreeMap<String, BytesPerSecond>,
    /// Limits set at runtime; these win over configured ones
    pub runtime: BTreeMap<String, BytesPerSecond>,
}

impl LimitsResponse {
    pub fn new(configured: &LimitMap, runtime: &LimitMap) -> Self {
        fn sorted(limits: &LimitMap) -> BTreeMap<String, BytesPerSecond> {
            limits.iter().map(|(k, v)| (k.clone(), *v)).collect()
        }

        Self {
            configured: sorted(configured),
            runtime: sorted(runtime),
        }
    }
}

/// One served route and the limit currently applied to it.
#[derive(Debug, Serialize)]
pub struct RouteInfo {
    pub path: String,
    /// Endpoint identifier the limit was resolved under
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// Effective limit in bytes/second, absent when unlimited
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<BytesPerSecond>,
}

/// Usage information served at `/`.
#[derive(Debug, Serialize)]
pub struct InfoResponse {
    pub name: String,
    pub version: String,
    /// "throttle" or "reject"
    pub enforcement: String,
    pub routes: Vec<RouteInfo>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service health status
    pub status: String,
    /// Service version
    pub version: String,
    /// Uptime in seconds
    pub uptime_seconds: u64,
    /// Current timestamp
    pub timestamp: DateTime<Utc>,
}

/// Query parameters for the streaming demo endpoint.
#[derive(Debug, Deserialize)]
pub struct StreamParams {
    /// Number of chunks to send
    #[serde(default = "default_chunks")]
    pub chunks: usize,
    /// Bytes per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Pace the stream at the source, in bytes/second
    #[serde(default)]
    pub rate: Option<i64>,
}

fn default_chunks() -> usize {
    10
}

fn default_chunk_size() -> usize {
    100
}
