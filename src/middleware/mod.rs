//! HTTP middleware for per-route response bandwidth.
//!
//! # Architecture
//!
//! ```text
//! Request → Trace → Bandwidth → Handler → Response
//!                      ↓
//!          paced body, or 429 Too Many Requests (reject mode)
//! ```
//!
//! The bandwidth layer resolves the endpoint identifier of each request
//! against the innermost application's route table and applies the limit
//! found for it, if any, to the response body.

pub mod bandwidth;

pub use bandwidth::{
    BandwidthLayer, BandwidthService, DEFAULT_MAX_BUFFERED_BODY_SIZE, Enforcement,
    ParseEnforcementError,
};
