//! Validation and parsing of endpoint identifiers and byte rates.
//!
//! Used both for the `BANDWIDTH_LIMITS` environment variable and for the
//! admin API, so the same rules apply to static and runtime limits.

use crate::error::{AppError, AppResult};
use crate::limits::{BytesPerSecond, LimitMap};

// =============================================================================
// Validation Constants
// =============================================================================

/// Maximum length for an endpoint identifier.
pub const MAX_ENDPOINT_NAME_LENGTH: usize = 255;

/// Separator between entries of a limit spec.
pub const ENTRY_SEPARATOR: char = ',';

/// Separator between endpoint and rate within an entry.
pub const RATE_SEPARATOR: char = '=';

/// Validate an endpoint identifier.
///
/// Rules:
/// - Must be between 1 and 255 characters
/// - Must not contain whitespace, control characters, `,` or `=`
pub fn validate_endpoint_name(name: &str) -> AppResult<()> {
    if name.is_empty() {
        return Err(AppError::InvalidLimit(
            "Endpoint name cannot be empty".to_string(),
        ));
    }

    if name.len() > MAX_ENDPOINT_NAME_LENGTH {
        return Err(AppError::InvalidLimit(format!(
            "Endpoint name cannot exceed {MAX_ENDPOINT_NAME_LENGTH} characters"
        )));
    }

    if let Some((i, c)) = name.char_indices().find(|(_, c)| {
        c.is_whitespace() || c.is_control() || *c == ENTRY_SEPARATOR || *c == RATE_SEPARATOR
    }) {
        return Err(AppError::InvalidLimit(format!(
            "Endpoint name contains invalid character {c:?} at position {i}"
        )));
    }

    Ok(())
}

/// Validate a byte rate received as a signed integer (e.g. from JSON).
pub fn validate_rate(rate: i64) -> AppResult<BytesPerSecond> {
    u64::try_from(rate)
        .ok()
        .and_then(BytesPerSecond::new)
        .ok_or_else(|| {
            AppError::InvalidLimit(format!(
                "Rate must be a positive number of bytes per second (got {rate})"
            ))
        })
}

/// Parse a byte rate from text.
pub fn parse_rate(rate: &str) -> AppResult<BytesPerSecond> {
    let rate = rate.trim();
    let value: u64 = rate
        .parse()
        .map_err(|e| AppError::InvalidLimit(format!("Invalid rate '{rate}': {e}")))?;

    BytesPerSecond::new(value).ok_or_else(|| {
        AppError::InvalidLimit("Rate must be greater than 0 bytes per second".to_string())
    })
}

/// Parse a comma-separated `endpoint=rate` list into a [`LimitMap`].
///
/// Empty entries are ignored, so `""` and `"a=1,"` are valid. An endpoint
/// listed twice is an error.
///
/// ```rust
/// use response_throttle::validation::parse_limit_spec;
///
/// let limits = parse_limit_spec("get_data=10000, slow=50").unwrap();
/// assert_eq!(limits["slow"].get(), 50);
/// ```
pub fn parse_limit_spec(spec: &str) -> AppResult<LimitMap> {
    let mut limits = LimitMap::new();

    for entry in spec.split(ENTRY_SEPARATOR).map(str::trim) {
        if entry.is_empty() {
            continue;
        }

        let Some((endpoint, rate)) = entry.split_once(RATE_SEPARATOR) else {
            return Err(AppError::InvalidLimit(format!(
                "Expected 'endpoint=rate', got '{entry}'"
            )));
        };

        let endpoint = endpoint.trim();
        validate_endpoint_name(endpoint)?;
        let rate = parse_rate(rate)?;

        if limits.insert(endpoint.to_string(), rate).is_some() {
            return Err(AppError::InvalidLimit(format!(
                "Endpoint '{endpoint}' is limited more than once"
            )));
        }
    }

    Ok(limits)
}
