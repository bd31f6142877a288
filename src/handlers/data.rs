//! Sample payload endpoints.
//!
//! None of these handlers limit themselves; the bandwidth middleware paces
//! them when a limit is set for their endpoint identifier. `/stream` can
//! additionally pace at the source with `?rate=`.

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::Query;
use futures_util::stream;
use tracing::instrument;

use crate::error::{AppError, AppResult};
use crate::models::StreamParams;
use crate::pacing::paced_stream_body;
use crate::validation::validate_rate;

/// Size of the `/data` payload (50KB).
pub const DATA_SIZE: usize = 50_000;

/// Size of the `/slow` and `/fast` payloads.
pub const SMALL_PAYLOAD_SIZE: usize = 150;

pub const MAX_STREAM_CHUNKS: usize = 10_000;
pub const MAX_STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Large text payload.
#[instrument]
pub async fn get_data() -> String {
    "a".repeat(DATA_SIZE)
}

/// Small payload, registered under the route name `slow`.
#[instrument]
pub async fn slow_response() -> String {
    "s".repeat(SMALL_PAYLOAD_SIZE)
}

/// Small payload, registered under the route name `fast`.
#[instrument]
pub async fn fast_response() -> String {
    "f".repeat(SMALL_PAYLOAD_SIZE)
}

/// Chunked body of `chunks` × `chunk_size` bytes with no declared length.
///
/// Chunk `i` is filled with the digit `i % 10`, so reordering or loss is
/// visible to the client.
#[instrument]
pub async fn stream_data(Query(params): Query<StreamParams>) -> AppResult<Body> {
    if params.chunks > MAX_STREAM_CHUNKS {
        return Err(AppError::BadRequest(format!(
            "chunks cannot exceed {MAX_STREAM_CHUNKS}"
        )));
    }
    if params.chunk_size > MAX_STREAM_CHUNK_SIZE {
        return Err(AppError::BadRequest(format!(
            "chunk_size cannot exceed {MAX_STREAM_CHUNK_SIZE}"
        )));
    }
    let rate = params.rate.map(validate_rate).transpose()?;

    let chunk_size = params.chunk_size;
    let chunks = stream::iter((0..params.chunks).map(move |i| {
        let digit = b'0' + (i % 10) as u8;
        Ok::<_, Infallible>(Bytes::from(vec![digit; chunk_size]))
    }));

    Ok(paced_stream_body(chunks, rate))
}
