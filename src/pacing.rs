//! Paced delivery of response bodies.
//!
//! # Algorithm
//!
//! After a non-empty chunk of `L` bytes is handed to the consumer, the next
//! poll is suspended for `L / R` seconds, where `R` is the endpoint's rate.
//! The suspension also precedes end-of-stream, so the last chunk is paced
//! like every other one. Chunks are never split, merged, or altered, and
//! zero-length chunks add no delay.
//!
//! [`PacedBody`] holds each data frame until its delay has elapsed and only
//! then releases it. A transport that stops polling once the declared
//! `Content-Length` has been written still waits out every frame's delay.
//!
//! Delays are `tokio::time::Sleep` futures: only the task driving the body
//! is suspended. Nothing happens between polls, so a dropped body stops
//! both the delays and the pulls from the upstream producer.
//!
//! # Body Shapes
//!
//! | Shape       | Detected by                               | Handling                        |
//! |-------------|-------------------------------------------|---------------------------------|
//! | `Empty`     | end of stream or exact size 0             | untouched                       |
//! | `Buffered`  | exact size ≤ `max_buffered`               | drained through the pacer first |
//! | `Streaming` | unknown size, or larger than `max_buffered` | wrapped in [`PacedBody`]       |
//!
//! A buffered body is paced before the response head is released: with
//! `Content-Length` framing a client would otherwise receive the whole
//! buffer immediately and never observe the delay.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll, ready};

use axum::BoxError;
use axum::body::{Body, Bytes};
use futures_util::{Stream, StreamExt, stream};
use http_body::{Body as HttpBody, Frame, SizeHint};
use tokio::time::{Sleep, sleep};

use crate::limits::BytesPerSecond;

/// Delay state shared by [`PacedStream`] and [`PacedBody`].
#[derive(Debug)]
struct Pacer {
    rate: BytesPerSecond,
    delay: Option<Pin<Box<Sleep>>>,
}

impl Pacer {
    fn new(rate: BytesPerSecond) -> Self {
        Self { rate, delay: None }
    }

    /// Wait out the delay owed for the previous chunk, if any.
    fn poll_delay(&mut self, cx: &mut Context<'_>) -> Poll<()> {
        if let Some(delay) = self.delay.as_mut() {
            ready!(delay.as_mut().poll(cx));
            self.delay = None;
        }
        Poll::Ready(())
    }

    /// Owe a delay for a chunk of `len` bytes that was just emitted.
    fn charge(&mut self, len: usize) {
        if len > 0 {
            self.delay = Some(Box::pin(sleep(self.rate.delay_for(len))));
        }
    }

    fn is_idle(&self) -> bool {
        self.delay.is_none()
    }
}

/// A chunk stream re-emitted at no more than a fixed byte rate.
///
/// Errors from the inner stream are passed through unchanged and charge no
/// delay.
///
/// # Example
///
/// ```rust,ignore
/// let chunks = futures_util::stream::iter(vec![Ok::<_, Infallible>(Bytes::from("hello"))]);
/// let body = Body::from_stream(PacedStream::new(chunks, rate));
/// ```
pub struct PacedStream<S> {
    inner: Pin<Box<S>>,
    pacer: Pacer,
}

impl<S> PacedStream<S> {
    pub fn new(inner: S, rate: BytesPerSecond) -> Self {
        Self {
            inner: Box::pin(inner),
            pacer: Pacer::new(rate),
        }
    }

    pub fn rate(&self) -> BytesPerSecond {
        self.pacer.rate
    }
}

impl<S, T, E> Stream for PacedStream<S>
where
    S: Stream<Item = Result<T, E>>,
    T: AsRef<[u8]>,
{
    type Item = Result<T, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        ready!(this.pacer.poll_delay(cx));

        let item = ready!(this.inner.as_mut().poll_next(cx));
        if let Some(Ok(chunk)) = &item {
            this.pacer.charge(chunk.as_ref().len());
        }
        Poll::Ready(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

/// An HTTP body whose data frames are paced; trailers pass through as-is.
///
/// A data frame of `L` bytes is released `L / R` seconds after it was pulled
/// from the inner body. The inner size hint is preserved, so the transport
/// keeps whatever framing it would have chosen for the unpaced body.
pub struct PacedBody<B> {
    inner: Pin<Box<B>>,
    pacer: Pacer,
    held: Option<Frame<Bytes>>,
}

impl<B> PacedBody<B> {
    pub fn new(inner: B, rate: BytesPerSecond) -> Self {
        Self {
            inner: Box::pin(inner),
            pacer: Pacer::new(rate),
            held: None,
        }
    }
}

impl<B> HttpBody for PacedBody<B>
where
    B: HttpBody<Data = Bytes>,
{
    type Data = Bytes;
    type Error = B::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        if this.held.is_none() {
            match ready!(this.inner.as_mut().poll_frame(cx)) {
                Some(Ok(frame)) => {
                    if let Some(data) = frame.data_ref() {
                        this.pacer.charge(data.len());
                    }
                    this.held = Some(frame);
                }
                other => return Poll::Ready(other),
            }
        }

        ready!(this.pacer.poll_delay(cx));
        Poll::Ready(this.held.take().map(Ok))
    }

    fn is_end_stream(&self) -> bool {
        self.held.is_none() && self.pacer.is_idle() && self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

/// How an outgoing body is delivered, and therefore how it is paced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyShape {
    Empty,
    /// Fully known body of the given length.
    Buffered(u64),
    Streaming,
}

impl BodyShape {
    pub fn detect<B: HttpBody>(body: &B, max_buffered: u64) -> Self {
        if body.is_end_stream() {
            return Self::Empty;
        }
        match body.size_hint().exact() {
            Some(0) => Self::Empty,
            Some(len) if len <= max_buffered => Self::Buffered(len),
            _ => Self::Streaming,
        }
    }
}

/// Pace `body` at `rate`, choosing the path that matches its shape.
pub async fn throttle_body(body: Body, rate: BytesPerSecond, max_buffered: u64) -> Body {
    match BodyShape::detect(&body, max_buffered) {
        BodyShape::Empty => body,
        BodyShape::Buffered(len) => pace_buffered(body, len, rate).await,
        BodyShape::Streaming => Body::new(PacedBody::new(body, rate)),
    }
}

/// Wrap a chunk stream into a body, pacing it only when a rate applies.
///
/// Without a rate the stream is used as-is.
pub fn paced_stream_body<S, T, E>(chunks: S, rate: Option<BytesPerSecond>) -> Body
where
    S: Stream<Item = Result<T, E>> + Send + 'static,
    T: AsRef<[u8]> + Into<Bytes> + 'static,
    E: Into<BoxError> + 'static,
{
    match rate {
        Some(rate) => Body::from_stream(PacedStream::new(chunks, rate)),
        None => Body::from_stream(chunks),
    }
}

async fn pace_buffered(body: Body, len: u64, rate: BytesPerSecond) -> Body {
    let limit = usize::try_from(len).unwrap_or(usize::MAX);
    let bytes = match axum::body::to_bytes(body, limit).await {
        Ok(bytes) => bytes,
        Err(err) => return Body::from_stream(stream::once(async move { Err::<Bytes, _>(err) })),
    };

    // A single chunk: the second poll waits out its delay and ends the stream.
    let mut paced = PacedStream::new(stream::iter([Ok::<_, Infallible>(bytes)]), rate);
    let mut delivered = Bytes::new();
    while let Some(Ok(chunk)) = paced.next().await {
        delivered = chunk;
    }
    Body::from(delivered)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    use std::time::Duration;

    use http_body_util::BodyExt;
    use tokio::time::Instant;

    fn rate(n: u64) -> BytesPerSecond {
        BytesPerSecond::new(n).unwrap()
    }

    fn chunks(sizes: &[usize]) -> Vec<Result<Bytes, Infallible>> {
        sizes
            .iter()
            .enumerate()
            .map(|(i, size)| Ok(Bytes::from(vec![b'a' + i as u8; *size])))
            .collect()
    }

    #[test]
    fn test_detect_shapes() {
        assert_eq!(BodyShape::detect(&Body::empty(), 1024), BodyShape::Empty);
        assert_eq!(
            BodyShape::detect(&Body::from("hello"), 1024),
            BodyShape::Buffered(5)
        );
        assert_eq!(
            BodyShape::detect(&Body::from("hello"), 4),
            BodyShape::Streaming
        );

        let streamed = Body::from_stream(stream::iter(chunks(&[3])));
        assert_eq!(BodyShape::detect(&streamed, 1024), BodyShape::Streaming);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paced_stream_preserves_chunks() {
        let input = chunks(&[10, 0, 25, 5]);
        let expected: Vec<Bytes> = input.iter().map(|c| c.clone().unwrap()).collect();

        let output: Vec<Bytes> = PacedStream::new(stream::iter(input), rate(1000))
            .map(|c| c.unwrap())
            .collect()
            .await;

        assert_eq!(output, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paced_stream_drain_time() {
        let start = Instant::now();
        let count = PacedStream::new(stream::iter(chunks(&[50, 50, 50])), rate(50))
            .count()
            .await;

        assert_eq!(count, 3);
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay_follows_each_chunk() {
        let start = Instant::now();
        let mut paced = PacedStream::new(stream::iter(chunks(&[100, 100])), rate(100));

        paced.next().await.unwrap().unwrap();
        assert!(start.elapsed() < Duration::from_millis(1));

        paced.next().await.unwrap().unwrap();
        assert!(start.elapsed() >= Duration::from_secs(1));

        assert!(paced.next().await.is_none());
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_chunks_add_no_delay() {
        let start = Instant::now();
        let count = PacedStream::new(stream::iter(chunks(&[0, 0, 0, 0])), rate(1))
            .count()
            .await;

        assert_eq!(count, 4);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_pass_through_unchanged() {
        let input: Vec<Result<Bytes, &'static str>> =
            vec![Ok(Bytes::from_static(b"ok")), Err("upstream failed")];

        let output: Vec<_> = PacedStream::new(stream::iter(input), rate(1000))
            .collect()
            .await;

        assert_eq!(output.len(), 2);
        assert_eq!(output[1], Err("upstream failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandoned_stream_stops_pulling() {
        let pulled = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = pulled.clone();
        let source = stream::iter(chunks(&[10, 10, 10, 10])).inspect(move |_| {
            counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        });

        let mut paced = PacedStream::new(source, rate(10));
        paced.next().await.unwrap().unwrap();
        drop(paced);

        assert_eq!(pulled.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paced_body_keeps_size_hint_and_bytes() {
        let body = PacedBody::new(Body::from(vec![b'x'; 150]), rate(50));
        assert_eq!(body.size_hint().exact(), Some(150));

        let start = Instant::now();
        let collected = body.collect().await.unwrap().to_bytes();
        assert_eq!(collected.len(), 150);
        assert!(start.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_paced_body_holds_single_frame_for_its_delay() {
        let mut body = PacedBody::new(Body::from(vec![b'x'; 150]), rate(50));

        // A Content-Length framed transport reads exactly one frame here.
        let start = Instant::now();
        let frame = body.frame().await.unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap().len(), 150);
        assert!(start.elapsed() >= Duration::from_secs(3));
        assert!(body.is_end_stream());
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_large_sized_body_is_paced_per_frame() {
        let start = Instant::now();
        let mut body = throttle_body(Body::from(vec![b'a'; 200]), rate(100), 64).await;
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(body.size_hint().exact(), Some(200));

        let frame = body.frame().await.unwrap().unwrap();
        assert_eq!(frame.into_data().unwrap().len(), 200);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_buffered_body_delays_before_returning() {
        let start = Instant::now();
        let body = throttle_body(Body::from(vec![b'a'; 150]), rate(50), 1024).await;
        assert!(start.elapsed() >= Duration::from_secs(3));

        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(bytes, vec![b'a'; 150]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_streaming_body_defers_delay_to_delivery() {
        let streamed = Body::from_stream(stream::iter(chunks(&[20, 20])));

        let start = Instant::now();
        let body = throttle_body(streamed, rate(20), 1024).await;
        assert_eq!(start.elapsed(), Duration::ZERO);

        let bytes = body.collect().await.unwrap().to_bytes();
        assert_eq!(bytes.len(), 40);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_throttle_empty_body_is_untouched() {
        let start = Instant::now();
        let body = throttle_body(Body::empty(), rate(1), 1024).await;
        assert!(body.is_end_stream());
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_paced_stream_body_without_rate_is_immediate() {
        let start = Instant::now();
        let body = paced_stream_body(stream::iter(chunks(&[100, 100])), None);
        let bytes = body.collect().await.unwrap().to_bytes();

        assert_eq!(bytes.len(), 200);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
