//! Byte accounting that survives cancellation.
//!
//! A [`ByteMeter`] is shared between a probe and the executor that runs it.
//! The probe adds to it as data arrives; the executor reads it after the
//! probe finished, failed or was dropped by its deadline, so a partial
//! transfer is still reported.

use futures::Stream;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

/// Shared monotonically increasing byte counter.
#[derive(Debug, Clone, Default)]
pub struct ByteMeter(Arc<AtomicU64>);

impl ByteMeter {
    /// Create a meter at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `n` bytes.
    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    /// Current total.
    #[must_use]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Stream adapter that counts the bytes of every chunk it yields.
///
/// Chunks are counted as they pass through, so bytes received before an
/// error item (or before the stream is dropped) are already on the meter.
#[derive(Debug)]
pub struct CountingStream<S> {
    inner: S,
    meter: ByteMeter,
}

impl<S> CountingStream<S> {
    /// Wrap `inner`, accumulating into `meter`.
    pub fn new(inner: S, meter: ByteMeter) -> Self {
        Self { inner, meter }
    }
}

impl<S, B, E> Stream for CountingStream<S>
where
    S: Stream<Item = Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
{
    type Item = Result<B, E>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let polled = Pin::new(&mut self.inner).poll_next(cx);
        if let Poll::Ready(Some(Ok(chunk))) = &polled {
            self.meter.add(chunk.as_ref().len() as u64);
        }
        polled
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::{stream, StreamExt};

    #[test]
    fn test_meter_is_shared_between_clones() {
        let meter = ByteMeter::new();
        let other = meter.clone();
        meter.add(10);
        other.add(5);
        assert_eq!(meter.get(), 15);
    }

    #[tokio::test]
    async fn test_counting_stream_counts_chunks() {
        let meter = ByteMeter::new();
        let chunks: Vec<Result<Vec<u8>, ()>> = vec![Ok(vec![0; 100]), Ok(vec![0; 28])];
        let mut s = CountingStream::new(stream::iter(chunks), meter.clone());
        while let Some(item) = s.next().await {
            assert!(item.is_ok());
        }
        assert_eq!(meter.get(), 128);
    }

    #[tokio::test]
    async fn test_partial_bytes_kept_after_error() {
        let meter = ByteMeter::new();
        let chunks: Vec<Result<Vec<u8>, &str>> =
            vec![Ok(vec![1; 64]), Err("reset by peer"), Ok(vec![1; 64])];
        let mut s = CountingStream::new(stream::iter(chunks), meter.clone());
        loop {
            match s.next().await {
                Some(Ok(_)) => {}
                Some(Err(_)) | None => break,
            }
        }
        assert_eq!(meter.get(), 64);
    }

    #[tokio::test]
    async fn test_partial_bytes_kept_after_drop() {
        let meter = ByteMeter::new();
        let chunks = stream::iter(vec![Ok::<_, ()>(vec![0u8; 32])]).chain(stream::pending());
        let mut s = CountingStream::new(Box::pin(chunks), meter.clone());
        let first = s.next().await;
        assert!(first.is_some());
        let waited = tokio::time::timeout(std::time::Duration::from_millis(20), s.next()).await;
        assert!(waited.is_err());
        drop(s);
        assert_eq!(meter.get(), 32);
    }
}
