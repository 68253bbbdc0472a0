//! Scoped sample subscriptions.
//!
//! A [`SampleStream`] is the consumer end of a push-based sensor feed.  A
//! background producer pushes values through a [`SampleSender`]; the consumer
//! iterates them in order.  The subscription is released exactly once when
//! the stream is dropped, whichever way the consuming loop exits (normal
//! end, `break`, `?`, or a panic unwinding through it).
//!
//! Iterating blocks the calling thread until the next sample or the end of
//! the feed, so it must not be done from inside an async runtime.  A loop
//! that has to stay responsive while the producer is silent (cancellation,
//! deadlines) waits with [`SampleStream::recv_timeout`] instead.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use mantis_hal::stream::SampleStream;
//!
//! let released = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&released);
//!
//! let (tx, stream) = SampleStream::channel(4, move || {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//! std::thread::spawn(move || {
//!     for d in [0.9_f32, 0.6, 0.3, 0.1] {
//!         if !tx.send(d) { break; }
//!     }
//! });
//!
//! for d in stream {
//!     if d <= 0.3 { break; }
//! }
//! assert_eq!(released.load(Ordering::SeqCst), 1);
//! ```

use std::time::{Duration, Instant};

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TryRecvError;

/// Granularity of [`SampleStream::recv_timeout`] while the buffer is empty.
const POLL_INTERVAL: Duration = Duration::from_millis(1);

type Release = Box<dyn FnOnce() + Send>;

/// Producer end of a [`SampleStream`].
#[derive(Debug)]
pub struct SampleSender<T> {
    tx: mpsc::Sender<T>,
}

impl<T> SampleSender<T> {
    /// Push one sample, blocking while the buffer is full.
    ///
    /// Returns `false` once the consumer has released the subscription; the
    /// producer should stop.
    pub fn send(&self, value: T) -> bool {
        self.tx.blocking_send(value).is_ok()
    }

    /// `true` once the consumer has released the subscription.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Result of a bounded wait on a [`SampleStream`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Recv<T> {
    Sample(T),
    /// Nothing arrived within the timeout; the feed is still open.
    Idle,
    /// The producer has finished and every buffered sample was consumed.
    Closed,
}

/// Consumer end of a push-based sample feed.  Finite per subscription: it
/// ends when the producer stops sending.
pub struct SampleStream<T> {
    rx: mpsc::Receiver<T>,
    release: Option<Release>,
}

impl<T> std::fmt::Debug for SampleStream<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleStream")
            .field("released", &self.release.is_none())
            .finish()
    }
}

impl<T> SampleStream<T> {
    /// Open a subscription buffering up to `capacity` samples.  `release` runs
    /// exactly once, when the stream is dropped.
    pub fn channel(capacity: usize, release: impl FnOnce() + Send + 'static) -> (SampleSender<T>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            SampleSender { tx },
            Self {
                rx,
                release: Some(Box::new(release)),
            },
        )
    }

    /// A stream that yields `samples` and then ends.
    pub fn from_samples(samples: Vec<T>, release: impl FnOnce() + Send + 'static) -> Self {
        let (tx, stream) = Self::channel(samples.len(), release);
        for sample in samples {
            // Capacity covers every sample, so this never fails.
            let _ = tx.tx.try_send(sample);
        }
        stream
    }

    /// Wait at most `timeout` for the next sample.
    pub fn recv_timeout(&mut self, timeout: Duration) -> Recv<T> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.rx.try_recv() {
                Ok(value) => return Recv::Sample(value),
                Err(TryRecvError::Disconnected) => return Recv::Closed,
                Err(TryRecvError::Empty) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Recv::Idle;
                    }
                    std::thread::sleep((deadline - now).min(POLL_INTERVAL));
                }
            }
        }
    }

    /// Release the subscription now rather than at end of scope.
    pub fn close(self) {
        drop(self);
    }
}

impl<T> Iterator for SampleStream<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.rx.blocking_recv()
    }
}

impl<T> Drop for SampleStream<T> {
    fn drop(&mut self) {
        self.rx.close();
        if let Some(release) = self.release.take() {
            release();
        }
    }
}
