// ABOUTME: Rate-limited work queue feeding the image manager's dispatcher loops.
// ABOUTME: Deduplicates queued items and never hands the same item to two workers at once.

mod rate_limiter;

pub use rate_limiter::{ExponentialBackoff, RateLimiter};

use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("work queue {0} is shutting down")]
    ShuttingDown(String),
}

/// A FIFO work queue with the semantics controllers expect:
///
/// - an item added while already queued is not queued twice;
/// - an item added while a worker holds it is queued again only once the
///   worker calls [`WorkQueue::done`];
/// - after [`WorkQueue::shut_down`], [`WorkQueue::get`] drains what is left
///   and then returns `None`.
///
/// Cloning is cheap; clones share the same queue.
pub struct WorkQueue<T> {
    inner: Arc<Inner<T>>,
}

struct Inner<T> {
    name: String,
    state: Mutex<State<T>>,
    available: Notify,
    limiter: Box<dyn RateLimiter<T>>,
}

struct State<T> {
    queue: VecDeque<T>,
    /// Items waiting to be processed, whether queued or parked behind `processing`.
    dirty: HashSet<T>,
    processing: HashSet<T>,
    shutting_down: bool,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for WorkQueue<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("WorkQueue")
            .field("name", &self.inner.name)
            .field("queued", &state.queue.len())
            .field("processing", &state.processing.len())
            .field("shutting_down", &state.shutting_down)
            .finish()
    }
}

impl<T> WorkQueue<T>
where
    T: Clone + Eq + Hash + Send + Sync + 'static,
{
    /// Create a queue retrying with [`ExponentialBackoff::default`].
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_rate_limiter(name, ExponentialBackoff::default())
    }

    pub fn with_rate_limiter(
        name: impl Into<String>,
        limiter: impl RateLimiter<T> + 'static,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                state: Mutex::new(State {
                    queue: VecDeque::new(),
                    dirty: HashSet::new(),
                    processing: HashSet::new(),
                    shutting_down: false,
                }),
                available: Notify::new(),
                limiter: Box::new(limiter),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Queue `item` unless it is already waiting.
    pub fn add(&self, item: T) -> Result<(), QueueError> {
        {
            let mut state = self.inner.state.lock();
            if state.shutting_down {
                return Err(QueueError::ShuttingDown(self.inner.name.clone()));
            }
            if !state.dirty.insert(item.clone()) {
                return Ok(());
            }
            if state.processing.contains(&item) {
                // Re-queued by done().
                return Ok(());
            }
            state.queue.push_back(item);
        }
        self.inner.available.notify_one();
        Ok(())
    }

    /// Queue `item` once `delay` has elapsed. Requires a Tokio runtime.
    pub fn add_after(&self, item: T, delay: Duration) -> Result<(), QueueError> {
        if self.is_shutting_down() {
            return Err(QueueError::ShuttingDown(self.inner.name.clone()));
        }
        if delay.is_zero() {
            return self.add(item);
        }

        let queue = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = queue.add(item) {
                tracing::debug!("dropping delayed item: {}", e);
            }
        });
        Ok(())
    }

    /// Queue `item` after the rate limiter's delay for it.
    pub fn add_rate_limited(&self, item: T) -> Result<(), QueueError> {
        let delay = self.inner.limiter.when(&item);
        tracing::trace!(queue = %self.inner.name, ?delay, "rate limited add");
        self.add_after(item, delay)
    }

    /// Wait for the next item. Returns `None` once the queue is shut down and empty.
    ///
    /// Every item returned must be handed back with [`WorkQueue::done`].
    pub async fn get(&self) -> Option<T> {
        loop {
            let notified = self.inner.available.notified();
            tokio::pin!(notified);
            // Register before inspecting state so a concurrent add is not missed.
            notified.as_mut().enable();

            {
                let mut state = self.inner.state.lock();
                if let Some(item) = state.queue.pop_front() {
                    state.dirty.remove(&item);
                    state.processing.insert(item.clone());
                    return Some(item);
                }
                if state.shutting_down {
                    return None;
                }
            }

            notified.await;
        }
    }

    /// Release `item` after processing. Re-queues it if it was added meanwhile.
    pub fn done(&self, item: &T) {
        let requeued = {
            let mut state = self.inner.state.lock();
            state.processing.remove(item);
            if state.dirty.contains(item) {
                state.queue.push_back(item.clone());
                true
            } else {
                false
            }
        };
        if requeued {
            self.inner.available.notify_one();
        }
    }

    /// Reset the rate limiter's memory of `item`.
    pub fn forget(&self, item: &T) {
        self.inner.limiter.forget(item);
    }

    pub fn num_requeues(&self, item: &T) -> u32 {
        self.inner.limiter.num_requeues(item)
    }

    /// Items queued and not yet handed to a worker.
    pub fn len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Items handed out by `get` and not yet marked done.
    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().processing.len()
    }

    /// Stop accepting items and wake every waiting worker.
    pub fn shut_down(&self) {
        self.inner.state.lock().shutting_down = true;
        self.inner.available.notify_waiters();
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.state.lock().shutting_down
    }
}
