//! Scriptable mock upstream for tollgate tests and examples.
//!
//! `MockUpstream` implements [`Fetcher`] for any key type. Each call pops the next
//! scripted behavior; once the script is exhausted the fallback behavior repeats.
//! Calls are counted and their dispatch instants recorded, so tests can assert
//! single-flight deduplication and rate-limit spacing.
#![warn(missing_docs)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tollgate_core::{Fetcher, TollgateError};

/// Instruction for how one call should behave.
#[derive(Debug, Clone)]
pub enum MockBehavior<V> {
    /// Return the provided value.
    Return(V),
    /// Fail with the provided error.
    Fail(TollgateError),
    /// Never complete (simulate a stalled upstream).
    Hang,
}

/// A fake upstream with a scripted sequence of results.
#[derive(Debug)]
pub struct MockUpstream<V> {
    name: &'static str,
    delay: Duration,
    script: Mutex<VecDeque<MockBehavior<V>>>,
    fallback: MockBehavior<V>,
    calls: AtomicUsize,
    dispatched: Mutex<Vec<Instant>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl<V: Clone> MockUpstream<V> {
    /// An upstream that answers every call with `value`.
    #[must_use]
    pub fn returning(name: &'static str, value: V) -> Self {
        Self::with_fallback(name, MockBehavior::Return(value))
    }

    /// An upstream that fails every call with `err`.
    #[must_use]
    pub fn failing(name: &'static str, err: TollgateError) -> Self {
        Self::with_fallback(name, MockBehavior::Fail(err))
    }

    /// An upstream whose calls never complete.
    #[must_use]
    pub fn hanging(name: &'static str) -> Self {
        Self::with_fallback(name, MockBehavior::Hang)
    }

    /// An upstream that uses `fallback` once its script is exhausted.
    #[must_use]
    pub fn with_fallback(name: &'static str, fallback: MockBehavior<V>) -> Self {
        Self {
            name,
            delay: Duration::ZERO,
            script: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicUsize::new(0),
            dispatched: Mutex::new(Vec::new()),
        }
    }

    /// Sleep for `delay` before answering each call.
    #[must_use]
    pub const fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Queue one behavior ahead of the fallback.
    #[must_use]
    pub fn then(self, behavior: MockBehavior<V>) -> Self {
        self.push(behavior);
        self
    }

    /// Queue one behavior on a shared upstream.
    pub fn push(&self, behavior: MockBehavior<V>) {
        lock(&self.script).push_back(behavior);
    }

    /// Number of calls received so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Instants at which calls were received, in arrival order.
    pub fn dispatch_times(&self) -> Vec<Instant> {
        lock(&self.dispatched).clone()
    }

    fn next_behavior(&self) -> MockBehavior<V> {
        lock(&self.script)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl<K, V> Fetcher<K, V> for MockUpstream<V>
where
    K: Send + Sync,
    V: Clone + Send + Sync,
{
    fn name(&self) -> &'static str {
        self.name
    }

    async fn fetch(&self, _key: &K) -> Result<V, TollgateError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        lock(&self.dispatched).push(Instant::now());
        let behavior = self.next_behavior();
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match behavior {
            MockBehavior::Return(v) => Ok(v),
            MockBehavior::Fail(e) => Err(e),
            MockBehavior::Hang => std::future::pending().await,
        }
    }
}
