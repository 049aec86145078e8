//! Sliding-window request throttle for outbound API calls.
//!
//! A [`ThrottleQueue`] remembers the start instants of the last N calls and
//! makes the caller sleep until the oldest of them leaves the trailing window.
//! [`RateLimitedCaller`] wraps any fallible async call with that queue.
//!
//! Time comes from a [`Clock`], so tests can drive the queue without sleeping.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default trailing window for a requests-per-minute ceiling
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);

/// Default courtesy delay between successful calls
pub const DEFAULT_PACING: Duration = Duration::from_millis(500);

/// Source of time and sleeping for the throttle.
#[async_trait]
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
    async fn sleep(&self, duration: Duration);
}

/// Wall clock backed by tokio's timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[async_trait]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Bounded FIFO of recent call start instants.
#[derive(Debug)]
pub struct ThrottleQueue<C = TokioClock> {
    calls: VecDeque<Instant>,
    ceiling: usize,
    window: Duration,
    clock: C,
}

impl ThrottleQueue<TokioClock> {
    /// Throttle to `ceiling` calls per minute on the wall clock
    pub fn per_minute(ceiling: usize) -> Self {
        Self::new(ceiling, DEFAULT_WINDOW, TokioClock)
    }
}

impl<C: Clock> ThrottleQueue<C> {
    /// A ceiling of zero is treated as one.
    pub fn new(ceiling: usize, window: Duration, clock: C) -> Self {
        let ceiling = ceiling.max(1);
        Self {
            calls: VecDeque::with_capacity(ceiling),
            ceiling,
            window,
            clock,
        }
    }

    pub fn ceiling(&self) -> usize {
        self.ceiling
    }

    /// Number of call starts currently remembered
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Wait until a call may start, then record its start instant.
    pub async fn acquire(&mut self) -> Instant {
        loop {
            let now = self.clock.now();
            self.evict_expired(now);

            if self.calls.len() < self.ceiling {
                self.calls.push_back(now);
                return now;
            }

            let Some(&oldest) = self.calls.front() else {
                continue;
            };
            let wait = self.window.saturating_sub(now.duration_since(oldest));
            info!(
                wait_secs = wait.as_secs_f64(),
                ceiling = self.ceiling,
                "Waiting to respect request ceiling"
            );
            self.clock.sleep(wait).await;
        }
    }

    /// Drop entries that are at least one window old.
    fn evict_expired(&mut self, now: Instant) {
        while self
            .calls
            .front()
            .is_some_and(|t| now.duration_since(*t) >= self.window)
        {
            self.calls.pop_front();
        }
    }
}

/// Runs outbound calls through a [`ThrottleQueue`].
///
/// The caller never retries. A failed call still consumed its slot because
/// the request reached the remote service.
#[derive(Debug)]
pub struct RateLimitedCaller<C = TokioClock> {
    queue: ThrottleQueue<C>,
    pacing: Duration,
}

impl<C: Clock> RateLimitedCaller<C> {
    pub fn new(queue: ThrottleQueue<C>, pacing: Duration) -> Self {
        Self { queue, pacing }
    }

    pub fn queue(&self) -> &ThrottleQueue<C> {
        &self.queue
    }

    /// Acquire a slot, then run `call` once and return its result unchanged.
    pub async fn call<F, Fut, T>(&mut self, call: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let started = self.queue.acquire().await;
        debug!(in_window = self.queue.len(), "Call slot acquired");
        let result = call().await;
        if let Err(e) = &result {
            debug!(
                error = %e,
                elapsed_ms = self.queue.clock().now().duration_since(started).as_millis() as u64,
                "Throttled call failed"
            );
        }
        result
    }

    /// Courtesy pause between successful calls; independent of the ceiling.
    pub async fn pace(&self) {
        if !self.pacing.is_zero() {
            self.queue.clock().sleep(self.pacing).await;
        }
    }
}
