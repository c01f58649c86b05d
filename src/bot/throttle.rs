//! Response throttling for bot participants.
//!
//! A bot holds a single response slot. Scheduling a reply takes the slot,
//! waits a random "thinking" delay, runs the reply and releases the slot.
//! Triggers that arrive while the slot is held are rejected; the reply in
//! flight reads the freshest history when it generates.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::debug;

/// Serializes replies and adds a thinking delay before each.
#[derive(Debug, Clone)]
pub struct ResponseThrottle {
    slot: Arc<Semaphore>,
    min_delay: f64,
    max_delay: f64,
}

impl ResponseThrottle {
    /// Create a throttle whose delay is drawn uniformly from
    /// `[min_secs, max_secs]` seconds.
    pub fn new(min_secs: f64, max_secs: f64) -> Self {
        let min_delay = min_secs.max(0.0);
        Self {
            slot: Arc::new(Semaphore::new(1)),
            min_delay,
            max_delay: max_secs.max(min_delay),
        }
    }

    /// Draw a thinking delay.
    pub fn think_delay(&self) -> Duration {
        let secs = rand::rng().random_range(self.min_delay..=self.max_delay);
        Duration::from_secs_f64(secs)
    }

    /// Check whether a reply is currently in flight.
    pub fn is_busy(&self) -> bool {
        self.slot.available_permits() == 0
    }

    /// Take the response slot if it is free.
    pub fn try_reserve(&self) -> Option<ResponseSlot> {
        let permit = Arc::clone(&self.slot).try_acquire_owned().ok()?;
        Some(ResponseSlot {
            permit,
            delay: self.think_delay(),
        })
    }

    /// Schedule `respond` after a thinking delay.
    ///
    /// Returns `None` without running anything when a reply is already in
    /// flight.
    pub fn schedule<F>(&self, respond: F) -> Option<JoinHandle<()>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Some(self.try_reserve()?.spawn(respond))
    }
}

/// A held response slot, released when the reply it runs finishes.
#[derive(Debug)]
pub struct ResponseSlot {
    permit: OwnedSemaphorePermit,
    delay: Duration,
}

impl ResponseSlot {
    /// Run `respond` after the thinking delay, then release the slot.
    pub fn spawn<F>(self, respond: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Self { permit, delay } = self;
        tokio::spawn(async move {
            debug!("Thinking for {:.2} seconds...", delay.as_secs_f64());
            tokio::time::sleep(delay).await;
            respond.await;
            drop(permit);
        })
    }
}
