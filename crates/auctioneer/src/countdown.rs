//! One countdown per active auction. A countdown is a tokio task that
//! sleeps on an absolute deadline derived from the auction's stored
//! `end_time` and announces the auction id on the expiry channel when
//! the deadline passes. Between registration and firing it republishes
//! a periodic "time remaining" tick so observers can display a live
//! countdown without polling.
//!
//! Deadlines are recomputed from the current time at registration, not
//! carried as relative sleeps across restarts; recovery after a process
//! restart therefore reconstructs them from `end_time` alone.

use crate::events::EventEmitter;
use chrono::{DateTime, Utc};
use model::{events::AuctionEvent, AuctionId};
use std::{
    collections::HashMap,
    sync::Mutex,
    time::Duration,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
    time::{self, Instant},
};

#[derive(Clone, Copy, Debug)]
pub struct CountdownConfig {
    /// Interval of the `TimeRemaining` ticks.
    pub tick_interval: Duration,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_secs(5),
        }
    }
}

/// Registry of the live countdowns, keyed by auction id. Owned by the
/// lifecycle coordinator; dropped countdown tasks for different
/// auctions share no state beyond this map.
pub struct CountdownRegistry {
    config: CountdownConfig,
    emitter: EventEmitter,
    expired: mpsc::UnboundedSender<AuctionId>,
    countdowns: Mutex<HashMap<AuctionId, JoinHandle<()>>>,
}

impl CountdownRegistry {
    /// Returns the registry together with the receiving end of the
    /// expiry channel the coordinator's expiry loop consumes.
    pub fn new(
        config: CountdownConfig,
        emitter: EventEmitter,
    ) -> (Self, mpsc::UnboundedReceiver<AuctionId>) {
        let (expired, receiver) = mpsc::unbounded_channel();
        let registry = Self {
            config,
            emitter,
            expired,
            countdowns: Mutex::new(HashMap::new()),
        };
        (registry, receiver)
    }

    /// Starts a countdown that fires the expiry channel exactly once
    /// when `end_time` passes. An `end_time` already in the past fires
    /// immediately, which is how missed expiries get applied during
    /// startup recovery. Registering the same auction again replaces
    /// the previous countdown.
    pub fn register(&self, auction_id: AuctionId, end_time: DateTime<Utc>) {
        let remaining = (end_time - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        let deadline = Instant::now() + remaining;
        let tick_interval = self.config.tick_interval;
        let emitter = self.emitter.clone();
        let expired = self.expired.clone();

        let task = tokio::spawn(async move {
            let sleep = time::sleep_until(deadline);
            tokio::pin!(sleep);
            let mut ticks = time::interval_at(Instant::now() + tick_interval, tick_interval);
            loop {
                tokio::select! {
                    _ = &mut sleep => {
                        if expired.send(auction_id).is_err() {
                            tracing::warn!(auction_id, "expiry channel closed, dropping countdown");
                        }
                        break;
                    }
                    _ = ticks.tick() => {
                        emitter.emit(AuctionEvent::TimeRemaining {
                            auction_id,
                            seconds_remaining: seconds_remaining(deadline, Instant::now()),
                        });
                    }
                }
            }
        });

        if let Some(previous) = self
            .countdowns
            .lock()
            .unwrap()
            .insert(auction_id, task)
        {
            previous.abort();
        }
        Metrics::get().countdowns_registered.inc();
    }

    /// Stops the countdown before it fires, preventing its pending
    /// expiry from executing at all. Idempotent; deregistering an
    /// unknown or already fired countdown has no effect.
    pub fn deregister(&self, auction_id: AuctionId) {
        if let Some(task) = self.countdowns.lock().unwrap().remove(&auction_id) {
            task.abort();
        }
    }

    /// Number of registered countdowns, including ones that already
    /// fired but have not been deregistered yet.
    pub fn len(&self) -> usize {
        self.countdowns.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Whole seconds until the deadline, rounded up so a countdown reads
/// "7" for the entire seventh second and "0" only once it expired.
fn seconds_remaining(deadline: Instant, now: Instant) -> u64 {
    let remaining = deadline.saturating_duration_since(now);
    remaining.as_secs() + u64::from(remaining.subsec_nanos() > 0)
}

impl Drop for CountdownRegistry {
    fn drop(&mut self) {
        for (_, task) in self.countdowns.lock().unwrap().drain() {
            task.abort();
        }
    }
}

#[derive(prometheus_metric_storage::MetricStorage)]
struct Metrics {
    /// Total number of countdowns registered since process start.
    #[metric(name = "auctioneer_countdowns_registered")]
    countdowns_registered: prometheus::IntCounter,
}

impl Metrics {
    fn get() -> &'static Self {
        Metrics::instance(observe::metrics::get_storage_registry()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn registry(
        tick: Duration,
    ) -> (CountdownRegistry, mpsc::UnboundedReceiver<AuctionId>, EventEmitter) {
        let emitter = EventEmitter::new(64);
        let (registry, expired) = CountdownRegistry::new(
            CountdownConfig {
                tick_interval: tick,
            },
            emitter.clone(),
        );
        (registry, expired, emitter)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_exactly_once_at_the_deadline() {
        let (registry, mut expired, _emitter) = registry(Duration::from_secs(5));
        registry.register(1, Utc::now() + chrono::Duration::seconds(10));

        advance(Duration::from_secs(9)).await;
        assert!(expired.try_recv().is_err());

        advance(Duration::from_secs(2)).await;
        assert_eq!(expired.recv().await, Some(1));
        assert!(expired.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_republish_time_remaining() {
        let (registry, _expired, emitter) = registry(Duration::from_secs(5));
        let mut events = emitter.subscribe();
        registry.register(1, Utc::now() + chrono::Duration::seconds(12));

        advance(Duration::from_secs(5)).await;
        assert_eq!(
            events.recv().await.unwrap(),
            AuctionEvent::TimeRemaining {
                auction_id: 1,
                seconds_remaining: 7,
            }
        );

        advance(Duration::from_secs(5)).await;
        assert_eq!(
            events.recv().await.unwrap(),
            AuctionEvent::TimeRemaining {
                auction_id: 1,
                seconds_remaining: 2,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn deregister_prevents_firing_and_is_idempotent() {
        let (registry, mut expired, _emitter) = registry(Duration::from_secs(5));
        registry.register(1, Utc::now() + chrono::Duration::seconds(10));
        registry.deregister(1);
        registry.deregister(1);
        registry.deregister(42);

        advance(Duration::from_secs(20)).await;
        assert!(expired.try_recv().is_err());
        assert!(registry.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn past_deadline_fires_immediately() {
        let (registry, mut expired, _emitter) = registry(Duration::from_secs(5));
        registry.register(1, Utc::now() - chrono::Duration::seconds(30));

        advance(Duration::from_millis(1)).await;
        assert_eq!(expired.recv().await, Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn countdowns_are_independent() {
        let (registry, mut expired, _emitter) = registry(Duration::from_secs(60));
        registry.register(1, Utc::now() + chrono::Duration::seconds(10));
        registry.register(2, Utc::now() + chrono::Duration::seconds(20));
        registry.deregister(1);

        advance(Duration::from_secs(21)).await;
        assert_eq!(expired.recv().await, Some(2));
        assert!(expired.try_recv().is_err());
    }
}
