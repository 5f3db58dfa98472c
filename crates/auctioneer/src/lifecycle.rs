//! Orchestrates the countdown registry and the state machine: starts
//! countdowns for newly activated auctions, reacts to expiry by running
//! the expire transition and re-hydrates countdowns for auctions that
//! were already active at process start.

use crate::{
    countdown::CountdownRegistry,
    database::auctions::AuctionStoring,
    events::EventEmitter,
    state_machine::{PolicyViolation, Transition},
};
use anyhow::Context as _;
use chrono::Utc;
use model::{auction::Auction, events::AuctionEvent, AuctionId, UserId};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;

#[derive(Debug, Error)]
pub enum TransitionError {
    #[error("auction not found")]
    NotFound,
    #[error(transparent)]
    Policy(#[from] PolicyViolation),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub struct Lifecycle {
    store: Arc<dyn AuctionStoring>,
    registry: Arc<CountdownRegistry>,
    emitter: EventEmitter,
}

impl Lifecycle {
    pub fn new(
        store: Arc<dyn AuctionStoring>,
        registry: Arc<CountdownRegistry>,
        emitter: EventEmitter,
    ) -> Self {
        Self {
            store,
            registry,
            emitter,
        }
    }

    /// Registers a countdown for every auction persisted as active.
    /// Countdowns are in-memory and do not survive a restart, so this
    /// runs once at process start; deadlines are reconstructed from the
    /// stored `end_time`. Returns the number of countdowns registered.
    pub async fn recover(&self) -> anyhow::Result<usize> {
        let active = self
            .store
            .active_auctions()
            .await
            .context("loading active auctions for countdown recovery")?;
        for auction in &active {
            self.registry.register(auction.id, auction.end_time);
        }
        tracing::info!(countdowns = active.len(), "recovered active auctions");
        Ok(active.len())
    }

    /// Seller starts the auction; the countdown towards `end_time`
    /// begins now.
    pub async fn activate(
        &self,
        auction_id: AuctionId,
        actor: UserId,
    ) -> Result<Auction, TransitionError> {
        let auction = self
            .store
            .transition(auction_id, Transition::Activate { actor }, Utc::now())
            .await?;
        self.registry.register(auction.id, auction.end_time);
        self.emitter
            .emit(AuctionEvent::AuctionActivated { auction_id });
        tracing::debug!(auction_id, end_time = %auction.end_time, "auction activated");
        Ok(auction)
    }

    /// Seller withdraws the auction; its countdown is stopped before it
    /// can fire.
    pub async fn cancel(
        &self,
        auction_id: AuctionId,
        actor: UserId,
    ) -> Result<Auction, TransitionError> {
        let auction = self
            .store
            .transition(auction_id, Transition::Cancel { actor }, Utc::now())
            .await?;
        self.registry.deregister(auction_id);
        self.emitter
            .emit(AuctionEvent::AuctionCancelled { auction_id });
        tracing::debug!(auction_id, "auction cancelled");
        Ok(auction)
    }

    /// Consumes fired countdowns until the registry is dropped. Runs as
    /// its own task so expiries proceed independent of any request.
    pub async fn run_forever(self: Arc<Self>, mut expired: mpsc::UnboundedReceiver<AuctionId>) {
        while let Some(auction_id) = expired.recv().await {
            self.expire(auction_id).await;
        }
        tracing::debug!("expiry channel closed, lifecycle loop exiting");
    }

    /// Applies the expire transition for a fired countdown. All failure
    /// modes only drop this auction's countdown; they never take down
    /// the loop or stall other auctions.
    async fn expire(&self, auction_id: AuctionId) {
        match self
            .store
            .transition(auction_id, Transition::Expire, Utc::now())
            .await
        {
            Ok(auction) => {
                Metrics::get().auctions_expired.inc();
                tracing::info!(
                    auction_id,
                    winning_bid_id = ?auction.winning_bid_id,
                    "auction ended"
                );
                self.emitter.emit(AuctionEvent::AuctionEnded {
                    auction_id,
                    winning_bid_id: auction.winning_bid_id,
                });
            }
            // The auction was concurrently cancelled (or already ended);
            // the countdown lost the race and is simply dropped.
            Err(TransitionError::Policy(violation)) => {
                Metrics::get().expiry_races_lost.inc();
                tracing::debug!(auction_id, %violation, "countdown lost transition race");
            }
            Err(err) => {
                tracing::warn!(auction_id, ?err, "failed to expire auction, dropping countdown");
            }
        }
        self.registry.deregister(auction_id);
    }
}

#[derive(prometheus_metric_storage::MetricStorage)]
struct Metrics {
    /// Number of auctions ended by their countdown.
    #[metric(name = "auctioneer_auctions_expired")]
    auctions_expired: prometheus::IntCounter,
    /// Countdowns that fired but lost the race against a concurrent
    /// transition.
    #[metric(name = "auctioneer_expiry_races_lost")]
    expiry_races_lost: prometheus::IntCounter,
}

impl Metrics {
    fn get() -> &'static Self {
        Metrics::instance(observe::metrics::get_storage_registry()).unwrap()
    }
}
