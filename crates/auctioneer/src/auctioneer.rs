//! Service facade consumed by the request handling layer. Bundles the
//! storage seam, the lifecycle coordinator and the event emitter behind
//! the three inbound operations of the engine.

use crate::{
    bidding::{PlaceBidError, Placement},
    database::auctions::AuctionStoring,
    lifecycle::{Lifecycle, TransitionError},
};
use anyhow::Result;
use bigdecimal::BigDecimal;
use chrono::Utc;
use model::{auction::Auction, bid::Bid, events::AuctionEvent, AuctionId, UserId};
use std::sync::Arc;

#[derive(prometheus_metric_storage::MetricStorage, Clone, Debug)]
#[metric(subsystem = "auctioneer")]
struct Metrics {
    /// Number of bids accepted into the ledger.
    bids_placed: prometheus::IntCounter,
    /// Number of rejected bid placements, by rejection kind.
    #[metric(labels("reason"))]
    bids_rejected: prometheus::IntCounterVec,
}

impl Metrics {
    fn get() -> &'static Self {
        Metrics::instance(observe::metrics::get_storage_registry()).unwrap()
    }
}

pub struct Auctioneer {
    store: Arc<dyn AuctionStoring>,
    lifecycle: Arc<Lifecycle>,
    emitter: crate::events::EventEmitter,
    /// Upper bound on automatic retries of a bid placement that lost a
    /// concurrent commit race.
    max_placement_attempts: usize,
}

impl Auctioneer {
    pub fn new(
        store: Arc<dyn AuctionStoring>,
        lifecycle: Arc<Lifecycle>,
        emitter: crate::events::EventEmitter,
        max_placement_attempts: usize,
    ) -> Self {
        Self {
            store,
            lifecycle,
            emitter,
            max_placement_attempts: max_placement_attempts.max(1),
        }
    }

    /// Places a competing bid. Only a commit rejected by the store's
    /// concurrency control is retried; every failed attempt rolls back
    /// without observable side effect, so retrying is safe.
    pub async fn place_bid(
        &self,
        auction_id: AuctionId,
        bidder: UserId,
        amount: BigDecimal,
    ) -> Result<Placement, PlaceBidError> {
        let mut attempt = 1;
        let placement = loop {
            match self
                .store
                .place_bid(auction_id, bidder, amount.clone(), Utc::now())
                .await
            {
                Err(PlaceBidError::Conflict) if attempt < self.max_placement_attempts => {
                    tracing::debug!(auction_id, bidder, attempt, "retrying conflicting bid");
                    attempt += 1;
                }
                Err(err) => {
                    Metrics::get()
                        .bids_rejected
                        .with_label_values(&[rejection_reason(&err)])
                        .inc();
                    return Err(err);
                }
                Ok(placement) => break placement,
            }
        };

        Metrics::get().bids_placed.inc();
        tracing::debug!(
            auction_id,
            bidder,
            bid_id = placement.bid.id,
            amount = %placement.bid.amount,
            "bid placed"
        );
        self.emitter.emit(AuctionEvent::BidPlaced {
            auction_id,
            bid_id: placement.bid.id,
            bidder,
            amount: placement.bid.amount.clone(),
            superseded_bidders: placement.superseded_bidders.clone(),
        });
        Ok(placement)
    }

    pub async fn activate_auction(
        &self,
        auction_id: AuctionId,
        actor: UserId,
    ) -> Result<Auction, TransitionError> {
        self.lifecycle.activate(auction_id, actor).await
    }

    pub async fn cancel_auction(
        &self,
        auction_id: AuctionId,
        actor: UserId,
    ) -> Result<Auction, TransitionError> {
        self.lifecycle.cancel(auction_id, actor).await
    }

    pub async fn get_auction(&self, auction_id: AuctionId) -> Result<Option<Auction>> {
        self.store.single_auction(auction_id).await
    }

    /// The auction's bids in ledger order, highest ranked first.
    pub async fn auction_bids(&self, auction_id: AuctionId) -> Result<Vec<Bid>> {
        self.store.ranked_bids(auction_id).await
    }
}

fn rejection_reason(err: &PlaceBidError) -> &'static str {
    match err {
        PlaceBidError::NotFound => "not_found",
        PlaceBidError::InvalidState(_) => "invalid_state",
        PlaceBidError::AuctionClosed => "auction_closed",
        PlaceBidError::SelfBidForbidden => "self_bid",
        PlaceBidError::BidTooLow { .. } => "bid_too_low",
        PlaceBidError::Conflict => "conflict",
        PlaceBidError::Database(_) => "database",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        countdown::{CountdownConfig, CountdownRegistry},
        database::auctions::MockAuctionStoring,
        events::EventEmitter,
    };
    use model::bid::BidStatus;

    fn auctioneer(store: MockAuctionStoring, attempts: usize) -> (Auctioneer, EventEmitter) {
        let emitter = EventEmitter::new(64);
        let (registry, _expired) =
            CountdownRegistry::new(CountdownConfig::default(), emitter.clone());
        let store = Arc::new(store);
        let lifecycle = Arc::new(Lifecycle::new(
            store.clone(),
            Arc::new(registry),
            emitter.clone(),
        ));
        (
            Auctioneer::new(store, lifecycle, emitter.clone(), attempts),
            emitter,
        )
    }

    fn placement(bid_id: i64, bidder: UserId, amount: u32) -> Placement {
        Placement {
            bid: Bid {
                id: bid_id,
                auction_id: 1,
                bidder,
                amount: BigDecimal::from(amount),
                status: BidStatus::Winning,
                created_at: Utc::now(),
            },
            superseded_bidders: vec![],
        }
    }

    #[tokio::test]
    async fn conflicts_are_retried_up_to_the_bound() {
        let mut store = MockAuctionStoring::new();
        let mut calls = 0;
        store
            .expect_place_bid()
            .times(3)
            .returning(move |_, bidder, _, _| {
                calls += 1;
                if calls < 3 {
                    Err(PlaceBidError::Conflict)
                } else {
                    Ok(placement(5, bidder, 150))
                }
            });

        let (auctioneer, emitter) = auctioneer(store, 3);
        let mut events = emitter.subscribe();

        let placement = auctioneer
            .place_bid(1, 2, BigDecimal::from(150))
            .await
            .unwrap();
        assert_eq!(placement.bid.id, 5);
        assert!(matches!(
            events.recv().await.unwrap(),
            AuctionEvent::BidPlaced { bid_id: 5, .. }
        ));
    }

    #[tokio::test]
    async fn conflict_surfaces_once_attempts_are_exhausted() {
        let mut store = MockAuctionStoring::new();
        store
            .expect_place_bid()
            .times(2)
            .returning(|_, _, _, _| Err(PlaceBidError::Conflict));

        let (auctioneer, _emitter) = auctioneer(store, 2);
        let err = auctioneer
            .place_bid(1, 2, BigDecimal::from(150))
            .await
            .unwrap_err();
        assert!(matches!(err, PlaceBidError::Conflict));
    }

    #[tokio::test]
    async fn validation_rejections_are_not_retried() {
        let mut store = MockAuctionStoring::new();
        store.expect_place_bid().times(1).returning(|_, _, _, _| {
            Err(PlaceBidError::BidTooLow {
                minimum: BigDecimal::from(150),
            })
        });

        let (auctioneer, emitter) = auctioneer(store, 5);
        let mut events = emitter.subscribe();

        let err = auctioneer
            .place_bid(1, 2, BigDecimal::from(100))
            .await
            .unwrap_err();
        assert!(matches!(err, PlaceBidError::BidTooLow { .. }));
        // A rejected placement announces nothing.
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn bid_placed_event_carries_superseded_bidders() {
        let mut store = MockAuctionStoring::new();
        store
            .expect_place_bid()
            .times(1)
            .returning(|_, bidder, _, _| {
                let mut placement = placement(9, bidder, 200);
                placement.superseded_bidders = vec![42];
                Ok(placement)
            });

        let (auctioneer, emitter) = auctioneer(store, 1);
        let mut events = emitter.subscribe();

        auctioneer
            .place_bid(1, 2, BigDecimal::from(200))
            .await
            .unwrap();
        assert_eq!(
            events.recv().await.unwrap(),
            AuctionEvent::BidPlaced {
                auction_id: 1,
                bid_id: 9,
                bidder: 2,
                amount: BigDecimal::from(200),
                superseded_bidders: vec![42],
            }
        );
    }
}
