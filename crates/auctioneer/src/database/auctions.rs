//! Storage seam of the engine. The trait is what the facade and the
//! lifecycle coordinator program against; the [`Postgres`]
//! implementation expresses every mutation of one auction and its bids
//! as a single transaction that starts by locking the auction row, so
//! concurrent operations on the same auction serialize while different
//! auctions never block each other.

use super::Postgres;
use crate::{
    bidding::{self, PlaceBidError, Placement},
    lifecycle::TransitionError,
    state_machine::{self, Transition},
};
use anyhow::Result;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use database::auctions::NewAuction;
use model::{
    auction::{Auction, AuctionStatus},
    bid::{Bid, BidStatus},
    AuctionId, UserId,
};

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AuctionStoring: Send + Sync {
    /// Inserts a new auction in the pending state. Called by the
    /// surrounding CRUD layer, not by the engine itself.
    async fn create_auction(&self, auction: NewAuction) -> Result<Auction>;
    async fn single_auction(&self, id: AuctionId) -> Result<Option<Auction>>;
    /// All auctions persisted as active, for startup recovery.
    async fn active_auctions(&self) -> Result<Vec<Auction>>;
    /// The auction's bids in ledger order.
    async fn ranked_bids(&self, id: AuctionId) -> Result<Vec<Bid>>;
    /// Runs a lifecycle transition atomically against the most recently
    /// committed auction row and returns the updated auction.
    async fn transition(
        &self,
        id: AuctionId,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<Auction, TransitionError>;
    /// The bid placement transaction: validates against the locked
    /// auction row and applies all ledger mutations in one atomic unit.
    async fn place_bid(
        &self,
        id: AuctionId,
        bidder: UserId,
        amount: BigDecimal,
        now: DateTime<Utc>,
    ) -> Result<Placement, PlaceBidError>;
}

#[async_trait::async_trait]
impl AuctionStoring for Postgres {
    async fn create_auction(&self, auction: NewAuction) -> Result<Auction> {
        let _timer = super::Metrics::get()
            .database_queries
            .with_label_values(&["create_auction"])
            .start_timer();

        let mut ex = self.pool.acquire().await?;
        let id = database::auctions::insert(&mut ex, &auction).await?;
        let row = database::auctions::single(&mut ex, id)
            .await?
            .expect("auction row just inserted");
        Ok(auction_from_row(row))
    }

    async fn single_auction(&self, id: AuctionId) -> Result<Option<Auction>> {
        let _timer = super::Metrics::get()
            .database_queries
            .with_label_values(&["single_auction"])
            .start_timer();

        let mut ex = self.pool.acquire().await?;
        let row = database::auctions::single(&mut ex, id).await?;
        Ok(row.map(auction_from_row))
    }

    async fn active_auctions(&self) -> Result<Vec<Auction>> {
        let _timer = super::Metrics::get()
            .database_queries
            .with_label_values(&["active_auctions"])
            .start_timer();

        let mut ex = self.pool.acquire().await?;
        let rows = database::auctions::all_active(&mut ex).await?;
        Ok(rows.into_iter().map(auction_from_row).collect())
    }

    async fn ranked_bids(&self, id: AuctionId) -> Result<Vec<Bid>> {
        let _timer = super::Metrics::get()
            .database_queries
            .with_label_values(&["ranked_bids"])
            .start_timer();

        let mut ex = self.pool.acquire().await?;
        let rows = database::bids::ranked(&mut ex, id).await?;
        Ok(rows.into_iter().map(bid_from_row).collect())
    }

    async fn transition(
        &self,
        id: AuctionId,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<Auction, TransitionError> {
        let _timer = super::Metrics::get()
            .database_queries
            .with_label_values(&["transition"])
            .start_timer();

        let mut tx = self.pool.begin().await?;
        let row = database::auctions::lock_for_update(&mut tx, id)
            .await?
            .ok_or(TransitionError::NotFound)?;
        let auction = auction_from_row(row);
        let next = state_machine::next_status(&auction, transition)?;
        // Activation resets the clock to the activation instant.
        let start_time = matches!(transition, Transition::Activate { .. }).then_some(now);
        // The row is locked, so the status guard of the update cannot
        // fail anymore.
        database::auctions::update_status(
            &mut tx,
            id,
            status_into(auction.status),
            status_into(next),
            start_time,
        )
        .await?;
        tx.commit().await?;
        Ok(Auction {
            status: next,
            start_time: start_time.unwrap_or(auction.start_time),
            ..auction
        })
    }

    async fn place_bid(
        &self,
        id: AuctionId,
        bidder: UserId,
        amount: BigDecimal,
        now: DateTime<Utc>,
    ) -> Result<Placement, PlaceBidError> {
        let _timer = super::Metrics::get()
            .database_queries
            .with_label_values(&["place_bid"])
            .start_timer();

        let mut tx = self.pool.begin().await?;
        let row = database::auctions::lock_for_update(&mut tx, id)
            .await
            .map_err(classify)?
            .ok_or(PlaceBidError::NotFound)?;
        let auction = auction_from_row(row);
        bidding::validate(&auction, bidder, &amount, now)?;

        // The bidder's own earlier bids are superseded first so the
        // previous winner query below never reports the bidder
        // themselves.
        database::bids::outbid_bidder(&mut tx, id, bidder)
            .await
            .map_err(classify)?;
        let previous_winner = database::bids::outbid_winning(&mut tx, id)
            .await
            .map_err(classify)?;
        let bid_id = database::bids::insert(&mut tx, id, bidder, &amount, now)
            .await
            .map_err(classify)?;
        database::bids::set_status(&mut tx, bid_id, database::bids::BidStatus::Winning)
            .await
            .map_err(classify)?;
        database::auctions::set_winning_bid(&mut tx, id, &amount, bid_id)
            .await
            .map_err(classify)?;
        tx.commit().await.map_err(classify)?;

        Ok(Placement {
            bid: Bid {
                id: bid_id,
                auction_id: id,
                bidder,
                amount,
                status: BidStatus::Winning,
                created_at: now,
            },
            superseded_bidders: previous_winner.map(|(_, bidder)| bidder).into_iter().collect(),
        })
    }
}

/// A commit the store rejected for racing another one surfaces as
/// [`PlaceBidError::Conflict`], the one error kind that is safe to
/// retry.
fn classify(err: sqlx::Error) -> PlaceBidError {
    if database::is_concurrency_conflict(&err) {
        PlaceBidError::Conflict
    } else {
        PlaceBidError::Database(err)
    }
}

fn status_into(status: AuctionStatus) -> database::auctions::AuctionStatus {
    match status {
        AuctionStatus::Pending => database::auctions::AuctionStatus::Pending,
        AuctionStatus::Active => database::auctions::AuctionStatus::Active,
        AuctionStatus::Ended => database::auctions::AuctionStatus::Ended,
        AuctionStatus::Cancelled => database::auctions::AuctionStatus::Cancelled,
    }
}

fn status_from(status: database::auctions::AuctionStatus) -> AuctionStatus {
    match status {
        database::auctions::AuctionStatus::Pending => AuctionStatus::Pending,
        database::auctions::AuctionStatus::Active => AuctionStatus::Active,
        database::auctions::AuctionStatus::Ended => AuctionStatus::Ended,
        database::auctions::AuctionStatus::Cancelled => AuctionStatus::Cancelled,
    }
}

fn bid_status_from(status: database::bids::BidStatus) -> BidStatus {
    match status {
        database::bids::BidStatus::Placed => BidStatus::Placed,
        database::bids::BidStatus::Winning => BidStatus::Winning,
        database::bids::BidStatus::Outbid => BidStatus::Outbid,
        database::bids::BidStatus::Accepted => BidStatus::Accepted,
        database::bids::BidStatus::Rejected => BidStatus::Rejected,
    }
}

fn auction_from_row(row: database::auctions::Auction) -> Auction {
    Auction {
        id: row.id,
        seller: row.seller,
        title: row.title,
        description: row.description,
        starting_price: row.starting_price,
        current_price: row.current_price,
        reserve_price: row.reserve_price,
        bid_increment: row.bid_increment,
        start_time: row.start_time,
        end_time: row.end_time,
        status: status_from(row.status),
        winning_bid_id: row.winning_bid_id,
    }
}

fn bid_from_row(row: database::bids::Bid) -> Bid {
    Bid {
        id: row.id,
        auction_id: row.auction_id,
        bidder: row.bidder,
        amount: row.amount,
        status: bid_status_from(row.status),
        created_at: row.created_at,
    }
}
