//! Stores the bids of every auction. The ranked view over these rows
//! (`amount DESC, created_at ASC, id ASC`) is the bid ledger; it is
//! always derived from committed rows and never cached elsewhere.

use crate::auctions::{AuctionId, UserId};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

pub type BidId = i64;

#[derive(Clone, Copy, Debug, Eq, PartialEq, sqlx::Type)]
#[sqlx(type_name = "BidStatus")]
#[sqlx(rename_all = "lowercase")]
pub enum BidStatus {
    Placed,
    Winning,
    Outbid,
    Accepted,
    Rejected,
}

#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct Bid {
    pub id: BidId,
    pub auction_id: AuctionId,
    pub bidder: UserId,
    pub amount: BigDecimal,
    pub status: BidStatus,
    pub created_at: DateTime<Utc>,
}

pub async fn insert(
    ex: &mut PgConnection,
    auction_id: AuctionId,
    bidder: UserId,
    amount: &BigDecimal,
    created_at: DateTime<Utc>,
) -> Result<BidId, sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO bids (auction_id, bidder, amount, status, created_at)
VALUES ($1, $2, $3, 'placed', $4)
RETURNING id
    ;"#;
    let (id,) = sqlx::query_as(QUERY)
        .bind(auction_id)
        .bind(bidder)
        .bind(amount)
        .bind(created_at)
        .fetch_one(ex)
        .await?;
    Ok(id)
}

pub async fn single(ex: &mut PgConnection, id: BidId) -> Result<Option<Bid>, sqlx::Error> {
    const QUERY: &str = r#"
SELECT *
FROM bids
WHERE id = $1
    ;"#;
    sqlx::query_as(QUERY).bind(id).fetch_optional(ex).await
}

pub async fn set_status(
    ex: &mut PgConnection,
    id: BidId,
    status: BidStatus,
) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
UPDATE bids
SET status = $2
WHERE id = $1
    ;"#;
    sqlx::query(QUERY)
        .bind(id)
        .bind(status)
        .execute(ex)
        .await
        .map(|_| ())
}

/// Moves every live (`placed` or `winning`) bid of this bidder on this
/// auction to `outbid`. A bidder's new bid always supersedes their own
/// earlier ones. Returns the ids of the superseded bids.
pub async fn outbid_bidder(
    ex: &mut PgConnection,
    auction_id: AuctionId,
    bidder: UserId,
) -> Result<Vec<BidId>, sqlx::Error> {
    const QUERY: &str = r#"
UPDATE bids
SET status = 'outbid'
WHERE auction_id = $1 AND bidder = $2 AND status IN ('placed', 'winning')
RETURNING id
    ;"#;
    let rows: Vec<(BidId,)> = sqlx::query_as(QUERY)
        .bind(auction_id)
        .bind(bidder)
        .fetch_all(ex)
        .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Moves the current winning bid of the auction to `outbid` and returns
/// it, or `None` when no bid was winning.
pub async fn outbid_winning(
    ex: &mut PgConnection,
    auction_id: AuctionId,
) -> Result<Option<(BidId, UserId)>, sqlx::Error> {
    const QUERY: &str = r#"
UPDATE bids
SET status = 'outbid'
WHERE auction_id = $1 AND status = 'winning'
RETURNING id, bidder
    ;"#;
    sqlx::query_as(QUERY)
        .bind(auction_id)
        .fetch_optional(ex)
        .await
}

/// All bids of an auction in ledger order: highest amount first, ties
/// broken by earliest submission, then insertion order.
pub async fn ranked(
    ex: &mut PgConnection,
    auction_id: AuctionId,
) -> Result<Vec<Bid>, sqlx::Error> {
    const QUERY: &str = r#"
SELECT *
FROM bids
WHERE auction_id = $1
ORDER BY amount DESC, created_at ASC, id ASC
    ;"#;
    sqlx::query_as(QUERY).bind(auction_id).fetch_all(ex).await
}

/// The top of the ledger for the auction, if any bid exists.
pub async fn top_bid(
    ex: &mut PgConnection,
    auction_id: AuctionId,
) -> Result<Option<Bid>, sqlx::Error> {
    const QUERY: &str = r#"
SELECT *
FROM bids
WHERE auction_id = $1
ORDER BY amount DESC, created_at ASC, id ASC
LIMIT 1
    ;"#;
    sqlx::query_as(QUERY)
        .bind(auction_id)
        .fetch_optional(ex)
        .await
}
