//! Stores auctions together with their lifecycle status and the
//! denormalized bidding state (`current_price`, `winning_bid_id`) that
//! has to change atomically with the bid rows.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;

pub type AuctionId = i64;
pub type UserId = i64;

/// Postgres enum type backing the auction lifecycle state.
#[derive(Clone, Copy, Debug, Eq, PartialEq, sqlx::Type)]
#[sqlx(type_name = "AuctionStatus")]
#[sqlx(rename_all = "lowercase")]
pub enum AuctionStatus {
    Pending,
    Active,
    Ended,
    Cancelled,
}

#[derive(Clone, Debug, PartialEq, sqlx::FromRow)]
pub struct Auction {
    pub id: AuctionId,
    pub seller: UserId,
    pub title: String,
    pub description: String,
    pub starting_price: BigDecimal,
    pub current_price: BigDecimal,
    pub reserve_price: Option<BigDecimal>,
    pub bid_increment: Option<BigDecimal>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AuctionStatus,
    pub winning_bid_id: Option<i64>,
}

/// Insertable auction without the database-assigned id. New auctions
/// always start out `pending` with `current_price = starting_price`.
#[derive(Clone, Debug, PartialEq)]
pub struct NewAuction {
    pub seller: UserId,
    pub title: String,
    pub description: String,
    pub starting_price: BigDecimal,
    pub reserve_price: Option<BigDecimal>,
    pub bid_increment: Option<BigDecimal>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

pub async fn insert(ex: &mut PgConnection, auction: &NewAuction) -> Result<AuctionId, sqlx::Error> {
    const QUERY: &str = r#"
INSERT INTO auctions (
    seller, title, description, starting_price, current_price,
    reserve_price, bid_increment, start_time, end_time, status
)
VALUES ($1, $2, $3, $4, $4, $5, $6, $7, $8, 'pending')
RETURNING id
    ;"#;
    let (id,) = sqlx::query_as(QUERY)
        .bind(auction.seller)
        .bind(&auction.title)
        .bind(&auction.description)
        .bind(&auction.starting_price)
        .bind(&auction.reserve_price)
        .bind(&auction.bid_increment)
        .bind(auction.start_time)
        .bind(auction.end_time)
        .fetch_one(ex)
        .await?;
    Ok(id)
}

pub async fn single(
    ex: &mut PgConnection,
    id: AuctionId,
) -> Result<Option<Auction>, sqlx::Error> {
    const QUERY: &str = r#"
SELECT *
FROM auctions
WHERE id = $1
    ;"#;
    sqlx::query_as(QUERY).bind(id).fetch_optional(ex).await
}

/// Reads the auction while taking its row lock. Every mutation of an
/// auction and its bids starts with this read so that concurrent
/// placements and lifecycle transitions on the same auction serialize.
pub async fn lock_for_update(
    ex: &mut PgConnection,
    id: AuctionId,
) -> Result<Option<Auction>, sqlx::Error> {
    const QUERY: &str = r#"
SELECT *
FROM auctions
WHERE id = $1
FOR UPDATE
    ;"#;
    sqlx::query_as(QUERY).bind(id).fetch_optional(ex).await
}

/// All auctions currently in the `active` state, used to re-hydrate
/// countdowns at process start.
pub async fn all_active(ex: &mut PgConnection) -> Result<Vec<Auction>, sqlx::Error> {
    const QUERY: &str = r#"
SELECT *
FROM auctions
WHERE status = 'active'
ORDER BY id
    ;"#;
    sqlx::query_as(QUERY).fetch_all(ex).await
}

/// Moves the auction from the expected status into a new one,
/// optionally resetting `start_time` (activation resets the clock to
/// the activation instant). Returns the number of affected rows; zero
/// means the expected status no longer matched, i.e. the caller lost a
/// race and has to re-read.
pub async fn update_status(
    ex: &mut PgConnection,
    id: AuctionId,
    expected: AuctionStatus,
    new: AuctionStatus,
    start_time: Option<DateTime<Utc>>,
) -> Result<u64, sqlx::Error> {
    const QUERY: &str = r#"
UPDATE auctions
SET status = $3, start_time = COALESCE($4, start_time)
WHERE id = $1 AND status = $2
    ;"#;
    let result = sqlx::query(QUERY)
        .bind(id)
        .bind(expected)
        .bind(new)
        .bind(start_time)
        .execute(ex)
        .await?;
    Ok(result.rows_affected())
}

/// Points the auction at its new winning bid. Only valid inside the
/// same transaction that inserted and promoted that bid.
pub async fn set_winning_bid(
    ex: &mut PgConnection,
    id: AuctionId,
    current_price: &BigDecimal,
    winning_bid_id: i64,
) -> Result<(), sqlx::Error> {
    const QUERY: &str = r#"
UPDATE auctions
SET current_price = $2, winning_bid_id = $3
WHERE id = $1
    ;"#;
    sqlx::query(QUERY)
        .bind(id)
        .bind(current_price)
        .bind(winning_bid_id)
        .execute(ex)
        .await
        .map(|_| ())
}
