use crate::{AuctionId, BidId, UserId};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Lifecycle state of an auction.
///
/// Transitions are monotonic along `Pending -> Active -> {Ended |
/// Cancelled}`; a terminal state is never left again. The transition
/// rules themselves live in the engine's state machine.
#[derive(
    Eq, PartialEq, Clone, Copy, Debug, Default, Deserialize, Serialize, Hash, AsRefStr, EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum AuctionStatus {
    #[default]
    Pending,
    Active,
    Ended,
    Cancelled,
}

impl AuctionStatus {
    /// Terminal states cannot be left by any transition.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Ended | Self::Cancelled)
    }
}

/// A time-boxed sale of one item.
///
/// `current_price` always equals the amount of the bid referenced by
/// `winning_bid_id` when one exists and `starting_price` otherwise.
#[derive(Eq, PartialEq, Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Auction {
    pub id: AuctionId,
    pub seller: UserId,
    /// Opaque to the engine, carried for consumers of the event stream.
    pub title: String,
    pub description: String,
    pub starting_price: BigDecimal,
    pub current_price: BigDecimal,
    pub reserve_price: Option<BigDecimal>,
    /// Minimum step a new bid has to clear on top of `current_price`.
    pub bid_increment: Option<BigDecimal>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: AuctionStatus,
    pub winning_bid_id: Option<BidId>,
}

impl Auction {
    /// The smallest amount the next bid is told it has to reach. Without
    /// a configured increment the advertised step is one cent.
    pub fn minimum_acceptable_bid(&self) -> BigDecimal {
        let step = self
            .bid_increment
            .clone()
            .unwrap_or_else(|| BigDecimal::new(1.into(), 2));
        &self.current_price + step
    }
}
