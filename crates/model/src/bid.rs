use crate::{AuctionId, BidId, UserId};
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumString};

/// Status of a single bid.
///
/// At most one bid per auction is `Winning` at any time and it is
/// exactly the one referenced by the auction's `winning_bid_id`.
/// `Accepted` and `Rejected` are set after auction end by the
/// settlement collaborator, never by this engine.
#[derive(
    Eq, PartialEq, Clone, Copy, Debug, Default, Deserialize, Serialize, Hash, AsRefStr, EnumString,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
pub enum BidStatus {
    #[default]
    Placed,
    Winning,
    Outbid,
    Accepted,
    Rejected,
}

/// A monetary offer by a user against an active auction.
#[derive(Eq, PartialEq, Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub id: BidId,
    pub auction_id: AuctionId,
    pub bidder: UserId,
    pub amount: BigDecimal,
    pub status: BidStatus,
    pub created_at: DateTime<Utc>,
}

impl Bid {
    /// A bid still in the running, i.e. not superseded and not settled.
    pub fn is_live(&self) -> bool {
        matches!(self.status, BidStatus::Placed | BidStatus::Winning)
    }
}
