//! Domain events published by the engine for external consumers such as
//! the real-time transport or email triggers. Delivery is at-most-once
//! and best-effort; the persisted auction and bid rows remain the
//! source of truth for every state change announced here.

use crate::{AuctionId, BidId, UserId};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};

#[derive(Eq, PartialEq, Clone, Debug, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AuctionEvent {
    #[serde(rename_all = "camelCase")]
    AuctionActivated { auction_id: AuctionId },
    #[serde(rename_all = "camelCase")]
    AuctionCancelled { auction_id: AuctionId },
    #[serde(rename_all = "camelCase")]
    AuctionEnded {
        auction_id: AuctionId,
        /// `None` when the auction ended without a single bid.
        winning_bid_id: Option<BidId>,
    },
    /// Periodic countdown tick so observers can display remaining time
    /// without polling.
    #[serde(rename_all = "camelCase")]
    TimeRemaining {
        auction_id: AuctionId,
        seconds_remaining: u64,
    },
    #[serde(rename_all = "camelCase")]
    BidPlaced {
        auction_id: AuctionId,
        bid_id: BidId,
        bidder: UserId,
        amount: BigDecimal,
        /// Bidders whose winning bid got superseded by this one, for
        /// outbid notifications.
        superseded_bidders: Vec<UserId>,
    },
}

impl AuctionEvent {
    pub fn auction_id(&self) -> AuctionId {
        match self {
            Self::AuctionActivated { auction_id }
            | Self::AuctionCancelled { auction_id }
            | Self::AuctionEnded { auction_id, .. }
            | Self::TimeRemaining { auction_id, .. }
            | Self::BidPlaced { auction_id, .. } => *auction_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_json_shape() {
        let event = AuctionEvent::AuctionEnded {
            auction_id: 3,
            winning_bid_id: None,
        };
        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            serde_json::json!({
                "kind": "auctionEnded",
                "auctionId": 3,
                "winningBidId": null,
            })
        );
    }
}
