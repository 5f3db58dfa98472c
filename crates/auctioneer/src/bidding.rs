//! Validation rules of the bid placement transaction. The checks run
//! against the auction row while it is locked by the placement
//! transaction, so the values they see are the most recently committed
//! ones and cannot be raced past.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use model::{auction::Auction, auction::AuctionStatus, bid::Bid, UserId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaceBidError {
    #[error("auction not found")]
    NotFound,
    #[error("auction is not accepting bids in state {0:?}")]
    InvalidState(AuctionStatus),
    #[error("auction already closed")]
    AuctionClosed,
    #[error("sellers cannot bid on their own auction")]
    SelfBidForbidden,
    #[error("bid too low, minimum acceptable amount is {minimum}")]
    BidTooLow { minimum: BigDecimal },
    #[error("bid lost a concurrent update race, try again")]
    Conflict,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Outcome of a committed bid placement.
#[derive(Clone, Debug, PartialEq)]
pub struct Placement {
    pub bid: Bid,
    /// Bidders whose bid got superseded, for outbid notifications. Does
    /// not include the new bidder superseding their own earlier bid.
    pub superseded_bidders: Vec<UserId>,
}

/// Runs the placement checks in their specified order, each failing
/// fast with its own error kind. Mutating the ledger is only legal
/// after this returned `Ok` within the same transaction that read
/// `auction`.
pub fn validate(
    auction: &Auction,
    bidder: UserId,
    amount: &BigDecimal,
    now: DateTime<Utc>,
) -> Result<(), PlaceBidError> {
    if auction.status != AuctionStatus::Active {
        return Err(PlaceBidError::InvalidState(auction.status));
    }
    // Guards against a bid racing in just as the countdown fires but
    // before the expire transition has committed.
    if now >= auction.end_time {
        return Err(PlaceBidError::AuctionClosed);
    }
    if bidder == auction.seller {
        return Err(PlaceBidError::SelfBidForbidden);
    }
    let too_low = match &auction.bid_increment {
        Some(increment) => amount < &(&auction.current_price + increment),
        None => amount <= &auction.current_price,
    };
    if too_low {
        return Err(PlaceBidError::BidTooLow {
            minimum: auction.minimum_acceptable_bid(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use std::str::FromStr;

    const SELLER: UserId = 1;
    const BIDDER: UserId = 2;

    fn active_auction(current: &str, increment: Option<&str>) -> Auction {
        Auction {
            id: 1,
            seller: SELLER,
            title: "lot".to_string(),
            description: String::new(),
            starting_price: BigDecimal::from_str(current).unwrap(),
            current_price: BigDecimal::from_str(current).unwrap(),
            reserve_price: None,
            bid_increment: increment.map(|i| BigDecimal::from_str(i).unwrap()),
            start_time: Utc::now(),
            end_time: Utc::now() + Duration::minutes(5),
            status: AuctionStatus::Active,
            winning_bid_id: None,
        }
    }

    fn amount(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn rejects_inactive_auction() {
        let mut auction = active_auction("100", None);
        auction.status = AuctionStatus::Pending;
        assert!(matches!(
            validate(&auction, BIDDER, &amount("150"), Utc::now()),
            Err(PlaceBidError::InvalidState(AuctionStatus::Pending))
        ));
    }

    #[test]
    fn rejects_bid_at_or_after_end_time() {
        let auction = active_auction("100", None);
        assert!(matches!(
            validate(&auction, BIDDER, &amount("150"), auction.end_time),
            Err(PlaceBidError::AuctionClosed)
        ));
        assert!(matches!(
            validate(
                &auction,
                BIDDER,
                &amount("150"),
                auction.end_time + Duration::seconds(1),
            ),
            Err(PlaceBidError::AuctionClosed)
        ));
    }

    #[test]
    fn rejects_seller_bidding_on_own_auction() {
        let auction = active_auction("100", None);
        assert!(matches!(
            validate(&auction, SELLER, &amount("150"), Utc::now()),
            Err(PlaceBidError::SelfBidForbidden)
        ));
    }

    #[test]
    fn amount_must_strictly_exceed_current_price() {
        let auction = active_auction("150", None);
        let err = validate(&auction, BIDDER, &amount("120"), Utc::now()).unwrap_err();
        match err {
            PlaceBidError::BidTooLow { minimum } => assert_eq!(minimum, amount("150.01")),
            other => panic!("unexpected error: {other}"),
        }
        // Equal is not enough either.
        assert!(validate(&auction, BIDDER, &amount("150"), Utc::now()).is_err());
        assert!(validate(&auction, BIDDER, &amount("150.005"), Utc::now()).is_ok());
    }

    #[test]
    fn increment_sets_the_minimum_raise() {
        let auction = active_auction("100", Some("10"));
        let err = validate(&auction, BIDDER, &amount("105"), Utc::now()).unwrap_err();
        match err {
            PlaceBidError::BidTooLow { minimum } => assert_eq!(minimum, amount("110")),
            other => panic!("unexpected error: {other}"),
        }
        // Exactly current + increment is acceptable.
        assert!(validate(&auction, BIDDER, &amount("110"), Utc::now()).is_ok());
    }
}
