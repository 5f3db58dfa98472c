//! Pure auction lifecycle transition logic. Given the current state and
//! an event this decides the next state or rejects the event; it never
//! touches storage and never silently no-ops.

use model::{auction::Auction, auction::AuctionStatus, UserId};
use thiserror::Error;

/// An event that tries to move an auction to its next lifecycle state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Transition {
    /// Seller starts the auction clock. Resets `start_time` to the
    /// activation instant; the stored future start time does not gate
    /// bidding.
    Activate { actor: UserId },
    /// Seller withdraws the auction before it ended.
    Cancel { actor: UserId },
    /// System-triggered expiry when the countdown reaches zero.
    Expire,
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Activate { .. } => "activate",
            Self::Cancel { .. } => "cancel",
            Self::Expire => "expire",
        }
    }
}

/// A transition that is not legal from the auction's current state or
/// was attempted by someone other than the seller.
#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum PolicyViolation {
    #[error("cannot {transition} auction in state {status:?}")]
    InvalidState {
        transition: &'static str,
        status: AuctionStatus,
    },
    #[error("only the seller may {transition} the auction")]
    NotSeller { transition: &'static str },
}

/// Decides the state the auction moves into when `transition` is
/// applied, or rejects the transition.
pub fn next_status(auction: &Auction, transition: Transition) -> Result<AuctionStatus, PolicyViolation> {
    let invalid = || PolicyViolation::InvalidState {
        transition: transition.name(),
        status: auction.status,
    };
    match transition {
        Transition::Activate { actor } => {
            if auction.status != AuctionStatus::Pending {
                return Err(invalid());
            }
            require_seller(auction, actor, transition.name())?;
            Ok(AuctionStatus::Active)
        }
        Transition::Cancel { actor } => {
            if !matches!(auction.status, AuctionStatus::Pending | AuctionStatus::Active) {
                return Err(invalid());
            }
            require_seller(auction, actor, transition.name())?;
            Ok(AuctionStatus::Cancelled)
        }
        Transition::Expire => {
            if auction.status != AuctionStatus::Active {
                return Err(invalid());
            }
            Ok(AuctionStatus::Ended)
        }
    }
}

fn require_seller(
    auction: &Auction,
    actor: UserId,
    transition: &'static str,
) -> Result<(), PolicyViolation> {
    if actor != auction.seller {
        return Err(PolicyViolation::NotSeller { transition });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::Utc;

    const SELLER: UserId = 7;

    fn auction(status: AuctionStatus) -> Auction {
        Auction {
            id: 1,
            seller: SELLER,
            title: "lot".to_string(),
            description: String::new(),
            starting_price: BigDecimal::from(100),
            current_price: BigDecimal::from(100),
            reserve_price: None,
            bid_increment: None,
            start_time: Utc::now(),
            end_time: Utc::now(),
            status,
            winning_bid_id: None,
        }
    }

    #[test]
    fn activate_only_from_pending() {
        let transition = Transition::Activate { actor: SELLER };
        assert_eq!(
            next_status(&auction(AuctionStatus::Pending), transition),
            Ok(AuctionStatus::Active)
        );
        for status in [
            AuctionStatus::Active,
            AuctionStatus::Ended,
            AuctionStatus::Cancelled,
        ] {
            assert_eq!(
                next_status(&auction(status), transition),
                Err(PolicyViolation::InvalidState {
                    transition: "activate",
                    status,
                })
            );
        }
    }

    #[test]
    fn activate_requires_seller() {
        assert_eq!(
            next_status(
                &auction(AuctionStatus::Pending),
                Transition::Activate { actor: SELLER + 1 },
            ),
            Err(PolicyViolation::NotSeller {
                transition: "activate"
            })
        );
    }

    #[test]
    fn cancel_from_pending_or_active_only() {
        let transition = Transition::Cancel { actor: SELLER };
        assert_eq!(
            next_status(&auction(AuctionStatus::Pending), transition),
            Ok(AuctionStatus::Cancelled)
        );
        assert_eq!(
            next_status(&auction(AuctionStatus::Active), transition),
            Ok(AuctionStatus::Cancelled)
        );
        for status in [AuctionStatus::Ended, AuctionStatus::Cancelled] {
            assert!(next_status(&auction(status), transition).is_err());
        }
    }

    #[test]
    fn expire_only_from_active_and_needs_no_actor() {
        assert_eq!(
            next_status(&auction(AuctionStatus::Active), Transition::Expire),
            Ok(AuctionStatus::Ended)
        );
        for status in [
            AuctionStatus::Pending,
            AuctionStatus::Ended,
            AuctionStatus::Cancelled,
        ] {
            assert_eq!(
                next_status(&auction(status), Transition::Expire),
                Err(PolicyViolation::InvalidState {
                    transition: "expire",
                    status,
                })
            );
        }
    }

    #[test]
    fn cancelled_auction_never_reactivates() {
        // Terminal states reject every transition, so no sequence of
        // events re-enters Pending or Active.
        let cancelled = auction(AuctionStatus::Cancelled);
        assert!(next_status(&cancelled, Transition::Activate { actor: SELLER }).is_err());
        assert!(next_status(&cancelled, Transition::Cancel { actor: SELLER }).is_err());
        assert!(next_status(&cancelled, Transition::Expire).is_err());
    }
}
