//! Ranking rules of the bid ledger. The ledger itself is the set of
//! committed bid rows of an auction; these helpers define the one
//! ordering everybody (queries and in-memory views alike) agrees on:
//! highest amount first, ties broken by earliest submission, then by
//! insertion order.

use model::{bid::Bid, BidId};
use std::cmp::Ordering;

/// Compares two bids in ledger order. `Less` means `a` ranks ahead of
/// `b`.
pub fn ranking(a: &Bid, b: &Bid) -> Ordering {
    b.amount
        .cmp(&a.amount)
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// The bid currently ranked highest, or `None` for an auction without
/// bids.
pub fn current_winner(bids: &[Bid]) -> Option<&Bid> {
    bids.iter().min_by(|a, b| ranking(a, b))
}

/// Zero-based position of the bid in the ledger, or `None` if the bid
/// is not part of it.
pub fn rank(bids: &[Bid], bid: BidId) -> Option<usize> {
    let mut sorted = bids.iter().collect::<Vec<_>>();
    sorted.sort_by(|a, b| ranking(a, b));
    sorted.iter().position(|candidate| candidate.id == bid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bigdecimal::BigDecimal;
    use chrono::{Duration, Utc};
    use model::bid::BidStatus;

    fn bid(id: BidId, amount: u32, age_seconds: i64) -> Bid {
        Bid {
            id,
            auction_id: 1,
            bidder: id,
            amount: BigDecimal::from(amount),
            status: BidStatus::Placed,
            created_at: Utc::now() - Duration::seconds(age_seconds),
        }
    }

    #[test]
    fn highest_amount_wins() {
        let bids = vec![bid(1, 150, 10), bid(2, 200, 5), bid(3, 120, 1)];
        assert_eq!(current_winner(&bids).unwrap().id, 2);
        assert_eq!(rank(&bids, 2), Some(0));
        assert_eq!(rank(&bids, 1), Some(1));
        assert_eq!(rank(&bids, 3), Some(2));
    }

    #[test]
    fn exact_tie_goes_to_earliest_submission() {
        let earlier = bid(5, 150, 10);
        let later = bid(4, 150, 2);
        let bids = vec![later, earlier];
        assert_eq!(current_winner(&bids).unwrap().id, 5);
    }

    #[test]
    fn identical_timestamps_fall_back_to_insertion_order() {
        let now = Utc::now();
        let mut a = bid(1, 150, 0);
        let mut b = bid(2, 150, 0);
        a.created_at = now;
        b.created_at = now;
        assert_eq!(current_winner(&[b, a]).unwrap().id, 1);
    }

    #[test]
    fn empty_ledger_has_no_winner() {
        assert_eq!(current_winner(&[]), None);
        assert_eq!(rank(&[], 1), None);
    }
}
