//! Domain types for the auction lifecycle and bidding engine with
//! serialization as exposed to the surrounding marketplace services.

pub mod auction;
pub mod bid;
pub mod events;

/// Database-assigned auction identifier.
pub type AuctionId = i64;
/// Database-assigned bid identifier.
pub type BidId = i64;
/// Identifier of a marketplace user (seller or bidder). User accounts
/// themselves live outside this engine.
pub type UserId = i64;
