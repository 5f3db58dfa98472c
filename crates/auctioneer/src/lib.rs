pub mod arguments;
pub mod auctioneer;
pub mod bidding;
pub mod countdown;
pub mod database;
pub mod events;
pub mod ledger;
pub mod lifecycle;
pub mod run;
pub mod state_machine;

pub use self::run::run;
