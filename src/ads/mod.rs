//! Advertisement inventory
//!
//! Ownership: an ad is mutated only by trade creation (remaining-amount
//! decrement, inside the ledger store) and by its owner (cancel). Expiry
//! is a property of reads, not a background job.

pub mod manager;
pub mod types;

pub use manager::{AdInventoryManager, AdListing};
pub use types::{AdFilters, AdSpec, AdStatus, Advertisement, Direction, SettlementMethod};
