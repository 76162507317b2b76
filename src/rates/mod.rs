//! Exchange rate resolution
//!
//! Two read paths with different freshness needs:
//! - [`resolver::RateResolver`] - USD-based multi-currency snapshot from
//!   a primary source, a backup source and a static table, cached 1 hour.
//! - [`country::CountryRateCache`] - one country's coin price from the
//!   persisted rate table, cached 5 minutes.
//!
//! Neither path ever raises to the caller; provenance tags say how live
//! the numbers are.

pub mod country;
pub mod currency;
pub mod resolver;
pub mod sources;

pub use country::{CountryRateCache, PriceBand, COUNTRY_TTL_SECS, PRICE_BAND_PERCENT};
pub use currency::{CountryCode, CurrencyCode};
pub use resolver::{RateResolver, RateSnapshot, SNAPSHOT_TTL_SECS};
pub use sources::{HttpRateSource, Provenance, RateSource, SourceError, StaticRateSource};
