//! Core types used throughout the system
//!
//! Fundamental identifiers shared by all modules. Advertisement ids are
//! UUIDs (assigned by whoever persists the ad); trade and transfer ids are
//! ULIDs so they sort by creation time without coordination.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// User ID - globally unique, immutable after assignment.
///
/// Primary key for user accounts and balance rows.
pub type UserId = u64;

/// Advertisement ID
pub type AdId = uuid::Uuid;

/// Trade ID - ULID-based, monotonic and sortable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TradeId(ulid::Ulid);

/// Transfer receipt ID - ULID-based
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferId(ulid::Ulid);

macro_rules! ulid_id {
    ($name:ident) => {
        impl $name {
            /// Generate a new unique id
            pub fn new() -> Self {
                Self(ulid::Ulid::new())
            }

            /// Get the inner ULID value
            pub fn inner(&self) -> ulid::Ulid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(ulid::Ulid::from_string(s)?))
            }
        }

        impl Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
                s.collect_str(&self.0)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
                let s = String::deserialize(d)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

ulid_id!(TradeId);
ulid_id!(TransferId);
