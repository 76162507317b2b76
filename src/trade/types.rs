//! Trade data model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ads::types::SettlementMethod;
use crate::core_types::{AdId, TradeId, UserId};
use crate::money::CoinAmount;

/// Trade lifecycle status. Created in `Pending`; later transitions are
/// performed by the external settlement process only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Pending,
    Completed,
    Cancelled,
    Disputed,
}

impl TradeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeStatus::Pending => "pending",
            TradeStatus::Completed => "completed",
            TradeStatus::Cancelled => "cancelled",
            TradeStatus::Disputed => "disputed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TradeStatus::Pending),
            "completed" => Some(TradeStatus::Completed),
            "cancelled" => Some(TradeStatus::Cancelled),
            "disputed" => Some(TradeStatus::Disputed),
            _ => None,
        }
    }
}

/// A trade reserved against an advertisement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: TradeId,
    pub ad_id: AdId,
    pub buyer: UserId,
    pub seller: UserId,
    /// Reserved coin amount, scaled units.
    pub amount: CoinAmount,
    /// amount * ad unit price, in the ad's national currency.
    pub total_price: Decimal,
    /// Settlement method agreed during settlement; unset at initiation.
    pub method: Option<SettlementMethod>,
    pub status: TradeStatus,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for s in [
            TradeStatus::Pending,
            TradeStatus::Completed,
            TradeStatus::Cancelled,
            TradeStatus::Disputed,
        ] {
            assert_eq!(TradeStatus::parse(s.as_str()), Some(s));
        }
        assert_eq!(TradeStatus::parse("settled"), None);
    }
}
