//! Advertisement data model

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core_types::{AdId, UserId};
use crate::money::CoinAmount;
use crate::rates::currency::CountryCode;

/// Days until a freshly posted ad expires. Enforced by the listing filter
/// comparing `expires_at` against the injected clock, not by a sweep.
pub const AD_LIFETIME_DAYS: i64 = 30;

/// Ad direction: what the poster wants to do with their coin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Buy => "buy",
            Direction::Sell => "sell",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Some(Direction::Buy),
            "sell" => Some(Direction::Sell),
            _ => None,
        }
    }
}

/// Lifecycle status of an advertisement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdStatus {
    Active,
    Expired,
    Cancelled,
    Exhausted,
}

impl AdStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdStatus::Active => "active",
            AdStatus::Expired => "expired",
            AdStatus::Cancelled => "cancelled",
            AdStatus::Exhausted => "exhausted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(AdStatus::Active),
            "expired" => Some(AdStatus::Expired),
            "cancelled" => Some(AdStatus::Cancelled),
            "exhausted" => Some(AdStatus::Exhausted),
            _ => None,
        }
    }
}

/// Settlement method accepted by an ad, with method-specific details.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum SettlementMethod {
    Mpesa { phone: String },
    MpesaPaybill { paybill: String, account: String },
    BankTransfer { bank: String, account: String, holder: String },
    AirtelMoney { phone: String },
}

impl SettlementMethod {
    pub fn code(&self) -> &'static str {
        match self {
            SettlementMethod::Mpesa { .. } => "mpesa",
            SettlementMethod::MpesaPaybill { .. } => "mpesa_paybill",
            SettlementMethod::BankTransfer { .. } => "bank_transfer",
            SettlementMethod::AirtelMoney { .. } => "airtel_money",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SettlementMethod::Mpesa { .. } => "M-Pesa",
            SettlementMethod::MpesaPaybill { .. } => "M-Pesa Paybill",
            SettlementMethod::BankTransfer { .. } => "Bank Transfer",
            SettlementMethod::AirtelMoney { .. } => "Airtel Money",
        }
    }

    /// Check that every required detail field is populated.
    pub fn validate(&self) -> Result<(), String> {
        let missing = |field: &str| {
            Err(format!(
                "settlement method {} is missing {}",
                self.code(),
                field
            ))
        };
        match self {
            SettlementMethod::Mpesa { phone } if phone.trim().is_empty() => missing("phone"),
            SettlementMethod::MpesaPaybill { paybill, account } => {
                if paybill.trim().is_empty() {
                    return missing("paybill number");
                }
                if account.trim().is_empty() {
                    return missing("account number");
                }
                Ok(())
            }
            SettlementMethod::BankTransfer { bank, account, holder } => {
                if bank.trim().is_empty() {
                    return missing("bank name");
                }
                if account.trim().is_empty() {
                    return missing("account number");
                }
                if holder.trim().is_empty() {
                    return missing("account holder name");
                }
                Ok(())
            }
            SettlementMethod::AirtelMoney { phone } if phone.trim().is_empty() => missing("phone"),
            _ => Ok(()),
        }
    }
}

/// A standing offer to buy or sell the coin at a fixed unit price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Advertisement {
    pub id: AdId,
    pub owner: UserId,
    pub direction: Direction,
    pub country: CountryCode,
    /// Total posted amount, scaled units.
    pub total_amount: CoinAmount,
    /// Unreserved portion; non-increasing while active.
    pub remaining_amount: CoinAmount,
    pub min_amount: CoinAmount,
    pub max_amount: CoinAmount,
    /// Price per coin in the ad country's national currency.
    pub unit_price: Decimal,
    pub methods: Vec<SettlementMethod>,
    pub terms: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: AdStatus,
}

impl Advertisement {
    /// Status as observed at `now`: a stored-active ad past its expiry
    /// timestamp reads as expired.
    pub fn status_at(&self, now: DateTime<Utc>) -> AdStatus {
        if self.status == AdStatus::Active && now >= self.expires_at {
            AdStatus::Expired
        } else {
            self.status
        }
    }

    /// Whether the ad can still accept trades at `now`.
    pub fn is_open(&self, now: DateTime<Utc>) -> bool {
        self.status_at(now) == AdStatus::Active && self.remaining_amount > 0
    }

    pub fn expiry_for(created_at: DateTime<Utc>) -> DateTime<Utc> {
        created_at + Duration::days(AD_LIFETIME_DAYS)
    }

    pub fn accepts_method(&self, code: &str) -> bool {
        self.methods.iter().any(|m| m.code() == code)
    }
}

/// Input for posting a new ad.
#[derive(Debug, Clone)]
pub struct AdSpec {
    pub direction: Direction,
    pub country: CountryCode,
    pub total_amount: CoinAmount,
    pub min_amount: CoinAmount,
    pub max_amount: CoinAmount,
    pub unit_price: Decimal,
    pub methods: Vec<SettlementMethod>,
    pub terms: Option<String>,
}

/// Optional listing filters.
#[derive(Debug, Clone, Default)]
pub struct AdFilters {
    /// Keep ads accepting at least one of these method codes.
    pub methods: Option<Vec<String>>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    /// Keep ads whose remaining amount is at least this much.
    pub min_tradeable: Option<CoinAmount>,
}

impl AdFilters {
    pub fn matches(&self, ad: &Advertisement) -> bool {
        if let Some(methods) = &self.methods
            && !methods.iter().any(|code| ad.accepts_method(code))
        {
            return false;
        }
        if let Some(min) = self.price_min
            && ad.unit_price < min
        {
            return false;
        }
        if let Some(max) = self.price_max
            && ad.unit_price > max
        {
            return false;
        }
        if let Some(min_amount) = self.min_tradeable
            && ad.remaining_amount < min_amount
        {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_ad() -> Advertisement {
        let created = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        Advertisement {
            id: uuid::Uuid::new_v4(),
            owner: 1,
            direction: Direction::Sell,
            country: CountryCode::KE,
            total_amount: 1000,
            remaining_amount: 1000,
            min_amount: 100,
            max_amount: 1000,
            unit_price: Decimal::new(1350, 2),
            methods: vec![SettlementMethod::Mpesa {
                phone: "0712000000".into(),
            }],
            terms: None,
            created_at: created,
            expires_at: Advertisement::expiry_for(created),
            status: AdStatus::Active,
        }
    }

    #[test]
    fn test_status_at_expiry_boundary() {
        let ad = sample_ad();
        let just_before = ad.expires_at - Duration::seconds(1);
        assert_eq!(ad.status_at(just_before), AdStatus::Active);
        assert_eq!(ad.status_at(ad.expires_at), AdStatus::Expired);
    }

    #[test]
    fn test_settlement_method_validation() {
        assert!(SettlementMethod::Mpesa { phone: "0712".into() }.validate().is_ok());
        assert!(SettlementMethod::Mpesa { phone: "  ".into() }.validate().is_err());
        assert!(
            SettlementMethod::BankTransfer {
                bank: "Equity".into(),
                account: "".into(),
                holder: "Jane".into(),
            }
            .validate()
            .is_err()
        );
    }

    #[test]
    fn test_settlement_method_serde_tag() {
        let m = SettlementMethod::MpesaPaybill {
            paybill: "400200".into(),
            account: "77".into(),
        };
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"method\":\"mpesa_paybill\""));
        let back: SettlementMethod = serde_json::from_str(&json).unwrap();
        assert_eq!(back, m);
    }

    #[test]
    fn test_filters() {
        let ad = sample_ad();
        let mut f = AdFilters::default();
        assert!(f.matches(&ad));

        f.methods = Some(vec!["bank_transfer".into()]);
        assert!(!f.matches(&ad));
        f.methods = Some(vec!["mpesa".into(), "bank_transfer".into()]);
        assert!(f.matches(&ad));

        f.min_tradeable = Some(2000);
        assert!(!f.matches(&ad));
    }
}
