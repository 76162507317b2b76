//! Currency and country codes with static fallback tables
//!
//! Every supported code has a documented static rate so a partial or total
//! source outage never yields an undefined value. The static numbers are
//! deliberately conservative snapshots, not live data.

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Supported quote currencies, USD-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub enum CurrencyCode {
    KES,
    UGX,
    TZS,
    GHS,
    NGN,
    ZAR,
    ZMW,
    XOF,
    BWP,
    ZWL,
    USD,
}

impl CurrencyCode {
    pub const ALL: [CurrencyCode; 11] = [
        CurrencyCode::KES,
        CurrencyCode::UGX,
        CurrencyCode::TZS,
        CurrencyCode::GHS,
        CurrencyCode::NGN,
        CurrencyCode::ZAR,
        CurrencyCode::ZMW,
        CurrencyCode::XOF,
        CurrencyCode::BWP,
        CurrencyCode::ZWL,
        CurrencyCode::USD,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CurrencyCode::KES => "KES",
            CurrencyCode::UGX => "UGX",
            CurrencyCode::TZS => "TZS",
            CurrencyCode::GHS => "GHS",
            CurrencyCode::NGN => "NGN",
            CurrencyCode::ZAR => "ZAR",
            CurrencyCode::ZMW => "ZMW",
            CurrencyCode::XOF => "XOF",
            CurrencyCode::BWP => "BWP",
            CurrencyCode::ZWL => "ZWL",
            CurrencyCode::USD => "USD",
        }
    }

    /// Static USD→currency rate used when a source omits this code.
    pub fn static_rate(&self) -> Decimal {
        match self {
            CurrencyCode::KES => Decimal::new(1355, 1),  // 135.5
            CurrencyCode::UGX => Decimal::from(3850),
            CurrencyCode::TZS => Decimal::from(2650),
            CurrencyCode::GHS => Decimal::new(165, 1),   // 16.5
            CurrencyCode::NGN => Decimal::from(1580),
            CurrencyCode::ZAR => Decimal::new(182, 1),   // 18.2
            CurrencyCode::ZMW => Decimal::from(30),
            CurrencyCode::XOF => Decimal::from(655),
            CurrencyCode::BWP => Decimal::new(138, 1),   // 13.8
            CurrencyCode::ZWL => Decimal::from(6500),
            CurrencyCode::USD => Decimal::ONE,
        }
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CurrencyCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CurrencyCode::ALL
            .iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or(())
    }
}

/// Supported marketplace countries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CountryCode {
    KE,
    UG,
    TZ,
    GH,
    NG,
    ZA,
    ZM,
    BJ,
}

impl CountryCode {
    pub const ALL: [CountryCode; 8] = [
        CountryCode::KE,
        CountryCode::UG,
        CountryCode::TZ,
        CountryCode::GH,
        CountryCode::NG,
        CountryCode::ZA,
        CountryCode::ZM,
        CountryCode::BJ,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CountryCode::KE => "KE",
            CountryCode::UG => "UG",
            CountryCode::TZ => "TZ",
            CountryCode::GH => "GH",
            CountryCode::NG => "NG",
            CountryCode::ZA => "ZA",
            CountryCode::ZM => "ZM",
            CountryCode::BJ => "BJ",
        }
    }

    /// National currency the marketplace quotes in for this country.
    pub fn currency(&self) -> CurrencyCode {
        match self {
            CountryCode::KE => CurrencyCode::KES,
            CountryCode::UG => CurrencyCode::UGX,
            CountryCode::TZ => CurrencyCode::TZS,
            CountryCode::GH => CurrencyCode::GHS,
            CountryCode::NG => CurrencyCode::NGN,
            CountryCode::ZA => CurrencyCode::ZAR,
            CountryCode::ZM => CurrencyCode::ZMW,
            CountryCode::BJ => CurrencyCode::XOF,
        }
    }

    /// Static coin price in the national currency, used when the persisted
    /// rate table has no row for this country.
    pub fn static_coin_price(&self) -> Decimal {
        match self {
            CountryCode::KE => Decimal::new(1350, 2),    // 13.50
            CountryCode::UG => Decimal::new(5320, 2),    // 53.20
            CountryCode::TZ => Decimal::new(805000, 2),  // 8050.00
            CountryCode::GH => Decimal::new(11450, 2),   // 114.50
            CountryCode::NG => Decimal::new(208400, 2),  // 2084.00
            CountryCode::ZA => Decimal::new(5180, 2),    // 51.80
            CountryCode::ZM => Decimal::new(33, 2),      // 0.33
            CountryCode::BJ => Decimal::new(7430, 2),    // 74.30
        }
    }
}

impl fmt::Display for CountryCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CountryCode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CountryCode::ALL
            .iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or(())
    }
}
