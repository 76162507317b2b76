//! Money conversion module
//!
//! The coin is carried internally as `u64` scaled to [`COIN_DECIMALS`]
//! decimal places (0.01 steps). Client-facing strings and local-currency
//! `Decimal` prices convert through here; no other module does its own
//! scaling arithmetic.

use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use thiserror::Error;

/// Decimal places of the internal coin representation.
pub const COIN_DECIMALS: u32 = 2;

/// Scale factor: 1 coin = 100 internal units.
pub const COIN_SCALE: u64 = 100;

/// Amount of coin in internal scaled units.
pub type CoinAmount = u64;

// Marketplace thresholds, in scaled units.

/// Smallest total amount a posted ad may offer (5 coins).
pub const MIN_AD_TOTAL: CoinAmount = 5 * COIN_SCALE;
/// Smallest per-trade minimum an ad may set (1 coin).
pub const MIN_AD_PER_TRADE: CoinAmount = COIN_SCALE;
/// Absolute floor for a single trade (2 coins).
pub const MIN_TRADE_AMOUNT: CoinAmount = 2 * COIN_SCALE;
/// Collateral debited when posting a sell ad (10 coins).
pub const AD_POSTING_COLLATERAL: CoinAmount = 10 * COIN_SCALE;
/// Floor for a direct user-to-user transfer (10 coins).
pub const MIN_TRANSFER_AMOUNT: CoinAmount = 10 * COIN_SCALE;
/// Default mining reward when no config row exists (0.25 coins).
pub const DEFAULT_MINING_REWARD: CoinAmount = 25;

/// Money conversion errors
#[derive(Debug, Error)]
pub enum MoneyError {
    #[error("precision overflow: provided {provided} decimals, max allowed {max}")]
    PrecisionOverflow { provided: u32, max: u32 },

    #[error("amount must be positive")]
    InvalidAmount,

    #[error("amount too large, would overflow")]
    Overflow,

    #[error("invalid format: {0}")]
    InvalidFormat(String),
}

/// Parse a client coin-amount string ("1.5", "100") into scaled units.
///
/// Rejects negatives, zero, excess precision and ambiguous forms like
/// ".5" or "5." - no silent truncation.
pub fn parse_coin(amount_str: &str) -> Result<CoinAmount, MoneyError> {
    let amount_str = amount_str.trim();
    if amount_str.is_empty() {
        return Err(MoneyError::InvalidFormat("empty string".into()));
    }
    if amount_str.starts_with('-') || amount_str.starts_with('+') {
        return Err(MoneyError::InvalidAmount);
    }

    let parts: Vec<&str> = amount_str.split('.').collect();
    let (whole, frac) = match parts.len() {
        1 => (parts[0], ""),
        2 => {
            if parts[0].is_empty() || parts[1].is_empty() {
                return Err(MoneyError::InvalidFormat(
                    "use a leading and trailing digit around the dot (e.g. 0.5)".into(),
                ));
            }
            (parts[0], parts[1])
        }
        _ => return Err(MoneyError::InvalidFormat("multiple decimal points".into())),
    };

    if frac.len() > COIN_DECIMALS as usize {
        return Err(MoneyError::PrecisionOverflow {
            provided: frac.len() as u32,
            max: COIN_DECIMALS,
        });
    }

    let whole_num: u64 = whole
        .parse()
        .map_err(|_| MoneyError::InvalidFormat(format!("invalid whole part: {whole}")))?;

    let frac_num: u64 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac, width = COIN_DECIMALS as usize);
        padded
            .parse()
            .map_err(|_| MoneyError::InvalidFormat("invalid fractional part".into()))?
    };

    let amount = whole_num
        .checked_mul(COIN_SCALE)
        .and_then(|v| v.checked_add(frac_num))
        .ok_or(MoneyError::Overflow)?;

    if amount == 0 {
        return Err(MoneyError::InvalidAmount);
    }

    Ok(amount)
}

/// Format scaled units as a client-facing coin string ("1.50").
pub fn format_coin(value: CoinAmount) -> String {
    let d = Decimal::from(value) / Decimal::from(COIN_SCALE);
    format!("{:.prec$}", d, prec = COIN_DECIMALS as usize)
}

/// Scaled units as a `Decimal` coin count, for price arithmetic.
pub fn coin_to_decimal(value: CoinAmount) -> Decimal {
    Decimal::from(value) / Decimal::from(COIN_SCALE)
}

/// Total local-currency price of `amount` at `unit_price` per coin.
pub fn total_price(amount: CoinAmount, unit_price: Decimal) -> Decimal {
    (coin_to_decimal(amount) * unit_price).round_dp(2)
}

/// Convert a `Decimal` coin count into scaled units.
pub fn decimal_to_coin(value: Decimal) -> Result<CoinAmount, MoneyError> {
    if value.is_sign_negative() || value.is_zero() {
        return Err(MoneyError::InvalidAmount);
    }
    if value.scale() > COIN_DECIMALS {
        return Err(MoneyError::PrecisionOverflow {
            provided: value.scale(),
            max: COIN_DECIMALS,
        });
    }
    (value * Decimal::from(COIN_SCALE))
        .to_u64()
        .ok_or(MoneyError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_coin() {
        assert_eq!(parse_coin("1.5").unwrap(), 150);
        assert_eq!(parse_coin("100").unwrap(), 10_000);
        assert_eq!(parse_coin("0.25").unwrap(), 25);
    }

    #[test]
    fn test_parse_coin_rejects_bad_input() {
        assert!(parse_coin("").is_err());
        assert!(parse_coin("-1").is_err());
        assert!(parse_coin("0").is_err());
        assert!(parse_coin(".5").is_err());
        assert!(parse_coin("5.").is_err());
        assert!(parse_coin("1.234").is_err()); // too many decimals
        assert!(parse_coin("1.2.3").is_err());
    }

    #[test]
    fn test_format_coin() {
        assert_eq!(format_coin(150), "1.50");
        assert_eq!(format_coin(25), "0.25");
        assert_eq!(format_coin(10_000), "100.00");
    }

    #[test]
    fn test_total_price() {
        let unit = Decimal::new(1350, 2); // 13.50
        assert_eq!(total_price(300, unit), Decimal::new(4050, 2)); // 3 coins
    }

    #[test]
    fn test_decimal_roundtrip() {
        let d = coin_to_decimal(275);
        assert_eq!(decimal_to_coin(d).unwrap(), 275);
    }
}
