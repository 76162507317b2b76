//! Gateway types: response envelope, error codes and DTOs
//!
//! Every response uses the unified `{code, msg, data}` envelope. Amounts
//! cross the API boundary as strings to avoid float precision issues;
//! parsing goes through `crate::money`.

use std::collections::BTreeMap;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::ads::{AdListing, Advertisement, SettlementMethod};
use crate::core_types::UserId;
use crate::error::CoreError;
use crate::ledger::{BalanceOverview, ClaimOutcome, TraderStats, TransferReceipt};
use crate::mining::MiningStatusView;
use crate::money::{CoinAmount, format_coin};
use crate::rates::RateSnapshot;
use crate::trade::Trade;
use crate::transfer::Eligibility;

// ============================================================================
// Unified API Response Format
// ============================================================================

/// Unified response wrapper: code 0 = success, non-zero = error code.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    #[schema(example = 0)]
    pub code: i32,
    #[schema(example = "ok")]
    pub msg: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            msg: "ok".to_string(),
            data: Some(data),
        }
    }
}

/// Standard API error codes.
pub mod error_codes {
    pub const SUCCESS: i32 = 0;

    // Client errors (1xxx)
    pub const VALIDATION: i32 = 1001;
    pub const CONFLICT: i32 = 1002;

    // Auth errors (2xxx)
    pub const MISSING_AUTH: i32 = 2001;

    // Server errors (5xxx)
    pub const INTERNAL_ERROR: i32 = 5000;
}

/// Handler error: HTTP status plus envelope code and message.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: i32,
    pub msg: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: i32, msg: impl Into<String>) -> Self {
        Self {
            status,
            code,
            msg: msg.into(),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error_codes::VALIDATION, msg)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            error_codes::MISSING_AUTH,
            "authentication required",
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ApiResponse::<()> {
            code: self.code,
            msg: self.msg,
            data: None,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        match &e {
            CoreError::Validation(msg) => Self::bad_request(msg.clone()),
            CoreError::Conflict(msg) => {
                Self::new(StatusCode::CONFLICT, error_codes::CONFLICT, msg.clone())
            }
            CoreError::AuthRequired => Self::unauthorized(),
            // Detail is already logged at the point of failure.
            CoreError::Unexpected(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                error_codes::INTERNAL_ERROR,
                "internal error",
            ),
        }
    }
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse::success(data)))
}

// ============================================================================
// Request DTOs
// ============================================================================

#[derive(Debug, Deserialize, ToSchema)]
pub struct PostAdRequest {
    /// "buy" or "sell"
    #[schema(example = "sell")]
    pub direction: String,
    /// ISO country code; defaults to KE.
    #[schema(example = "KE")]
    pub country: Option<String>,
    /// Amounts as strings to avoid float precision issues.
    #[schema(example = "10")]
    pub total_amount: String,
    #[schema(example = "1")]
    pub min_amount: String,
    #[schema(example = "10")]
    pub max_amount: String,
    #[schema(example = "13.50")]
    pub unit_price: String,
    #[serde(default)]
    #[schema(value_type = Vec<Object>)]
    pub methods: Vec<SettlementMethod>,
    pub terms: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct InitiateTradeRequest {
    pub ad_id: uuid::Uuid,
    /// Optional; defaults to the ad's per-trade minimum.
    #[schema(example = "3")]
    pub amount: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct TransferApiRequest {
    #[schema(example = "amina")]
    pub recipient: String,
    #[schema(example = "25")]
    pub amount: String,
    /// Client idempotency token.
    pub token: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RecordRateRequest {
    #[schema(example = "16.29")]
    pub price: String,
}

#[derive(Debug, Deserialize)]
pub struct ListAdsQuery {
    /// "buy" or "sell" - the direction of the ads to list.
    pub direction: String,
    /// Comma-separated settlement method codes.
    pub methods: Option<String>,
    pub price_min: Option<Decimal>,
    pub price_max: Option<Decimal>,
    /// Minimum tradeable amount, coin string.
    pub min_amount: Option<String>,
}

// ============================================================================
// Response DTOs
// ============================================================================

#[derive(Debug, Serialize, ToSchema)]
pub struct AdView {
    pub id: uuid::Uuid,
    pub owner: UserId,
    pub direction: String,
    pub country: String,
    pub currency: String,
    pub total_amount: String,
    pub remaining_amount: String,
    pub min_amount: String,
    pub max_amount: String,
    pub unit_price: String,
    #[schema(value_type = Vec<Object>)]
    pub methods: Vec<SettlementMethod>,
    pub terms: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: String,
}

impl From<Advertisement> for AdView {
    fn from(ad: Advertisement) -> Self {
        Self {
            id: ad.id,
            owner: ad.owner,
            direction: ad.direction.as_str().to_string(),
            country: ad.country.as_str().to_string(),
            currency: ad.country.currency().as_str().to_string(),
            total_amount: format_coin(ad.total_amount),
            remaining_amount: format_coin(ad.remaining_amount),
            min_amount: format_coin(ad.min_amount),
            max_amount: format_coin(ad.max_amount),
            unit_price: ad.unit_price.to_string(),
            methods: ad.methods,
            terms: ad.terms,
            created_at: ad.created_at,
            expires_at: ad.expires_at,
            status: ad.status.as_str().to_string(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TraderStatsView {
    pub total_trades: u32,
    pub completed_trades: u32,
    pub completion_rate: f64,
    pub average_rating: f64,
    pub rating_count: u32,
}

impl From<TraderStats> for TraderStatsView {
    fn from(s: TraderStats) -> Self {
        Self {
            total_trades: s.total_trades,
            completed_trades: s.completed_trades,
            completion_rate: s.completion_rate,
            average_rating: s.average_rating,
            rating_count: s.rating_count,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AdListingView {
    #[serde(flatten)]
    pub ad: AdView,
    pub poster: TraderStatsView,
}

impl From<AdListing> for AdListingView {
    fn from(listing: AdListing) -> Self {
        Self {
            ad: listing.ad.into(),
            poster: listing.poster_stats.into(),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TradeView {
    pub id: String,
    pub ad_id: uuid::Uuid,
    pub buyer: UserId,
    pub seller: UserId,
    pub amount: String,
    pub total_price: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<Trade> for TradeView {
    fn from(t: Trade) -> Self {
        Self {
            id: t.id.to_string(),
            ad_id: t.ad_id,
            buyer: t.buyer,
            seller: t.seller,
            amount: format_coin(t.amount),
            total_price: t.total_price.to_string(),
            status: t.status.as_str().to_string(),
            created_at: t.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MiningStatusData {
    pub eligible: bool,
    pub remaining_secs: i64,
    pub next_eligible_at: Option<DateTime<Utc>>,
    /// Advisory figure for display.
    pub global_supply_remaining: String,
}

impl MiningStatusData {
    pub fn from_view(view: MiningStatusView, supply: CoinAmount) -> Self {
        Self {
            eligible: view.eligible,
            remaining_secs: view.remaining_secs,
            next_eligible_at: view.next_eligible_at,
            global_supply_remaining: format_coin(supply),
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClaimData {
    pub amount: String,
    pub next_eligible_at: DateTime<Utc>,
}

impl From<ClaimOutcome> for ClaimData {
    fn from(o: ClaimOutcome) -> Self {
        Self {
            amount: format_coin(o.amount),
            next_eligible_at: o.next_eligible_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EligibilityData {
    pub eligible: bool,
    pub completed_trades: u32,
    pub required_trades: u32,
}

impl From<Eligibility> for EligibilityData {
    fn from(e: Eligibility) -> Self {
        Self {
            eligible: e.eligible,
            completed_trades: e.completed_trades,
            required_trades: e.required_trades,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TransferReceiptData {
    pub transfer_id: String,
    pub sender: UserId,
    pub recipient: UserId,
    pub amount: String,
    pub created_at: DateTime<Utc>,
}

impl From<TransferReceipt> for TransferReceiptData {
    fn from(r: TransferReceipt) -> Self {
        Self {
            transfer_id: r.id.to_string(),
            sender: r.sender,
            recipient: r.recipient,
            amount: format_coin(r.amount),
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RatesData {
    /// Currency code → USD-based rate.
    pub rates: BTreeMap<String, String>,
    pub provenance: String,
    pub cached: bool,
    pub fetched_at: DateTime<Utc>,
}

impl From<RateSnapshot> for RatesData {
    fn from(s: RateSnapshot) -> Self {
        Self {
            rates: s
                .rates
                .iter()
                .map(|(c, r)| (c.as_str().to_string(), r.to_string()))
                .collect(),
            provenance: s.provenance.as_str().to_string(),
            cached: s.cached,
            fetched_at: s.fetched_at,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CountryRateData {
    pub country: String,
    pub currency: String,
    pub price: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BalancePartitionData {
    pub available: String,
    pub locked: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BalancesData {
    pub general: BalancePartitionData,
    pub escrow: BalancePartitionData,
}

impl From<BalanceOverview> for BalancesData {
    fn from(o: BalanceOverview) -> Self {
        Self {
            general: BalancePartitionData {
                available: format_coin(o.general.available),
                locked: format_coin(o.general.locked),
            },
            escrow: BalancePartitionData {
                available: format_coin(o.escrow.available),
                locked: format_coin(o.escrow.locked),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_error_mapping() {
        let e: ApiError = CoreError::validation("bad input").into();
        assert_eq!(e.status, StatusCode::BAD_REQUEST);
        assert_eq!(e.code, error_codes::VALIDATION);

        let e: ApiError = CoreError::conflict("try again").into();
        assert_eq!(e.status, StatusCode::CONFLICT);

        let e: ApiError = CoreError::Unexpected("secret detail".into()).into();
        assert_eq!(e.msg, "internal error");
    }
}
