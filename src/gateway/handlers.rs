//! HTTP handlers for the outward interface
//!
//! Handlers parse and convert at the boundary, then delegate to the
//! services; every shared-state invariant is re-checked by the ledger
//! store regardless of what these pre-flight conversions saw.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use rust_decimal::Decimal;

use crate::ads::types::{AdFilters, AdSpec, Direction};
use crate::core_types::TradeId;
use crate::error::CoreError;
use crate::money::{self, CoinAmount};
use crate::rates::CountryCode;

use super::auth::AuthUser;
use super::state::AppState;
use super::types::{
    AdListingView, AdView, ApiError, ApiResponse, ApiResult, BalancesData, ClaimData,
    CountryRateData, EligibilityData, InitiateTradeRequest, ListAdsQuery, MiningStatusData,
    PostAdRequest, RatesData, RecordRateRequest, TradeView, TransferApiRequest,
    TransferReceiptData, ok,
};

fn parse_coin(field: &str, value: &str) -> Result<CoinAmount, ApiError> {
    money::parse_coin(value).map_err(|e| ApiError::bad_request(format!("{field}: {e}")))
}

fn parse_price(value: &str) -> Result<Decimal, ApiError> {
    value
        .trim()
        .parse::<Decimal>()
        .map_err(|_| ApiError::bad_request(format!("invalid price: {value}")))
}

fn parse_direction(value: &str) -> Result<Direction, ApiError> {
    Direction::parse(value)
        .ok_or_else(|| ApiError::bad_request(format!("direction must be buy or sell, got {value}")))
}

fn parse_country(value: Option<&str>) -> Result<CountryCode, ApiError> {
    match value {
        None => Ok(CountryCode::KE),
        Some(raw) => raw
            .parse()
            .map_err(|_| ApiError::bad_request(format!("unsupported country: {raw}"))),
    }
}

/// Liveness probe.
#[utoipa::path(get, path = "/health", responses((status = 200)), tag = "Health")]
pub async fn health() -> ApiResult<&'static str> {
    ok("up")
}

/// Post a new advertisement.
#[utoipa::path(
    post,
    path = "/api/v1/p2p/ads",
    request_body = PostAdRequest,
    responses(
        (status = 200, description = "Ad created", body = ApiResponse<AdView>),
        (status = 400, description = "A posting constraint was violated"),
        (status = 401, description = "Not authenticated")
    ),
    tag = "Ads"
)]
pub async fn post_ad(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<PostAdRequest>,
) -> ApiResult<AdView> {
    let spec = AdSpec {
        direction: parse_direction(&req.direction)?,
        country: parse_country(req.country.as_deref())?,
        total_amount: parse_coin("total_amount", &req.total_amount)?,
        min_amount: parse_coin("min_amount", &req.min_amount)?,
        max_amount: parse_coin("max_amount", &req.max_amount)?,
        unit_price: parse_price(&req.unit_price)?,
        methods: req.methods,
        terms: req.terms,
    };
    let ad = state.ads.post_ad(user, spec).await?;
    ok(ad.into())
}

/// List active ads for a direction.
#[utoipa::path(
    get,
    path = "/api/v1/p2p/ads",
    params(
        ("direction" = String, Query, description = "buy or sell"),
        ("methods" = Option<String>, Query, description = "comma-separated settlement method codes"),
        ("price_min" = Option<String>, Query, description = "lower unit-price bound"),
        ("price_max" = Option<String>, Query, description = "upper unit-price bound"),
        ("min_amount" = Option<String>, Query, description = "minimum tradeable amount")
    ),
    responses((status = 200, body = ApiResponse<Vec<AdListingView>>)),
    tag = "Ads"
)]
pub async fn list_ads(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListAdsQuery>,
) -> ApiResult<Vec<AdListingView>> {
    let direction = parse_direction(&query.direction)?;
    let filters = AdFilters {
        methods: query.methods.map(|raw| {
            raw.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        }),
        price_min: query.price_min,
        price_max: query.price_max,
        min_tradeable: query
            .min_amount
            .as_deref()
            .map(|v| parse_coin("min_amount", v))
            .transpose()?,
    };

    let listings = state.ads.list_active(direction, &filters).await?;
    ok(listings.into_iter().map(Into::into).collect())
}

/// The caller's own ads, any status.
#[utoipa::path(
    get,
    path = "/api/v1/p2p/my-ads",
    responses((status = 200, body = ApiResponse<Vec<AdView>>), (status = 401)),
    tag = "Ads"
)]
pub async fn my_ads(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Vec<AdView>> {
    let ads = state.ads.list_mine(user).await?;
    ok(ads.into_iter().map(Into::into).collect())
}

/// Cancel one of the caller's active ads.
#[utoipa::path(
    post,
    path = "/api/v1/p2p/ads/{ad_id}/cancel",
    params(("ad_id" = uuid::Uuid, Path, description = "Advertisement id")),
    responses((status = 200), (status = 400), (status = 401)),
    tag = "Ads"
)]
pub async fn cancel_ad(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(ad_id): Path<uuid::Uuid>,
) -> ApiResult<()> {
    state.ads.cancel(user, ad_id).await?;
    ok(())
}

/// Initiate a trade against an ad.
#[utoipa::path(
    post,
    path = "/api/v1/p2p/trades",
    request_body = InitiateTradeRequest,
    responses(
        (status = 200, description = "Trade created in pending", body = ApiResponse<TradeView>),
        (status = 400, description = "A trade constraint was violated"),
        (status = 401, description = "Not authenticated"),
        (status = 409, description = "Remaining amount changed at commit; try again")
    ),
    tag = "Trades"
)]
pub async fn initiate_trade(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<InitiateTradeRequest>,
) -> ApiResult<TradeView> {
    let amount = req
        .amount
        .as_deref()
        .map(|v| parse_coin("amount", v))
        .transpose()?;
    let trade = state.trades.initiate(req.ad_id, user, amount).await?;
    ok(trade.into())
}

/// One trade by id. Only its participants can see it; anyone else gets
/// the same answer as for a missing trade.
#[utoipa::path(
    get,
    path = "/api/v1/p2p/trades/{trade_id}",
    params(("trade_id" = String, Path, description = "Trade id (ULID)")),
    responses((status = 200, body = ApiResponse<TradeView>), (status = 400), (status = 401)),
    tag = "Trades"
)]
pub async fn get_trade(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(raw_id): Path<String>,
) -> ApiResult<TradeView> {
    let trade_id: TradeId = raw_id
        .parse()
        .map_err(|_| ApiError::bad_request(format!("invalid trade id: {raw_id}")))?;
    let trade = state
        .store
        .get_trade(trade_id)
        .await
        .map_err(CoreError::from)?
        .filter(|t| t.buyer == user || t.seller == user)
        .ok_or_else(|| ApiError::bad_request(format!("trade {trade_id} not found")))?;
    ok(trade.into())
}

/// Trades where the caller is buyer or seller.
#[utoipa::path(
    get,
    path = "/api/v1/p2p/my-trades",
    responses((status = 200, body = ApiResponse<Vec<TradeView>>), (status = 401)),
    tag = "Trades"
)]
pub async fn my_trades(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<Vec<TradeView>> {
    let trades = state.store.list_trades_for_user(user).await.map_err(CoreError::from)?;
    ok(trades.into_iter().map(Into::into).collect())
}

/// Mining cooldown status with the advisory supply figure.
#[utoipa::path(
    get,
    path = "/api/v1/mining/status",
    responses((status = 200, body = ApiResponse<MiningStatusData>), (status = 401)),
    tag = "Mining"
)]
pub async fn mining_status(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<MiningStatusData> {
    let view = state.mining.check_status(user).await?;
    let supply = state
        .store
        .global_supply_remaining()
        .await
        .map_err(CoreError::from)?;
    ok(MiningStatusData::from_view(view, supply))
}

/// Claim the mining reward.
#[utoipa::path(
    post,
    path = "/api/v1/mining/claim",
    responses(
        (status = 200, description = "Reward credited", body = ApiResponse<ClaimData>),
        (status = 400, description = "Cooldown active, remaining seconds in message"),
        (status = 401)
    ),
    tag = "Mining"
)]
pub async fn mining_claim(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<ClaimData> {
    let outcome = state.mining.claim(user).await?;
    ok(outcome.into())
}

/// Transfer eligibility with progress numbers.
#[utoipa::path(
    get,
    path = "/api/v1/transfer/eligibility",
    responses((status = 200, body = ApiResponse<EligibilityData>), (status = 401)),
    tag = "Transfer"
)]
pub async fn transfer_eligibility(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<EligibilityData> {
    let eligibility = state.transfers.check_eligibility(user).await?;
    ok(eligibility.into())
}

/// Transfer balance to another user by handle.
#[utoipa::path(
    post,
    path = "/api/v1/transfer",
    request_body = TransferApiRequest,
    responses(
        (status = 200, description = "Transfer applied", body = ApiResponse<TransferReceiptData>),
        (status = 400, description = "A transfer constraint was violated"),
        (status = 401)
    ),
    tag = "Transfer"
)]
pub async fn create_transfer(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Json(req): Json<TransferApiRequest>,
) -> ApiResult<TransferReceiptData> {
    let amount = parse_coin("amount", &req.amount)?;
    let receipt = state
        .transfers
        .transfer(user, &req.recipient, amount, req.token.as_deref())
        .await?;
    ok(receipt.into())
}

/// Current multi-currency rate snapshot. Always answers; the provenance
/// tag says whether the numbers are live, cached or fallback.
#[utoipa::path(
    get,
    path = "/api/v1/rates",
    responses((status = 200, body = ApiResponse<RatesData>)),
    tag = "Rates"
)]
pub async fn get_rates(State(state): State<Arc<AppState>>) -> ApiResult<RatesData> {
    let snapshot = state.resolver.resolve().await;
    ok(snapshot.into())
}

/// Current coin price for one country.
#[utoipa::path(
    get,
    path = "/api/v1/rates/{country}",
    params(("country" = String, Path, description = "ISO country code")),
    responses((status = 200, body = ApiResponse<CountryRateData>), (status = 400)),
    tag = "Rates"
)]
pub async fn get_country_rate(
    State(state): State<Arc<AppState>>,
    Path(country): Path<String>,
) -> ApiResult<CountryRateData> {
    let country = parse_country(Some(&country))?;
    let price = state.country_rates.price(country).await;
    ok(CountryRateData {
        country: country.as_str().to_string(),
        currency: country.currency().as_str().to_string(),
        price: price.to_string(),
    })
}

/// Record a new coin price for a country; the country cache entry is
/// invalidated immediately.
#[utoipa::path(
    post,
    path = "/api/v1/rates/{country}",
    params(("country" = String, Path, description = "ISO country code")),
    request_body = RecordRateRequest,
    responses((status = 200, body = ApiResponse<CountryRateData>), (status = 400), (status = 401)),
    tag = "Rates"
)]
pub async fn record_country_rate(
    State(state): State<Arc<AppState>>,
    AuthUser(_user): AuthUser,
    Path(country): Path<String>,
    Json(req): Json<RecordRateRequest>,
) -> ApiResult<CountryRateData> {
    let country = parse_country(Some(&country))?;
    let price = parse_price(&req.price)?;
    state.country_rates.record(country, price).await?;
    ok(CountryRateData {
        country: country.as_str().to_string(),
        currency: country.currency().as_str().to_string(),
        price: price.to_string(),
    })
}

/// The caller's balances across contexts. Display data for polling;
/// never consulted to gate a mutation.
#[utoipa::path(
    get,
    path = "/api/v1/balances",
    responses((status = 200, body = ApiResponse<BalancesData>), (status = 401)),
    tag = "Balances"
)]
pub async fn get_balances(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> ApiResult<BalancesData> {
    let overview = state
        .store
        .balance_overview(user)
        .await
        .map_err(CoreError::from)?;
    ok(overview.into())
}
