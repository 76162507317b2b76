//! OpenAPI document for the gateway

use utoipa::OpenApi;

use super::handlers;
use super::types;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Sokoni P2P Marketplace API",
        description = "Peer-to-peer coin marketplace core: ads, trades, mining claims, balance transfers and exchange rates."
    ),
    paths(
        handlers::health,
        handlers::post_ad,
        handlers::list_ads,
        handlers::my_ads,
        handlers::cancel_ad,
        handlers::initiate_trade,
        handlers::get_trade,
        handlers::my_trades,
        handlers::mining_status,
        handlers::mining_claim,
        handlers::transfer_eligibility,
        handlers::create_transfer,
        handlers::get_rates,
        handlers::get_country_rate,
        handlers::record_country_rate,
        handlers::get_balances,
    ),
    components(schemas(
        types::PostAdRequest,
        types::InitiateTradeRequest,
        types::TransferApiRequest,
        types::RecordRateRequest,
        types::AdView,
        types::AdListingView,
        types::TraderStatsView,
        types::TradeView,
        types::MiningStatusData,
        types::ClaimData,
        types::EligibilityData,
        types::TransferReceiptData,
        types::RatesData,
        types::CountryRateData,
        types::BalancesData,
    )),
    tags(
        (name = "Ads", description = "Advertisement inventory"),
        (name = "Trades", description = "Trade initiation"),
        (name = "Mining", description = "Cooldown-gated reward claims"),
        (name = "Transfer", description = "Eligibility-gated balance transfers"),
        (name = "Rates", description = "Exchange rate resolution"),
        (name = "Balances", description = "Read-side balance views"),
        (name = "Health", description = "Probes"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_document_builds() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/api/v1/p2p/ads"));
        assert!(doc.paths.paths.contains_key("/api/v1/mining/claim"));
    }
}
