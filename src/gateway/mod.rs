//! HTTP gateway
//!
//! Axum router over the outward interface: `postAd`, `listActive`,
//! `initiateTrade`, `checkMiningStatus`, `claimMiningReward`,
//! `checkTransferEligibility`, `transferBalance`, `getCurrentRates`,
//! plus the read-side views the polling UI consumes.

pub mod auth;
pub mod handlers;
pub mod openapi;
pub mod state;
pub mod types;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use state::AppState;

/// Build the full application router.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/p2p/ads", post(handlers::post_ad).get(handlers::list_ads))
        .route("/p2p/my-ads", get(handlers::my_ads))
        .route("/p2p/ads/{ad_id}/cancel", post(handlers::cancel_ad))
        .route("/p2p/trades", post(handlers::initiate_trade))
        .route("/p2p/trades/{trade_id}", get(handlers::get_trade))
        .route("/p2p/my-trades", get(handlers::my_trades))
        .route("/mining/status", get(handlers::mining_status))
        .route("/mining/claim", post(handlers::mining_claim))
        .route("/transfer/eligibility", get(handlers::transfer_eligibility))
        .route("/transfer", post(handlers::create_transfer))
        .route("/rates", get(handlers::get_rates))
        .route(
            "/rates/{country}",
            get(handlers::get_country_rate).post(handlers::record_country_rate),
        )
        .route("/balances", get(handlers::get_balances));

    Router::new()
        .route("/health", get(handlers::health))
        .nest("/api/v1", api)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Serve the gateway until the process is stopped.
pub async fn run_server(host: &str, port: u16, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}
