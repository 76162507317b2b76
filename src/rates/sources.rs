//! Rate sources
//!
//! A source is one attempt in the resolver's ordered fallback chain. The
//! HTTP sources are best-effort: any transport failure, non-2xx status or
//! malformed body is a soft failure that moves the chain along. The
//! static source terminates the chain and cannot fail.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use super::currency::CurrencyCode;

/// Where a resolved snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Primary,
    Backup,
    Fallback,
}

impl Provenance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provenance::Primary => "primary",
            Provenance::Backup => "backup",
            Provenance::Fallback => "fallback",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Soft failures; absorbed by the resolver, never surfaced to callers.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected status: {0}")]
    Status(u16),

    #[error("malformed body: {0}")]
    Malformed(String),
}

/// One attempt in the fallback chain.
#[async_trait]
pub trait RateSource: Send + Sync {
    fn name(&self) -> &str;
    fn provenance(&self) -> Provenance;
    async fn fetch(&self) -> Result<HashMap<CurrencyCode, Decimal>, SourceError>;
}

/// Expected body shape of both upstream APIs: `{"rates": {"KES": 135.5, ...}}`.
#[derive(Debug, Deserialize)]
struct RatesBody {
    rates: HashMap<String, Decimal>,
}

/// HTTP GET source returning USD-based rates.
pub struct HttpRateSource {
    name: String,
    url: String,
    provenance: Provenance,
    client: reqwest::Client,
}

impl HttpRateSource {
    pub fn new(
        name: impl Into<String>,
        url: impl Into<String>,
        provenance: Provenance,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client");
        Self {
            name: name.into(),
            url: url.into(),
            provenance,
            client,
        }
    }
}

#[async_trait]
impl RateSource for HttpRateSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn provenance(&self) -> Provenance {
        self.provenance
    }

    async fn fetch(&self) -> Result<HashMap<CurrencyCode, Decimal>, SourceError> {
        let response = self.client.get(&self.url).send().await?;
        if !response.status().is_success() {
            return Err(SourceError::Status(response.status().as_u16()));
        }

        let body: RatesBody = response
            .json()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()))?;

        // Unknown codes in the body are ignored; known codes the body
        // omits are filled in later by the resolver's static defaults.
        let mut rates = HashMap::new();
        for (code, rate) in body.rates {
            if let Ok(currency) = code.parse::<CurrencyCode>() {
                rates.insert(currency, rate);
            }
        }
        Ok(rates)
    }
}

/// Terminal source: the static table. Always succeeds.
pub struct StaticRateSource;

#[async_trait]
impl RateSource for StaticRateSource {
    fn name(&self) -> &str {
        "static"
    }

    fn provenance(&self) -> Provenance {
        Provenance::Fallback
    }

    async fn fetch(&self) -> Result<HashMap<CurrencyCode, Decimal>, SourceError> {
        Ok(CurrencyCode::ALL
            .iter()
            .map(|&c| (c, c.static_rate()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_source_covers_every_currency() {
        let rates = StaticRateSource.fetch().await.unwrap();
        for c in CurrencyCode::ALL {
            assert!(rates.contains_key(&c));
        }
    }

    #[test]
    fn test_rates_body_parses_numbers() {
        let body: RatesBody =
            serde_json::from_str(r#"{"rates": {"KES": 129.75, "UGX": 3710, "EUR": 0.92}}"#)
                .unwrap();
        assert_eq!(body.rates.len(), 3);
    }
}
