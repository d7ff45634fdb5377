use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tg_api_types::Network;
use tg_connector_client::{BalanceSource, FALLBACK_BALANCE_NANO, default_api_url};
use tracing::warn;

/// HTTP balance source backed by the tonapi REST API.
///
/// Reads `TONAPI_URL` from environment at construction time (default: the
/// public endpoint for the requested network).
pub struct TonapiBalanceSource {
    endpoint: String,
    http: reqwest::Client,
}

impl TonapiBalanceSource {
    pub fn new(network: Network, endpoint: Option<String>) -> Self {
        let endpoint = endpoint
            .or_else(|| std::env::var("TONAPI_URL").ok())
            .unwrap_or_else(|| default_api_url(network).to_string());
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    async fn fetch_balance(&self, address: &str) -> Result<u64> {
        let url = format!("{}/accounts/{}", self.endpoint, address);

        let response = self
            .http
            .get(&url)
            .send()
            .await
            .context("tonapi account transport")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("tonapi account HTTP {status}: {text}");
        }

        let body: AccountResponse = response.json().await.context("tonapi account parse")?;
        Ok(body.balance)
    }
}

// ── tonapi REST API types ────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct AccountResponse {
    balance: u64,
}

#[async_trait(?Send)]
impl BalanceSource for TonapiBalanceSource {
    async fn balance_nano(&self, address: &str) -> Result<u64> {
        match self.fetch_balance(address).await {
            Ok(balance) => Ok(balance),
            Err(err) => {
                warn!("tonapi balance lookup failed, using fallback: {err:#}");
                Ok(FALLBACK_BALANCE_NANO)
            }
        }
    }
}
