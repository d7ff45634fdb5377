//! Balance lookup over the tonapi REST API using the browser fetch stack.
//!
//! Same contract as the native reqwest source: any transport, status, or
//! parse failure degrades to the fixed fallback instead of erroring.

use async_trait::async_trait;
use gloo_console::warn;
use gloo_net::http::Request;
use serde::Deserialize;
use tg_api_types::Network;
use tg_connector_client::{BalanceSource, FALLBACK_BALANCE_NANO, default_api_url};

pub struct FetchBalanceSource {
    endpoint: String,
}

impl FetchBalanceSource {
    pub fn new(network: Network) -> Self {
        Self {
            endpoint: default_api_url(network).to_owned(),
        }
    }

    async fn fetch_balance(&self, address: &str) -> Result<u64, String> {
        let url = format!("{}/accounts/{}", self.endpoint, address);
        let response = Request::get(&url)
            .send()
            .await
            .map_err(|err| err.to_string())?;
        if !response.ok() {
            return Err(format!("HTTP {} {}", response.status(), response.status_text()));
        }
        let body: AccountResponse = response.json().await.map_err(|err| err.to_string())?;
        Ok(body.balance)
    }
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    balance: u64,
}

#[async_trait(?Send)]
impl BalanceSource for FetchBalanceSource {
    async fn balance_nano(&self, address: &str) -> anyhow::Result<u64> {
        match self.fetch_balance(address).await {
            Ok(balance) => Ok(balance),
            Err(message) => {
                warn!("tonapi balance lookup failed, using fallback:", message);
                Ok(FALLBACK_BALANCE_NANO)
            }
        }
    }
}
