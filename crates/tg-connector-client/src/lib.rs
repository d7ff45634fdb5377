use async_trait::async_trait;
use tg_api_types::{Account, Network, TransactionReceipt, TransactionRequest};
use thiserror::Error;

pub mod address;

#[derive(Debug, Clone)]
pub struct ConnectorConfig {
    pub manifest_url: String,
    pub ui_anchor_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEvent {
    pub account: Option<Account>,
}

pub type StatusSubscriber = Box<dyn Fn(StatusEvent)>;

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("connector construction failed: {0}")]
    Construction(String),
    #[error("status subscription failed: {0}")]
    Subscription(String),
    #[error("transaction not accepted by wallet: {0}")]
    Transaction(String),
}

// Browser connectors hold JS values, so futures here are not Send.
#[async_trait(?Send)]
pub trait Connector: Sized {
    fn construct(config: &ConnectorConfig) -> Result<Self, ConnectorError>;

    fn account(&self) -> Option<Account>;

    fn on_status_change(&self, subscriber: StatusSubscriber) -> Result<(), ConnectorError>;

    async fn send_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<TransactionReceipt, ConnectorError>;
}

pub const MAINNET_API_URL: &str = "https://tonapi.io/v2";
pub const TESTNET_API_URL: &str = "https://testnet.tonapi.io/v2";

/// Balance an implementation reports when the account API is unusable:
/// 1 TON, in nanotons. Sources degrade to this instead of erroring so a
/// flaky API never breaks the connect flow.
pub const FALLBACK_BALANCE_NANO: u64 = 1_000_000_000;

pub fn default_api_url(network: Network) -> &'static str {
    if network.is_testnet() {
        TESTNET_API_URL
    } else {
        MAINNET_API_URL
    }
}

#[async_trait(?Send)]
pub trait BalanceSource {
    async fn balance_nano(&self, address: &str) -> anyhow::Result<u64>;
}
