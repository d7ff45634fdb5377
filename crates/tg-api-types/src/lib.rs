use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Network {
    Mainnet,
    Testnet,
}

impl Network {
    pub fn is_testnet(&self) -> bool {
        matches!(self, Network::Testnet)
    }

    // TonConnect chain identifiers: "-239" mainnet, "-3" testnet.
    pub fn from_chain_id(chain_id: &str) -> Option<Network> {
        match chain_id {
            "-239" => Some(Network::Mainnet),
            "-3" => Some(Network::Testnet),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Account {
    pub address: String,
    pub network: Network,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WalletStatus {
    Connected { address: String, balance_nano: u64 },
    Disconnected { reason: String },
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferMessage {
    pub address: String,
    pub amount: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRequest {
    pub valid_until: u64,
    pub messages: Vec<TransferMessage>,
}

impl TransactionRequest {
    pub fn single_transfer(to: String, amount_nano: u64, valid_until: u64) -> Self {
        TransactionRequest {
            valid_until,
            messages: vec![TransferMessage {
                address: to,
                amount: amount_nano.to_string(),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub boc: String,
}
