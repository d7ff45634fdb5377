//! TonConnect UI bindings.
//!
//! Binds the `TON_CONNECT_UI.TonConnectUI` global loaded by the host page
//! and adapts it to the `Connector` trait. Subscriber closures are retained
//! for the connector's lifetime so the JS side can keep invoking them.

use gloo_console::warn;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use tg_api_types::{Account, Network, TransactionReceipt, TransactionRequest};
use tg_connector_client::{
    Connector, ConnectorConfig, ConnectorError, StatusEvent, StatusSubscriber,
};
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = TON_CONNECT_UI, js_name = TonConnectUI)]
    type TonConnectUi;

    #[wasm_bindgen(catch, constructor, js_namespace = TON_CONNECT_UI, js_class = "TonConnectUI")]
    fn new(options: &JsValue) -> Result<TonConnectUi, JsValue>;

    /// Registers a status listener; returns the unsubscribe function.
    #[wasm_bindgen(method, js_name = onStatusChange)]
    fn on_status_change(this: &TonConnectUi, callback: &js_sys::Function) -> JsValue;

    #[wasm_bindgen(catch, method, js_name = sendTransaction)]
    async fn send_transaction(this: &TonConnectUi, transaction: &JsValue)
    -> Result<JsValue, JsValue>;

    #[wasm_bindgen(method, getter)]
    fn account(this: &TonConnectUi) -> JsValue;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConnectorOptions<'a> {
    manifest_url: &'a str,
    button_root_id: &'a str,
}

#[derive(Deserialize)]
struct JsWallet {
    account: JsAccount,
}

#[derive(Deserialize)]
struct JsAccount {
    address: String,
    chain: String,
}

#[derive(Deserialize)]
struct JsReceipt {
    boc: String,
}

pub struct UiConnector {
    ui: TonConnectUi,
    subscriptions: RefCell<Vec<Closure<dyn FnMut(JsValue)>>>,
}

impl UiConnector {
    /// The underlying TonConnect UI object, for hosts that keep the raw
    /// handle around.
    pub fn js_handle(&self) -> JsValue {
        self.ui.clone().into()
    }
}

#[async_trait::async_trait(?Send)]
impl Connector for UiConnector {
    fn construct(config: &ConnectorConfig) -> Result<Self, ConnectorError> {
        let options = serde_wasm_bindgen::to_value(&ConnectorOptions {
            manifest_url: &config.manifest_url,
            button_root_id: &config.ui_anchor_id,
        })
        .map_err(|err| ConnectorError::Construction(err.to_string()))?;

        let ui = TonConnectUi::new(&options)
            .map_err(|err| ConnectorError::Construction(js_error_message(&err)))?;
        Ok(Self {
            ui,
            subscriptions: RefCell::new(Vec::new()),
        })
    }

    fn account(&self) -> Option<Account> {
        match serde_wasm_bindgen::from_value::<Option<JsAccount>>(self.ui.account()) {
            Ok(account) => account.map(Account::from),
            Err(err) => {
                warn!("unreadable connector account:", err.to_string());
                None
            }
        }
    }

    fn on_status_change(&self, subscriber: StatusSubscriber) -> Result<(), ConnectorError> {
        let callback = Closure::wrap(Box::new(move |wallet: JsValue| {
            subscriber(status_event(wallet));
        }) as Box<dyn FnMut(JsValue)>);
        self.ui.on_status_change(callback.as_ref().unchecked_ref());
        self.subscriptions.borrow_mut().push(callback);
        Ok(())
    }

    async fn send_transaction(
        &self,
        request: &TransactionRequest,
    ) -> Result<TransactionReceipt, ConnectorError> {
        let transaction = serde_wasm_bindgen::to_value(request)
            .map_err(|err| ConnectorError::Transaction(err.to_string()))?;
        let result = self
            .ui
            .send_transaction(&transaction)
            .await
            .map_err(|err| ConnectorError::Transaction(js_error_message(&err)))?;
        let receipt: JsReceipt = serde_wasm_bindgen::from_value(result)
            .map_err(|err| ConnectorError::Transaction(err.to_string()))?;
        Ok(TransactionReceipt { boc: receipt.boc })
    }
}

impl From<JsAccount> for Account {
    fn from(account: JsAccount) -> Self {
        Account {
            address: account.address,
            // Unknown chain ids read as mainnet; nothing downstream keys
            // off the account network.
            network: Network::from_chain_id(&account.chain).unwrap_or(Network::Mainnet),
        }
    }
}

fn status_event(wallet: JsValue) -> StatusEvent {
    match serde_wasm_bindgen::from_value::<Option<JsWallet>>(wallet) {
        Ok(wallet) => StatusEvent {
            account: wallet.map(|wallet| Account::from(wallet.account)),
        },
        Err(err) => {
            warn!("malformed wallet status payload:", err.to_string());
            // An empty address is the malformed-event marker; the session
            // resolves it to the error signal instead of crashing dispatch.
            StatusEvent {
                account: Some(Account {
                    address: String::new(),
                    network: Network::Mainnet,
                }),
            }
        }
    }
}

fn js_error_message(value: &JsValue) -> String {
    value
        .dyn_ref::<js_sys::Error>()
        .map(|err| String::from(err.message()))
        .unwrap_or_else(|| format!("{value:?}"))
}
