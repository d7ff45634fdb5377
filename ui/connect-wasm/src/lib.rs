//! TonGate browser shell.
//!
//! Wires the DOM readiness gate, the TonConnect UI connector, and the
//! wallet session into the two functions the host page calls:
//! `initTonWallet` and `payTonWallet`. Network mode is fixed at build time.

pub mod balance;
pub mod connector;
pub mod gate;

use crate::balance::FetchBalanceSource;
use crate::connector::UiConnector;
use gloo_console::warn;
use std::cell::RefCell;
use std::rc::Rc;
use tg_api_types::Network;
use tg_session_core::{
    ERROR_ADDRESS, ERROR_BALANCE, SessionCallbacks, SessionConfig, WalletSession,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;

const NETWORK: Network = Network::Testnet;
const WALLET_ANCHOR_ID: &str = "ton-wallet-button";
const WALLET_ANCHOR_SELECTOR: &str = "#ton-wallet-button";

type ShellSession = WalletSession<UiConnector, FetchBalanceSource>;

thread_local! {
    static SESSION: RefCell<Option<Rc<ShellSession>>> = RefCell::new(None);
}

#[wasm_bindgen(start)]
pub fn start() {
    // Improve panic messages in the browser console
    console_error_panic_hook::set_once();
}

/// Initialize the wallet session once the anchor element exists.
///
/// Resolves with the TonConnect UI handle, or `null` after signalling
/// `onConnect("Error", "0")` when initialization fails. The first call's
/// manifest wins; later calls reuse the session's connector and register
/// another status subscription.
#[wasm_bindgen(js_name = initTonWallet)]
pub async fn init_ton_wallet(
    manifest_url: String,
    on_connect: js_sys::Function,
    on_disconnect: js_sys::Function,
) -> JsValue {
    match init_session(&manifest_url, &on_connect, on_disconnect).await {
        Ok(handle) => handle,
        Err(message) => {
            warn!("wallet init failed:", message);
            JsValue::NULL
        }
    }
}

async fn init_session(
    manifest_url: &str,
    on_connect: &js_sys::Function,
    on_disconnect: js_sys::Function,
) -> Result<JsValue, String> {
    if let Err(err) = gate::wait_for_anchor(WALLET_ANCHOR_SELECTOR).await {
        signal_error(on_connect);
        return Err(err.to_string());
    }

    let session = session_handle(manifest_url);
    let callbacks = {
        let on_connect = on_connect.clone();
        SessionCallbacks::new(
            move |address, balance| {
                let _ = on_connect.call2(
                    &JsValue::NULL,
                    &JsValue::from_str(address),
                    &JsValue::from_str(balance),
                );
            },
            move |reason| {
                let _ = on_disconnect.call1(&JsValue::NULL, &JsValue::from_str(reason));
            },
        )
    };

    // Initialization failures have already signalled through `on_connect`.
    let (handle, worker) = session
        .initialize(callbacks)
        .map_err(|err| err.to_string())?;
    spawn_local(worker.run());
    Ok(handle.js_handle())
}

/// Pay `amount` nanotons to `recipient` (raw `workchain:hex` form).
///
/// Rejects when the session is uninitialized, no account is connected, the
/// recipient is malformed, or the wallet declines the transaction.
#[wasm_bindgen(js_name = payTonWallet)]
pub async fn pay_ton_wallet(recipient: String, amount: u64) -> Result<JsValue, JsValue> {
    let session = SESSION
        .with(|slot| slot.borrow().clone())
        .ok_or_else(|| JsValue::from_str("wallet connector is not initialized"))?;
    let receipt = session
        .pay(&recipient, amount)
        .await
        .map_err(|err| JsValue::from_str(&err.to_string()))?;
    serde_wasm_bindgen::to_value(&receipt).map_err(|err| JsValue::from_str(&err.to_string()))
}

fn session_handle(manifest_url: &str) -> Rc<ShellSession> {
    SESSION.with(|slot| {
        let mut slot = slot.borrow_mut();
        match slot.as_ref() {
            Some(session) => session.clone(),
            None => {
                let session = Rc::new(WalletSession::new(
                    SessionConfig {
                        manifest_url: manifest_url.to_owned(),
                        ui_anchor_id: WALLET_ANCHOR_ID.to_owned(),
                        network: NETWORK,
                    },
                    FetchBalanceSource::new(NETWORK),
                ));
                *slot = Some(session.clone());
                session
            }
        }
    })
}

fn signal_error(on_connect: &js_sys::Function) {
    let _ = on_connect.call2(
        &JsValue::NULL,
        &JsValue::from_str(ERROR_ADDRESS),
        &JsValue::from_str(ERROR_BALANCE),
    );
}
