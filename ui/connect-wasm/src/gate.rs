//! DOM readiness gate.
//!
//! Waits for the wallet button anchor to exist before the connector is
//! constructed, since the TonConnect UI renders itself into that element.
//! `wait_for_anchor` waits forever; `wait_for_anchor_within` bounds the
//! wait with a timeout.

use futures::channel::oneshot;
use futures::future::{Either, select};
use futures::pin_mut;
use gloo_timers::future::TimeoutFuture;
use std::cell::RefCell;
use std::rc::Rc;
use thiserror::Error;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{Element, MutationObserver, MutationObserverInit};

#[derive(Debug, Error)]
pub enum GateError {
    #[error("no browser document available")]
    NoDocument,
    #[error("invalid selector `{0}`")]
    Selector(String),
    #[error("observer setup failed: {0}")]
    Observer(String),
    #[error("`{0}` did not appear within {1} ms")]
    Timeout(String, u32),
    #[error("interrupted before `{0}` appeared")]
    Interrupted(String),
}

/// Resolve once an element matching `selector` exists, immediately if it
/// already does. Never times out.
pub async fn wait_for_anchor(selector: &str) -> Result<Element, GateError> {
    observe(selector, None).await
}

/// Like [`wait_for_anchor`], but gives up after `timeout_ms`.
pub async fn wait_for_anchor_within(
    selector: &str,
    timeout_ms: u32,
) -> Result<Element, GateError> {
    observe(selector, Some(timeout_ms)).await
}

async fn observe(selector: &str, timeout_ms: Option<u32>) -> Result<Element, GateError> {
    let document = web_sys::window()
        .and_then(|window| window.document())
        .ok_or(GateError::NoDocument)?;

    if let Some(element) = document
        .query_selector(selector)
        .map_err(|_| GateError::Selector(selector.to_owned()))?
    {
        return Ok(element);
    }

    let (tx, rx) = oneshot::channel::<Element>();
    let tx = Rc::new(RefCell::new(Some(tx)));

    let callback = {
        let document = document.clone();
        let selector = selector.to_owned();
        let tx = tx.clone();
        Closure::wrap(Box::new(
            move |_records: js_sys::Array, observer: MutationObserver| {
                if let Ok(Some(element)) = document.query_selector(&selector) {
                    if let Some(tx) = tx.borrow_mut().take() {
                        observer.disconnect();
                        let _ = tx.send(element);
                    }
                }
            },
        ) as Box<dyn FnMut(js_sys::Array, MutationObserver)>)
    };

    let observer = MutationObserver::new(callback.as_ref().unchecked_ref())
        .map_err(|err| GateError::Observer(format!("{err:?}")))?;
    let body = document.body().ok_or(GateError::NoDocument)?;
    let init = MutationObserverInit::new();
    init.set_child_list(true);
    init.set_subtree(true);
    observer
        .observe_with_options(&body, &init)
        .map_err(|err| GateError::Observer(format!("{err:?}")))?;

    // The anchor may have been inserted between the probe above and
    // `observe`; mutations from before registration never fire the callback.
    if let Ok(Some(element)) = document.query_selector(selector) {
        if let Some(tx) = tx.borrow_mut().take() {
            observer.disconnect();
            let _ = tx.send(element);
        }
    }

    let outcome = match timeout_ms {
        None => rx
            .await
            .map_err(|_| GateError::Interrupted(selector.to_owned())),
        Some(ms) => {
            let timeout = TimeoutFuture::new(ms);
            pin_mut!(timeout);
            match select(rx, timeout).await {
                Either::Left((received, _)) => {
                    received.map_err(|_| GateError::Interrupted(selector.to_owned()))
                }
                Either::Right(((), _)) => Err(GateError::Timeout(selector.to_owned(), ms)),
            }
        }
    };

    if outcome.is_err() {
        observer.disconnect();
    }
    outcome
}
