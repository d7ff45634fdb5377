use futures::StreamExt;
use futures::channel::mpsc::UnboundedReceiver;
use std::rc::Rc;
use tg_api_types::WalletStatus;
use tg_connector_client::{BalanceSource, StatusEvent};
use tracing::warn;

/// Address reported through `on_connect` when status handling fails, paired
/// with [`ERROR_BALANCE`]. Hosts must treat this address as the error signal
/// rather than a connected wallet.
pub const ERROR_ADDRESS: &str = "Error";
pub const ERROR_BALANCE: &str = "0";

/// Reason passed to `on_disconnect` when the wallet reports no account.
pub const DISCONNECTED_REASON: &str = "Not connected";

pub struct SessionCallbacks {
    on_connect: Box<dyn Fn(&str, &str)>,
    on_disconnect: Box<dyn Fn(&str)>,
}

impl SessionCallbacks {
    pub fn new(
        on_connect: impl Fn(&str, &str) + 'static,
        on_disconnect: impl Fn(&str) + 'static,
    ) -> Self {
        Self {
            on_connect: Box::new(on_connect),
            on_disconnect: Box::new(on_disconnect),
        }
    }

    pub(crate) fn signal_error(&self) {
        (self.on_connect)(ERROR_ADDRESS, ERROR_BALANCE);
    }
}

/// Consumes status events one at a time: each event is fully resolved
/// (including its balance lookup) and dispatched before the next one is
/// taken, so a slow lookup delays later events instead of racing them.
pub struct StatusWorker<B> {
    events: UnboundedReceiver<StatusEvent>,
    balance: Rc<B>,
    callbacks: SessionCallbacks,
}

impl<B: BalanceSource> StatusWorker<B> {
    pub(crate) fn new(
        events: UnboundedReceiver<StatusEvent>,
        balance: Rc<B>,
        callbacks: SessionCallbacks,
    ) -> Self {
        Self {
            events,
            balance,
            callbacks,
        }
    }

    /// Runs until every subscription handle feeding the channel is dropped.
    pub async fn run(mut self) {
        while let Some(event) = self.events.next().await {
            let status = resolve_status(&*self.balance, event).await;
            dispatch(&status, &self.callbacks);
        }
    }
}

async fn resolve_status<B: BalanceSource>(balance: &B, event: StatusEvent) -> WalletStatus {
    let Some(account) = event.account else {
        return WalletStatus::Disconnected {
            reason: DISCONNECTED_REASON.to_owned(),
        };
    };

    if account.address.is_empty() {
        return WalletStatus::Error {
            message: "status event carried an empty address".to_owned(),
        };
    }

    match balance.balance_nano(&account.address).await {
        Ok(balance_nano) => WalletStatus::Connected {
            address: account.address,
            balance_nano,
        },
        Err(err) => {
            warn!(
                "balance resolution failed for {}: {err:#}",
                account.address
            );
            WalletStatus::Error {
                message: err.to_string(),
            }
        }
    }
}

// Callback dispatch is the only place the error signal is stringly encoded.
fn dispatch(status: &WalletStatus, callbacks: &SessionCallbacks) {
    match status {
        WalletStatus::Connected {
            address,
            balance_nano,
        } => (callbacks.on_connect)(address, &balance_nano.to_string()),
        WalletStatus::Disconnected { reason } => (callbacks.on_disconnect)(reason),
        WalletStatus::Error { .. } => callbacks.signal_error(),
    }
}
