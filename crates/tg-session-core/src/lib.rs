use futures::channel::mpsc;
use std::cell::RefCell;
use std::rc::Rc;
use tg_api_types::{Network, TransactionReceipt, TransactionRequest};
use tg_connector_client::address::{self, AddressError};
use tg_connector_client::{
    BalanceSource, Connector, ConnectorConfig, ConnectorError, StatusSubscriber,
};
use thiserror::Error;

mod status;

pub use status::{
    DISCONNECTED_REASON, ERROR_ADDRESS, ERROR_BALANCE, SessionCallbacks, StatusWorker,
};

/// Transactions are valid for this long after submission.
pub const TX_VALIDITY_WINDOW_SECS: u64 = 360;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub manifest_url: String,
    pub ui_anchor_id: String,
    pub network: Network,
}

#[derive(Debug, Error)]
pub enum InitError {
    #[error("connector construction failed: {0}")]
    Construction(ConnectorError),
    #[error("status subscription failed: {0}")]
    Subscription(ConnectorError),
}

#[derive(Debug, Error)]
pub enum PayError {
    #[error("wallet connector is not initialized")]
    NotInitialized,
    #[error("no account connected")]
    NoAccountConnected,
    #[error("invalid recipient address: {0}")]
    Address(#[from] AddressError),
    #[error("transaction submission failed: {0}")]
    Submission(#[from] ConnectorError),
}

/// One wallet session: owns at most one connector, constructed lazily on the
/// first `initialize` and reused by every later call. Configuration is fixed
/// at session construction, so it cannot drift between calls.
pub struct WalletSession<C, B> {
    config: SessionConfig,
    balance: Rc<B>,
    connector: RefCell<Option<Rc<C>>>,
}

impl<C, B> WalletSession<C, B>
where
    C: Connector,
    B: BalanceSource,
{
    pub fn new(config: SessionConfig, balance: B) -> Self {
        Self {
            config,
            balance: Rc::new(balance),
            connector: RefCell::new(None),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn connector(&self) -> Option<Rc<C>> {
        self.connector.borrow().clone()
    }

    /// Get-or-create the connector and subscribe to its status changes.
    ///
    /// Returns the shared connector handle and the worker that turns raw
    /// status events into `on_connect` / `on_disconnect` calls; the caller
    /// drives the worker (`spawn_local` in the browser, a direct await in
    /// tests). On failure the error signal `("Error", "0")` is delivered to
    /// `on_connect` once and the error is returned; `on_disconnect` is not
    /// involved on that path.
    pub fn initialize(
        &self,
        callbacks: SessionCallbacks,
    ) -> Result<(Rc<C>, StatusWorker<B>), InitError> {
        let existing = self.connector.borrow().clone();
        let connector = match existing {
            Some(connector) => connector,
            None => {
                let connector_config = ConnectorConfig {
                    manifest_url: self.config.manifest_url.clone(),
                    ui_anchor_id: self.config.ui_anchor_id.clone(),
                };
                match C::construct(&connector_config) {
                    Ok(connector) => {
                        let connector = Rc::new(connector);
                        *self.connector.borrow_mut() = Some(connector.clone());
                        connector
                    }
                    Err(err) => {
                        callbacks.signal_error();
                        return Err(InitError::Construction(err));
                    }
                }
            }
        };

        let (tx, rx) = mpsc::unbounded();
        let subscriber: StatusSubscriber = Box::new(move |event| {
            // A closed channel means the worker is gone; the event is dropped.
            let _ = tx.unbounded_send(event);
        });
        if let Err(err) = connector.on_status_change(subscriber) {
            callbacks.signal_error();
            return Err(InitError::Subscription(err));
        }

        Ok((
            connector,
            StatusWorker::new(rx, self.balance.clone(), callbacks),
        ))
    }

    /// Submit a single transfer of `amount_nano` nanotons to `recipient`
    /// (raw `workchain:hex` form, normalized here for the session network).
    ///
    /// Fails fast without touching the wallet when no connector exists or no
    /// account is connected. Wallet failures propagate unmodified; there is
    /// no retry.
    pub async fn pay(
        &self,
        recipient: &str,
        amount_nano: u64,
    ) -> Result<TransactionReceipt, PayError> {
        let connector = self
            .connector
            .borrow()
            .clone()
            .ok_or(PayError::NotInitialized)?;
        if connector.account().is_none() {
            return Err(PayError::NoAccountConnected);
        }

        let to = address::to_user_friendly(recipient, self.config.network.is_testnet())?;
        let request = TransactionRequest::single_transfer(
            to,
            amount_nano,
            unix_now_secs() + TX_VALIDITY_WINDOW_SECS,
        );
        Ok(connector.send_transaction(&request).await?)
    }
}

#[cfg(target_arch = "wasm32")]
fn unix_now_secs() -> u64 {
    (js_sys::Date::now() / 1000.0) as u64
}

#[cfg(not(target_arch = "wasm32"))]
fn unix_now_secs() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::cell::Cell;
    use tg_api_types::Account;
    use tg_connector_client::StatusEvent;

    const RAW: &str = "0:ed1691307050047117b998b561d8de82d31fbf84910ced6f915b4c2325f4ffa8";
    const OTHER_RAW: &str = "0:2cf3b5b8c891e517c9addbda1c0386a09ccacbd0e0e346f69a8bd4c7188a8334";

    thread_local! {
        static HUB: RefCell<Rc<Hub>> = RefCell::new(Rc::new(Hub::default()));
    }

    fn fresh_hub() -> Rc<Hub> {
        let hub = Rc::new(Hub::default());
        HUB.with(|current| *current.borrow_mut() = hub.clone());
        hub
    }

    #[derive(Default)]
    struct Hub {
        constructed: Cell<usize>,
        fail_construct: Cell<bool>,
        fail_subscribe: Cell<bool>,
        fail_send: Cell<bool>,
        account: RefCell<Option<Account>>,
        subscribers: RefCell<Vec<StatusSubscriber>>,
        sent: RefCell<Vec<TransactionRequest>>,
    }

    impl Hub {
        fn emit(&self, event: StatusEvent) {
            for subscriber in self.subscribers.borrow().iter() {
                subscriber(event.clone());
            }
        }

        fn drop_subscribers(&self) {
            self.subscribers.borrow_mut().clear();
        }

        fn connect_account(&self, address: &str) {
            *self.account.borrow_mut() = Some(Account {
                address: address.to_owned(),
                network: Network::Testnet,
            });
        }
    }

    struct MockConnector {
        hub: Rc<Hub>,
    }

    #[async_trait(?Send)]
    impl Connector for MockConnector {
        fn construct(_config: &ConnectorConfig) -> Result<Self, ConnectorError> {
            let hub = HUB.with(|current| current.borrow().clone());
            hub.constructed.set(hub.constructed.get() + 1);
            if hub.fail_construct.get() {
                return Err(ConnectorError::Construction(
                    "manifest unreachable".to_owned(),
                ));
            }
            Ok(MockConnector { hub })
        }

        fn account(&self) -> Option<Account> {
            self.hub.account.borrow().clone()
        }

        fn on_status_change(&self, subscriber: StatusSubscriber) -> Result<(), ConnectorError> {
            if self.hub.fail_subscribe.get() {
                return Err(ConnectorError::Subscription("listener rejected".to_owned()));
            }
            self.hub.subscribers.borrow_mut().push(subscriber);
            Ok(())
        }

        async fn send_transaction(
            &self,
            request: &TransactionRequest,
        ) -> Result<TransactionReceipt, ConnectorError> {
            if self.hub.fail_send.get() {
                return Err(ConnectorError::Transaction("user rejected".to_owned()));
            }
            self.hub.sent.borrow_mut().push(request.clone());
            Ok(TransactionReceipt {
                boc: "te6ccMock".to_owned(),
            })
        }
    }

    struct MockBalance {
        by_address: Vec<(String, u64)>,
        fixed: u64,
        fail: bool,
    }

    impl MockBalance {
        fn fixed(balance: u64) -> Self {
            Self {
                by_address: Vec::new(),
                fixed: balance,
                fail: false,
            }
        }

        fn failing() -> Self {
            Self {
                by_address: Vec::new(),
                fixed: 0,
                fail: true,
            }
        }

        fn mapped(pairs: &[(&str, u64)]) -> Self {
            Self {
                by_address: pairs
                    .iter()
                    .map(|(address, balance)| ((*address).to_owned(), *balance))
                    .collect(),
                fixed: 0,
                fail: false,
            }
        }
    }

    #[async_trait(?Send)]
    impl BalanceSource for MockBalance {
        async fn balance_nano(&self, address: &str) -> Result<u64> {
            if self.fail {
                anyhow::bail!("balance api down");
            }
            let mapped = self
                .by_address
                .iter()
                .find(|(candidate, _)| candidate == address)
                .map(|(_, balance)| *balance);
            Ok(mapped.unwrap_or(self.fixed))
        }
    }

    #[derive(Default)]
    struct Log {
        connects: RefCell<Vec<(String, String)>>,
        disconnects: RefCell<Vec<String>>,
    }

    fn recording(log: &Rc<Log>) -> SessionCallbacks {
        let connected = log.clone();
        let disconnected = log.clone();
        SessionCallbacks::new(
            move |address, balance| {
                connected
                    .connects
                    .borrow_mut()
                    .push((address.to_owned(), balance.to_owned()));
            },
            move |reason| disconnected.disconnects.borrow_mut().push(reason.to_owned()),
        )
    }

    fn config(network: Network) -> SessionConfig {
        SessionConfig {
            manifest_url: "https://example.com/tonconnect-manifest.json".to_owned(),
            ui_anchor_id: "ton-wallet-button".to_owned(),
            network,
        }
    }

    fn testnet_session(balance: MockBalance) -> WalletSession<MockConnector, MockBalance> {
        WalletSession::new(config(Network::Testnet), balance)
    }

    #[tokio::test]
    async fn connected_event_reaches_on_connect() -> Result<()> {
        let hub = fresh_hub();
        let log = Rc::new(Log::default());
        let session = testnet_session(MockBalance::fixed(25));

        let (_handle, worker) = session.initialize(recording(&log))?;
        hub.emit(StatusEvent {
            account: Some(Account {
                address: RAW.to_owned(),
                network: Network::Testnet,
            }),
        });
        hub.drop_subscribers();
        worker.run().await;

        assert_eq!(
            log.connects.borrow().as_slice(),
            [(RAW.to_owned(), "25".to_owned())]
        );
        assert!(log.disconnects.borrow().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn no_account_event_reaches_on_disconnect() -> Result<()> {
        let hub = fresh_hub();
        let log = Rc::new(Log::default());
        let session = testnet_session(MockBalance::fixed(25));

        let (_handle, worker) = session.initialize(recording(&log))?;
        hub.emit(StatusEvent { account: None });
        hub.drop_subscribers();
        worker.run().await;

        assert!(log.connects.borrow().is_empty());
        assert_eq!(
            log.disconnects.borrow().as_slice(),
            [DISCONNECTED_REASON.to_owned()]
        );
        Ok(())
    }

    #[tokio::test]
    async fn events_resolve_in_emission_order() -> Result<()> {
        let hub = fresh_hub();
        let log = Rc::new(Log::default());
        let session = testnet_session(MockBalance::mapped(&[(RAW, 7), (OTHER_RAW, 11)]));

        let (_handle, worker) = session.initialize(recording(&log))?;
        for address in [RAW, OTHER_RAW] {
            hub.emit(StatusEvent {
                account: Some(Account {
                    address: address.to_owned(),
                    network: Network::Testnet,
                }),
            });
        }
        hub.drop_subscribers();
        worker.run().await;

        assert_eq!(
            log.connects.borrow().as_slice(),
            [
                (RAW.to_owned(), "7".to_owned()),
                (OTHER_RAW.to_owned(), "11".to_owned()),
            ]
        );
        Ok(())
    }

    #[tokio::test]
    async fn balance_failure_signals_error() -> Result<()> {
        let hub = fresh_hub();
        let log = Rc::new(Log::default());
        let session = testnet_session(MockBalance::failing());

        let (_handle, worker) = session.initialize(recording(&log))?;
        hub.emit(StatusEvent {
            account: Some(Account {
                address: RAW.to_owned(),
                network: Network::Testnet,
            }),
        });
        hub.drop_subscribers();
        worker.run().await;

        assert_eq!(
            log.connects.borrow().as_slice(),
            [(ERROR_ADDRESS.to_owned(), ERROR_BALANCE.to_owned())]
        );
        assert!(log.disconnects.borrow().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn repeated_initialize_reuses_connector() -> Result<()> {
        let hub = fresh_hub();
        let log = Rc::new(Log::default());
        let session = testnet_session(MockBalance::fixed(25));

        let (first, _worker_a) = session.initialize(recording(&log))?;
        let (second, _worker_b) = session.initialize(recording(&log))?;

        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(hub.constructed.get(), 1);
        assert_eq!(hub.subscribers.borrow().len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn construction_failure_signals_error_once() -> Result<()> {
        let hub = fresh_hub();
        hub.fail_construct.set(true);
        let log = Rc::new(Log::default());
        let session = testnet_session(MockBalance::fixed(25));

        let result = session.initialize(recording(&log));
        assert!(matches!(result, Err(InitError::Construction(_))));
        assert_eq!(
            log.connects.borrow().as_slice(),
            [(ERROR_ADDRESS.to_owned(), ERROR_BALANCE.to_owned())]
        );
        assert!(log.disconnects.borrow().is_empty());
        assert!(session.connector().is_none());

        // Nothing was cached, so a later attempt starts over.
        hub.fail_construct.set(false);
        assert!(session.initialize(recording(&log)).is_ok());
        assert_eq!(hub.constructed.get(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn subscription_failure_signals_error() -> Result<()> {
        let hub = fresh_hub();
        hub.fail_subscribe.set(true);
        let log = Rc::new(Log::default());
        let session = testnet_session(MockBalance::fixed(25));

        let result = session.initialize(recording(&log));
        assert!(matches!(result, Err(InitError::Subscription(_))));
        assert_eq!(
            log.connects.borrow().as_slice(),
            [(ERROR_ADDRESS.to_owned(), ERROR_BALANCE.to_owned())]
        );
        // The constructed connector stays cached even though the
        // subscription failed, matching the connector lifecycle.
        assert!(session.connector().is_some());
        Ok(())
    }

    #[tokio::test]
    async fn pay_before_initialize_fails_fast() -> Result<()> {
        let hub = fresh_hub();
        let session = testnet_session(MockBalance::fixed(25));

        let result = session.pay(RAW, 100_000_000).await;
        assert!(matches!(result, Err(PayError::NotInitialized)));
        assert_eq!(hub.constructed.get(), 0);
        assert!(hub.sent.borrow().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn pay_without_connected_account_fails_fast() -> Result<()> {
        let hub = fresh_hub();
        let log = Rc::new(Log::default());
        let session = testnet_session(MockBalance::fixed(25));
        session.initialize(recording(&log))?;

        let result = session.pay(RAW, 100_000_000).await;
        assert!(matches!(result, Err(PayError::NoAccountConnected)));
        assert!(hub.sent.borrow().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn pay_builds_single_transfer_request() -> Result<()> {
        let hub = fresh_hub();
        let log = Rc::new(Log::default());
        let session = testnet_session(MockBalance::fixed(25));
        session.initialize(recording(&log))?;
        hub.connect_account(RAW);

        let before = unix_now_secs();
        let receipt = session.pay(OTHER_RAW, 100_000_000).await?;
        assert_eq!(receipt.boc, "te6ccMock");

        let sent = hub.sent.borrow();
        let request = &sent[0];
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].amount, "100000000");
        assert_eq!(
            request.messages[0].address,
            address::to_user_friendly(OTHER_RAW, true)?
        );
        assert!(request.messages[0].address.starts_with("0Q"));
        assert!(request.valid_until >= before + TX_VALIDITY_WINDOW_SECS);
        assert!(request.valid_until <= unix_now_secs() + TX_VALIDITY_WINDOW_SECS);
        Ok(())
    }

    #[tokio::test]
    async fn pay_propagates_wallet_rejection() -> Result<()> {
        let hub = fresh_hub();
        let log = Rc::new(Log::default());
        let session = testnet_session(MockBalance::fixed(25));
        session.initialize(recording(&log))?;
        hub.connect_account(RAW);
        hub.fail_send.set(true);

        let result = session.pay(OTHER_RAW, 100_000_000).await;
        assert!(matches!(
            result,
            Err(PayError::Submission(ConnectorError::Transaction(_)))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn pay_rejects_malformed_recipient() -> Result<()> {
        let hub = fresh_hub();
        let log = Rc::new(Log::default());
        let session = testnet_session(MockBalance::fixed(25));
        session.initialize(recording(&log))?;
        hub.connect_account(RAW);

        let result = session.pay("not-an-address", 1).await;
        assert!(matches!(result, Err(PayError::Address(_))));
        assert!(hub.sent.borrow().is_empty());
        Ok(())
    }
}
