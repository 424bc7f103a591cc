use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use tokio::sync::mpsc;

use super::message::Message;

/// Stream of decoded messages from the Blue Current websocket.
///
/// An `Err` item, or the stream ending, means the transport failed.
pub type Inbox = mpsc::UnboundedReceiver<Result<Message, ClientError>>;
pub type InboxSender = mpsc::UnboundedSender<Result<Message, ClientError>>;

/// Failures reported by the Blue Current client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
    #[error("Invalid API token")]
    InvalidApiToken,

    #[error("Request limit reached")]
    RequestLimitReached,

    #[error("Already connected")]
    AlreadyConnected,

    #[error("No charge cards found")]
    NoCardsFound,

    #[error("Websocket error: {0}")]
    Websocket(String),

    #[error("Connection closed")]
    ConnectionClosed,
}

/// A charge card linked to the account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargeCard {
    pub name: String,
    pub uid: String,
}

/// Trait for Blue Current client operations
///
/// The websocket protocol itself lives behind this trait; requests only send, and their
/// answers arrive later on the [`Inbox`] returned by `connect`.
#[async_trait]
pub trait BlueCurrentClient: Send + Sync {
    /// Connect and authenticate with `token`
    async fn connect(&self, token: &str) -> Result<Inbox, ClientError>;

    async fn disconnect(&self) -> Result<(), ClientError>;

    /// Check a token without keeping a session open
    async fn validate_api_token(&self, token: &str) -> Result<bool, ClientError>;

    /// E-mail address of the account belonging to the last validated token
    async fn get_email(&self) -> Result<String, ClientError>;

    async fn get_charge_cards(&self) -> Result<Vec<ChargeCard>, ClientError>;

    /// Time until the request limit resets
    fn next_reset_delta(&self) -> Duration;

    async fn get_charge_points(&self) -> Result<(), ClientError>;
    async fn get_status(&self, evse_id: &str) -> Result<(), ClientError>;
    async fn get_settings(&self, evse_id: &str) -> Result<(), ClientError>;
    async fn get_grid_status(&self, evse_id: &str) -> Result<(), ClientError>;

    async fn reset(&self, evse_id: &str) -> Result<(), ClientError>;
    async fn reboot(&self, evse_id: &str) -> Result<(), ClientError>;
    async fn start_session(&self, evse_id: &str, card_uid: &str) -> Result<(), ClientError>;
    async fn stop_session(&self, evse_id: &str) -> Result<(), ClientError>;

    async fn set_public_charging(&self, evse_id: &str, value: bool) -> Result<(), ClientError>;
    async fn set_plug_and_charge(&self, evse_id: &str, value: bool) -> Result<(), ClientError>;
    async fn set_linked_charge_cards_only(
        &self,
        evse_id: &str,
        value: bool,
    ) -> Result<(), ClientError>;
    async fn block(&self, evse_id: &str, value: bool) -> Result<(), ClientError>;

    async fn override_price_based_charging_profile(
        &self,
        evse_id: &str,
        value: bool,
    ) -> Result<(), ClientError>;
    async fn override_delayed_charging_profile(
        &self,
        evse_id: &str,
        value: bool,
    ) -> Result<(), ClientError>;
}

#[cfg(test)]
pub use mock::MockClient;

#[cfg(test)]
mod mock {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Recording client for tests.
    ///
    /// Every call is appended to `calls` as `"name(args)"`. `connect` hands out a fresh inbox
    /// whose sender is kept in `inbox` so tests can feed messages or fail the transport.
    #[derive(Debug)]
    pub struct MockClient {
        pub calls: Mutex<Vec<String>>,
        pub inbox: Mutex<Option<InboxSender>>,
        /// Results handed out by successive `connect` calls; empty means success
        pub connect_results: Mutex<VecDeque<Result<(), ClientError>>>,
        /// Error returned by every request method when set
        pub request_error: Mutex<Option<ClientError>>,
        pub reset_delta: Duration,
        pub email: String,
        pub cards: Mutex<Result<Vec<ChargeCard>, ClientError>>,
        pub token_error: Mutex<Option<ClientError>>,
        /// Answer of `validate_api_token` when no `token_error` is set
        pub token_valid: Mutex<bool>,
    }

    impl MockClient {
        pub fn new() -> Self {
            Self {
                calls: Mutex::new(Vec::new()),
                inbox: Mutex::new(None),
                connect_results: Mutex::new(VecDeque::new()),
                request_error: Mutex::new(None),
                reset_delta: Duration::from_secs(3600),
                email: "test@email.com".to_string(),
                cards: Mutex::new(Ok(Vec::new())),
                token_error: Mutex::new(None),
                token_valid: Mutex::new(true),
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        pub fn clear_calls(&self) {
            self.calls.lock().unwrap().clear();
        }

        pub fn fail_connect(&self, err: ClientError) {
            self.connect_results.lock().unwrap().push_back(Err(err));
        }

        /// Push a message onto the current inbox.
        pub fn push(&self, msg: serde_json::Value) {
            let message: Message = serde_json::from_value(msg).unwrap();
            if let Some(tx) = self.inbox.lock().unwrap().as_ref() {
                let _ = tx.send(Ok(message));
            }
        }

        /// Fail the current transport.
        pub fn drop_connection(&self, err: ClientError) {
            if let Some(tx) = self.inbox.lock().unwrap().take() {
                let _ = tx.send(Err(err));
            }
        }

        fn record(&self, call: String) -> Result<(), ClientError> {
            self.calls.lock().unwrap().push(call);
            match self.request_error.lock().unwrap().clone() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl BlueCurrentClient for MockClient {
        async fn connect(&self, token: &str) -> Result<Inbox, ClientError> {
            self.calls.lock().unwrap().push(format!("connect({token})"));
            if let Some(Err(err)) = self.connect_results.lock().unwrap().pop_front() {
                return Err(err);
            }
            let (tx, rx) = mpsc::unbounded_channel();
            *self.inbox.lock().unwrap() = Some(tx);
            Ok(rx)
        }

        async fn disconnect(&self) -> Result<(), ClientError> {
            self.inbox.lock().unwrap().take();
            self.record("disconnect()".to_string())
        }

        async fn validate_api_token(&self, token: &str) -> Result<bool, ClientError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("validate_api_token({token})"));
            match self.token_error.lock().unwrap().clone() {
                Some(err) => Err(err),
                None => Ok(*self.token_valid.lock().unwrap()),
            }
        }

        async fn get_email(&self) -> Result<String, ClientError> {
            Ok(self.email.clone())
        }

        async fn get_charge_cards(&self) -> Result<Vec<ChargeCard>, ClientError> {
            self.cards.lock().unwrap().clone()
        }

        fn next_reset_delta(&self) -> Duration {
            self.reset_delta
        }

        async fn get_charge_points(&self) -> Result<(), ClientError> {
            self.record("get_charge_points()".to_string())
        }

        async fn get_status(&self, evse_id: &str) -> Result<(), ClientError> {
            self.record(format!("get_status({evse_id})"))
        }

        async fn get_settings(&self, evse_id: &str) -> Result<(), ClientError> {
            self.record(format!("get_settings({evse_id})"))
        }

        async fn get_grid_status(&self, evse_id: &str) -> Result<(), ClientError> {
            self.record(format!("get_grid_status({evse_id})"))
        }

        async fn reset(&self, evse_id: &str) -> Result<(), ClientError> {
            self.record(format!("reset({evse_id})"))
        }

        async fn reboot(&self, evse_id: &str) -> Result<(), ClientError> {
            self.record(format!("reboot({evse_id})"))
        }

        async fn start_session(&self, evse_id: &str, card_uid: &str) -> Result<(), ClientError> {
            self.record(format!("start_session({evse_id}, {card_uid})"))
        }

        async fn stop_session(&self, evse_id: &str) -> Result<(), ClientError> {
            self.record(format!("stop_session({evse_id})"))
        }

        async fn set_public_charging(&self, evse_id: &str, value: bool) -> Result<(), ClientError> {
            self.record(format!("set_public_charging({evse_id}, {value})"))
        }

        async fn set_plug_and_charge(&self, evse_id: &str, value: bool) -> Result<(), ClientError> {
            self.record(format!("set_plug_and_charge({evse_id}, {value})"))
        }

        async fn set_linked_charge_cards_only(
            &self,
            evse_id: &str,
            value: bool,
        ) -> Result<(), ClientError> {
            self.record(format!("set_linked_charge_cards_only({evse_id}, {value})"))
        }

        async fn block(&self, evse_id: &str, value: bool) -> Result<(), ClientError> {
            self.record(format!("block({evse_id}, {value})"))
        }

        async fn override_price_based_charging_profile(
            &self,
            evse_id: &str,
            value: bool,
        ) -> Result<(), ClientError> {
            self.record(format!(
                "override_price_based_charging_profile({evse_id}, {value})"
            ))
        }

        async fn override_delayed_charging_profile(
            &self,
            evse_id: &str,
            value: bool,
        ) -> Result<(), ClientError> {
            self.record(format!("override_delayed_charging_profile({evse_id}, {value})"))
        }
    }
}
