use std::sync::Arc;
use std::time::Duration;

use tracing::error;
use tracing::info;
use tracing::warn;

use super::client::ClientError;
use super::client::Inbox;
use super::connector::Connector;
use super::connector::ConnectorError;
use super::LARGE_DELAY;
use super::SMALL_DELAY;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationSender;

/// Force every entity of `config_entry_id` into the unavailable state.
pub async fn mark_unavailable(tx: &FromIntegrationSender, config_entry_id: &str) {
    let msg = FromIntegrationMessage::MarkUnavailable {
        config_entry_id: config_entry_id.to_string(),
    };
    if let Err(e) = tx.send(msg).await {
        warn!("Failed to send MarkUnavailable message: {}", e);
    }
}

/// Dispatch every inbound message until the session fails, and return the failure.
///
/// A client error raised while handling a message ends the session too; anything else
/// wrong with a single message is logged and skipped.
pub async fn receive_loop(connector: &Connector, inbox: &mut Inbox) -> ClientError {
    loop {
        let message = match inbox.recv().await {
            Some(Ok(message)) => message,
            Some(Err(e)) => return e,
            None => return ClientError::ConnectionClosed,
        };

        match connector.on_data(message).await {
            Ok(()) => {}
            Err(ConnectorError::Client(e)) => return e,
            Err(ConnectorError::NoChargePoints) => {
                error!("The Blue Current account has no charge points")
            }
            Err(e) => warn!("Dropping message: {}", e),
        }
    }
}

/// How long to wait before the next reconnect attempt, or `None` to give up.
pub fn retry_delay(err: &ClientError, connector: &Connector) -> Option<Duration> {
    match err {
        ClientError::InvalidApiToken => None,
        ClientError::RequestLimitReached => Some(connector.client().next_reset_delta()),
        _ => Some(LARGE_DELAY),
    }
}

/// Keeps the websocket session alive.
///
/// Owns the inbox of the current session. When it fails the supervisor reconnects with the
/// stored token, requests discovery again and resumes receiving. Every failed attempt marks
/// the entities of the config entry unavailable.
pub struct Supervisor {
    connector: Arc<Connector>,
    token: String,
    config_entry_id: String,
    to_engine: FromIntegrationSender,
}

impl Supervisor {
    pub fn new(
        connector: Arc<Connector>,
        token: impl Into<String>,
        config_entry_id: impl Into<String>,
        to_engine: FromIntegrationSender,
    ) -> Self {
        Self {
            connector,
            token: token.into(),
            config_entry_id: config_entry_id.into(),
            to_engine,
        }
    }

    /// Supervise the session behind `inbox`. Only returns once reconnecting is pointless.
    pub async fn run(self, mut inbox: Inbox) {
        loop {
            let err = receive_loop(&self.connector, &mut inbox).await;
            warn!(
                "Disconnected from the Blue Current websocket: {}. Retrying to connect.",
                err
            );

            match self.reconnect().await {
                Some(new_inbox) => inbox = new_inbox,
                None => return,
            }
        }
    }

    async fn reconnect(&self) -> Option<Inbox> {
        let mut delay = SMALL_DELAY;
        loop {
            tokio::time::sleep(delay).await;

            let err = match self.try_reconnect().await {
                Ok(inbox) => return Some(inbox),
                Err(e) => e,
            };

            mark_unavailable(&self.to_engine, &self.config_entry_id).await;

            match retry_delay(&err, &self.connector) {
                Some(next) => {
                    warn!(
                        "Reconnect to Blue Current failed: {}. Retrying in {:?}.",
                        err, next
                    );
                    delay = next;
                }
                None => {
                    error!("Blue Current rejected the API token; giving up: {}", err);
                    return None;
                }
            }
        }
    }

    async fn try_reconnect(&self) -> Result<Inbox, ClientError> {
        let inbox = self.connector.connect(&self.token).await?;
        info!("Reconnected to the Blue Current websocket");
        self.connector.client().get_charge_points().await?;
        Ok(inbox)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    use super::*;
    use crate::engine::Dispatcher;
    use crate::integrations::blue_current::client::BlueCurrentClient;
    use crate::integrations::blue_current::client::MockClient;

    const TOKEN: &str = "123";

    async fn setup() -> (
        Arc<MockClient>,
        Arc<Connector>,
        Inbox,
        mpsc::Receiver<FromIntegrationMessage>,
        FromIntegrationSender,
    ) {
        let client = Arc::new(MockClient::new());
        let connector = Arc::new(Connector::new(client.clone(), Dispatcher::new()));
        let inbox = client.connect(TOKEN).await.unwrap();
        client.clear_calls();
        let (tx, rx) = mpsc::channel(16);
        (client, connector, inbox, rx, tx)
    }

    async fn wait_for_call(client: &MockClient, call: &str, step: Duration) {
        while !client.calls().iter().any(|c| c == call) {
            tokio::time::sleep(step).await;
        }
    }

    #[tokio::test]
    async fn test_receive_loop_skips_bad_messages() {
        let (client, connector, mut inbox, _rx, _tx) = setup().await;
        connector.add_charge_point("101", "hidden");

        client.push(json!({"object": "CH_STATUS", "data": {"activity": "charging"}}));
        client.push(json!({"object": "CH_STATUS", "data": {"evse_id": "999", "a": 1}}));
        client.push(json!({"object": "CHARGE_POINTS", "data": []}));
        client.push(json!({"object": "CH_STATUS", "data": {"evse_id": "101", "a": 1}}));
        client.drop_connection(ClientError::Websocket("reset".to_string()));

        let err = receive_loop(&connector, &mut inbox).await;
        assert_eq!(err, ClientError::Websocket("reset".to_string()));
        assert_eq!(connector.charge_point("101").unwrap()["a"], json!(1));
    }

    #[tokio::test]
    async fn test_receive_loop_ends_on_closed_stream() {
        let (client, connector, mut inbox, _rx, _tx) = setup().await;
        client.inbox.lock().unwrap().take();

        assert_eq!(
            receive_loop(&connector, &mut inbox).await,
            ClientError::ConnectionClosed
        );
    }

    #[tokio::test]
    async fn test_receive_loop_ends_on_request_failure() {
        let (client, connector, mut inbox, _rx, _tx) = setup().await;
        *client.request_error.lock().unwrap() = Some(ClientError::RequestLimitReached);
        client.push(json!({
            "object": "CHARGE_POINTS",
            "data": [{"evse_id": "101", "model_type": "hidden"}]
        }));

        assert_eq!(
            receive_loop(&connector, &mut inbox).await,
            ClientError::RequestLimitReached
        );
    }

    #[test]
    fn test_retry_delay() {
        let client = Arc::new(MockClient::new());
        let connector = Connector::new(client, Dispatcher::new());

        assert_eq!(
            retry_delay(&ClientError::RequestLimitReached, &connector),
            Some(Duration::from_secs(3600))
        );
        assert_eq!(
            retry_delay(&ClientError::Websocket("x".to_string()), &connector),
            Some(LARGE_DELAY)
        );
        assert_eq!(
            retry_delay(&ClientError::ConnectionClosed, &connector),
            Some(LARGE_DELAY)
        );
        assert_eq!(retry_delay(&ClientError::InvalidApiToken, &connector), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_after_small_delay() {
        let (client, connector, inbox, mut rx, tx) = setup().await;
        let supervisor = Supervisor::new(connector.clone(), TOKEN, "uuid", tx);
        let handle = tokio::spawn(supervisor.run(inbox));

        let start = Instant::now();
        client.drop_connection(ClientError::Websocket("reset".to_string()));
        wait_for_call(&client, "get_charge_points()", Duration::from_millis(100)).await;

        assert!(start.elapsed() >= SMALL_DELAY);
        assert!(start.elapsed() < SMALL_DELAY * 2);
        assert_eq!(client.calls(), vec!["connect(123)", "get_charge_points()"]);
        assert!(rx.try_recv().is_err());

        // The new session is received from
        client.push(json!({
            "object": "CHARGE_POINTS",
            "data": [{"evse_id": "101", "model_type": "hidden"}]
        }));
        wait_for_call(&client, "get_grid_status(101)", Duration::from_millis(100)).await;
        assert!(connector.charge_point("101").is_some());

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_limited_reconnect_waits_for_reset() {
        let (client, connector, inbox, mut rx, tx) = setup().await;
        let supervisor = Supervisor::new(connector, TOKEN, "uuid", tx);
        let handle = tokio::spawn(supervisor.run(inbox));

        client.fail_connect(ClientError::RequestLimitReached);
        let start = Instant::now();
        client.drop_connection(ClientError::Websocket("reset".to_string()));

        let msg = rx.recv().await.unwrap();
        assert!(matches!(
            msg,
            FromIntegrationMessage::MarkUnavailable { ref config_entry_id } if config_entry_id == "uuid"
        ));
        assert_eq!(start.elapsed(), SMALL_DELAY);

        wait_for_call(&client, "get_charge_points()", Duration::from_secs(60)).await;
        assert!(start.elapsed() >= SMALL_DELAY + Duration::from_secs(3600));
        assert_eq!(
            client.calls(),
            vec!["connect(123)", "connect(123)", "get_charge_points()"]
        );

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_transport_failure_retries_after_large_delay() {
        let (client, connector, inbox, mut rx, tx) = setup().await;
        let supervisor = Supervisor::new(connector, TOKEN, "uuid", tx);
        let handle = tokio::spawn(supervisor.run(inbox));

        client.fail_connect(ClientError::Websocket("refused".to_string()));
        client.fail_connect(ClientError::Websocket("refused".to_string()));
        let start = Instant::now();
        client.drop_connection(ClientError::ConnectionClosed);

        rx.recv().await.unwrap();
        assert_eq!(start.elapsed(), SMALL_DELAY);
        rx.recv().await.unwrap();
        assert_eq!(start.elapsed(), SMALL_DELAY + LARGE_DELAY);

        wait_for_call(&client, "get_charge_points()", Duration::from_secs(1)).await;
        assert!(start.elapsed() >= SMALL_DELAY + LARGE_DELAY * 2);
        assert_eq!(client.calls().len(), 4);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_token_stops_supervising() {
        let (client, connector, inbox, mut rx, tx) = setup().await;
        let supervisor = Supervisor::new(connector, TOKEN, "uuid", tx);
        let handle = tokio::spawn(supervisor.run(inbox));

        client.fail_connect(ClientError::InvalidApiToken);
        client.drop_connection(ClientError::ConnectionClosed);

        handle.await.unwrap();
        assert!(matches!(
            rx.recv().await,
            Some(FromIntegrationMessage::MarkUnavailable { .. })
        ));
        assert_eq!(client.calls(), vec!["connect(123)"]);
    }

    #[tokio::test]
    async fn test_mark_unavailable_message() {
        let (tx, mut rx) = mpsc::channel(1);
        mark_unavailable(&tx, "uuid").await;
        assert!(matches!(
            rx.recv().await,
            Some(FromIntegrationMessage::MarkUnavailable { config_entry_id }) if config_entry_id == "uuid"
        ));
    }
}
