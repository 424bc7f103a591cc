use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use serde_json::Value;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::client::BlueCurrentClient;
use super::client::ClientError;
use super::client::Inbox;
use super::message::classify;
use super::message::discovered_record;
use super::message::ChargePointDescriptor;
use super::message::MalformedMessage;
use super::message::Message;
use super::message::Record;
use super::message::Update;
use super::ACTIVITY;
use super::DOMAIN;
use super::OPERATIVE;
use super::UNAVAILABLE;
use crate::engine::Dispatcher;

#[derive(Debug, thiserror::Error)]
pub enum ConnectorError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Unknown charge point: {0}")]
    UnknownChargePoint(String),

    #[error("The account has no charge points")]
    NoChargePoints,

    #[error(transparent)]
    Malformed(#[from] MalformedMessage),
}

/// Signal sent after a charge point record changed.
pub fn value_update_signal(evse_id: &str) -> String {
    format!("{DOMAIN}_value_update_{evse_id}")
}

/// Signal sent after the grid record was replaced.
pub fn grid_update_signal() -> String {
    format!("{DOMAIN}_grid_update")
}

#[derive(Debug, Default)]
struct Registry {
    charge_points: HashMap<String, Record>,
    grid: Record,
}

/// Mirrors the state of every charge point on the account.
///
/// Inbound messages are folded into per charge point records; every change is announced on
/// the dispatcher after the record has been written.
pub struct Connector {
    client: Arc<dyn BlueCurrentClient>,
    dispatcher: Dispatcher,
    registry: Mutex<Registry>,
}

impl Connector {
    pub fn new(client: Arc<dyn BlueCurrentClient>, dispatcher: Dispatcher) -> Self {
        Self {
            client,
            dispatcher,
            registry: Mutex::new(Registry::default()),
        }
    }

    pub fn client(&self) -> &Arc<dyn BlueCurrentClient> {
        &self.client
    }

    pub async fn connect(&self, token: &str) -> Result<Inbox, ClientError> {
        self.client.connect(token).await
    }

    /// Disconnect, ignoring transport errors raised while closing.
    pub async fn disconnect(&self) {
        match self.client.disconnect().await {
            Ok(()) => info!("Disconnected from the Blue Current websocket"),
            Err(ClientError::Websocket(e)) => debug!("Ignoring error while disconnecting: {}", e),
            Err(e) => warn!("Failed to disconnect: {}", e),
        }
    }

    /// Handle one inbound message.
    pub async fn on_data(&self, message: Message) -> Result<(), ConnectorError> {
        let object = message.object.clone();
        let Some(update) = classify(message)? else {
            debug!("Ignoring message {}", object);
            return Ok(());
        };

        match update {
            Update::ChargePoints(descriptors) => self.handle_charge_points(&descriptors).await?,
            Update::Values { evse_id, data } => self.update_charge_point(&evse_id, data)?,
            Update::Grid(data) => self.set_grid(data),
            Update::Setting {
                evse_id,
                setting,
                result,
            } => {
                let mut data = Record::new();
                data.insert(setting.field().to_string(), result);
                self.update_charge_point(&evse_id, data)?;
            }
            Update::Service { success, .. } => {
                let state = if success { "successful" } else { "unsuccessful" };
                debug!("{} was {}", object, state);
            }
        }
        Ok(())
    }

    /// Reset every listed charge point and request its data, then request the grid status.
    async fn handle_charge_points(
        &self,
        descriptors: &[ChargePointDescriptor],
    ) -> Result<(), ConnectorError> {
        let first = descriptors.first().ok_or(ConnectorError::NoChargePoints)?;

        for descriptor in descriptors {
            self.add_charge_point(&descriptor.evse_id, &descriptor.model_type);
            self.get_charge_point_data(&descriptor.evse_id).await?;
        }

        self.client.get_grid_status(&first.evse_id).await?;
        Ok(())
    }

    async fn get_charge_point_data(&self, evse_id: &str) -> Result<(), ClientError> {
        self.client.get_status(evse_id).await?;
        self.client.get_settings(evse_id).await
    }

    /// Create or reset a charge point record to just its model type.
    pub fn add_charge_point(&self, evse_id: &str, model_type: &str) {
        self.registry()
            .charge_points
            .insert(evse_id.to_string(), discovered_record(model_type));
    }

    /// Merge a partial update into a known charge point and announce it.
    pub fn update_charge_point(&self, evse_id: &str, mut data: Record) -> Result<(), ConnectorError> {
        if let Some(activity) = data.get(ACTIVITY) {
            let operative = activity.as_str() != Some(UNAVAILABLE);
            data.insert(OPERATIVE.to_string(), Value::Bool(operative));
        }

        {
            let mut registry = self.registry();
            let record = registry
                .charge_points
                .get_mut(evse_id)
                .ok_or_else(|| ConnectorError::UnknownChargePoint(evse_id.to_string()))?;
            record.extend(data);
        }

        self.dispatch_value_update_signal(evse_id);
        Ok(())
    }

    /// Replace the grid record and announce it.
    pub fn set_grid(&self, data: Record) {
        self.registry().grid = data;
        self.dispatch_grid_update_signal();
    }

    fn dispatch_value_update_signal(&self, evse_id: &str) {
        self.dispatcher.send(&value_update_signal(evse_id));
    }

    fn dispatch_grid_update_signal(&self) {
        self.dispatcher.send(&grid_update_signal());
    }

    /// Snapshot of one charge point record
    pub fn charge_point(&self, evse_id: &str) -> Option<Record> {
        self.registry().charge_points.get(evse_id).cloned()
    }

    /// Ids of all known charge points, sorted
    pub fn charge_point_ids(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.registry().charge_points.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Snapshot of the grid record
    pub fn grid(&self) -> Record {
        self.registry().grid.clone()
    }

    fn registry(&self) -> std::sync::MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
