use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use strum::IntoEnumIterator;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::button::ButtonKind;
use super::button::ChargePointButton;
use super::client::BlueCurrentClient;
use super::client::ClientError;
use super::client::Inbox;
use super::connector::Connector;
use super::connector::ConnectorError;
use super::entity::charge_point_device;
use super::message::Setting;
use super::message::CHARGE_POINTS;
use super::sensor::ChargePointSensor;
use super::sensor::GridSensor;
use super::sensor::GRID_SENSORS;
use super::sensor::SENSORS;
use super::services::call_service;
use super::supervisor::Supervisor;
use super::switch::ChargePointSwitch;
use super::DOMAIN;
use super::MODEL_TYPE;
use crate::config::BlueCurrentConfig;
use crate::engine::spawn_tracker;
use crate::engine::write_state;
use crate::engine::EntityCommand;
use crate::engine::FromIntegrationMessage;
use crate::engine::FromIntegrationSender;
use crate::engine::HostHandle;
use crate::engine::Integration;
use crate::engine::RegistryEntry;
use crate::engine::SharedEntity;
use crate::engine::ToIntegrationMessage;

/// How long setup waits for the charge point list
const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Why setup failed.
#[derive(Debug, thiserror::Error)]
pub enum SetupError {
    /// The token was rejected; retrying will not help
    #[error("Authentication failed: {0}")]
    AuthFailed(#[source] ClientError),

    /// The service could not be reached; setup may be retried later
    #[error("Blue Current is not ready: {0}")]
    NotReady(#[source] ClientError),

    #[error("Timed out waiting for the charge point list")]
    DiscoveryTimeout,

    #[error("Invalid account configuration: {0}")]
    Configuration(#[source] ConnectorError),
}

impl From<ClientError> for SetupError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::InvalidApiToken => SetupError::AuthFailed(err),
            err => SetupError::NotReady(err),
        }
    }
}

impl From<ConnectorError> for SetupError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::Client(e) => e.into(),
            err => SetupError::Configuration(err),
        }
    }
}

/// Process inbound messages until the charge point list has been handled.
async fn wait_for_discovery(connector: &Connector, inbox: &mut Inbox) -> Result<(), SetupError> {
    loop {
        let message = match inbox.recv().await {
            Some(Ok(message)) => message,
            Some(Err(e)) => return Err(e.into()),
            None => return Err(ClientError::ConnectionClosed.into()),
        };

        let discovery = message.object == CHARGE_POINTS;
        match connector.on_data(message).await {
            Ok(()) if discovery => return Ok(()),
            Ok(()) => {}
            Err(e) if discovery => return Err(e.into()),
            Err(ConnectorError::Client(e)) => return Err(e.into()),
            Err(e) => debug!("Ignoring message before discovery: {}", e),
        }
    }
}

/// Blue Current integration
///
/// Registers one device per charge point with its sensors, switches and buttons, plus the
/// account wide grid sensors, and serves the `blue_current` services.
pub struct BlueCurrentIntegration {
    client: Arc<dyn BlueCurrentClient>,
    config: BlueCurrentConfig,
    connector: Option<Arc<Connector>>,
    to_engine: Option<FromIntegrationSender>,
    switches: HashMap<String, Arc<Mutex<ChargePointSwitch>>>,
    buttons: HashMap<String, Arc<Mutex<ChargePointButton>>>,
    /// Entity trackers and the supervisor
    tasks: Vec<JoinHandle<()>>,
}

impl BlueCurrentIntegration {
    pub fn new(client: Arc<dyn BlueCurrentClient>, config: &BlueCurrentConfig) -> Self {
        Self {
            client,
            config: config.clone(),
            connector: None,
            to_engine: None,
            switches: HashMap::new(),
            buttons: HashMap::new(),
            tasks: Vec::new(),
        }
    }

    /// Connect, wait for the charge point list and register everything found.
    pub async fn start(&mut self, host: HostHandle) -> Result<(), SetupError> {
        let connector = Arc::new(Connector::new(self.client.clone(), host.dispatcher.clone()));

        let mut inbox = connector.connect(&self.config.api_token).await?;
        info!("Connected to the Blue Current websocket");
        self.client.get_charge_points().await?;

        tokio::time::timeout(
            DISCOVERY_TIMEOUT,
            wait_for_discovery(&connector, &mut inbox),
        )
        .await
        .map_err(|_| SetupError::DiscoveryTimeout)??;

        self.connector = Some(connector.clone());
        self.to_engine = Some(host.tx.clone());
        self.register_entities(&connector, &host).await;

        let supervisor = Supervisor::new(
            connector,
            self.config.api_token.clone(),
            self.config.entry_id.clone(),
            host.tx.clone(),
        );
        self.tasks.push(tokio::spawn(supervisor.run(inbox)));
        Ok(())
    }

    async fn register_entities(&mut self, connector: &Arc<Connector>, host: &HostHandle) {
        for evse_id in connector.charge_point_ids() {
            let model_type = connector
                .charge_point(&evse_id)
                .and_then(|record| record.get(MODEL_TYPE)?.as_str().map(str::to_string));
            let device = charge_point_device(&evse_id, model_type.as_deref());
            info!("Found charge point {}", device.name);
            send(&host.tx, FromIntegrationMessage::DeviceRegistered { device }).await;

            for description in SENSORS {
                let sensor = ChargePointSensor::new(connector.clone(), &evse_id, *description);
                self.add_entity(Arc::new(Mutex::new(sensor)), host).await;
            }

            for setting in Setting::iter() {
                let switch = Arc::new(Mutex::new(ChargePointSwitch::new(
                    connector.clone(),
                    &evse_id,
                    setting,
                )));
                let entity_id = self.add_entity(switch.clone(), host).await;
                self.switches.insert(entity_id, switch);
            }

            for kind in ButtonKind::iter() {
                let button = Arc::new(Mutex::new(ChargePointButton::new(
                    connector.clone(),
                    &evse_id,
                    kind,
                    &self.config.card,
                )));
                let entity_id = self.add_entity(button.clone(), host).await;
                self.buttons.insert(entity_id, button);
            }
        }

        for description in GRID_SENSORS {
            let sensor = GridSensor::new(connector.clone(), *description);
            self.add_entity(Arc::new(Mutex::new(sensor)), host).await;
        }
    }

    /// Register an entity and keep it in sync with its signals. Returns its entity id.
    async fn add_entity(&mut self, entity: SharedEntity, host: &HostHandle) -> String {
        let (entry, signals) = {
            let guard = entity.lock().await;
            let entry = RegistryEntry {
                entity_id: guard.entity_id().to_string(),
                unique_id: guard.unique_id().to_string(),
                platform: guard.platform(),
                integration: DOMAIN.to_string(),
                config_entry_id: self.config.entry_id.clone(),
                device_id: guard.device_id().map(str::to_string),
            };
            (entry, guard.signals())
        };

        let entity_id = entry.entity_id.clone();
        send(&host.tx, FromIntegrationMessage::EntityRegistered { entry }).await;

        let rx = host.dispatcher.connect(signals);
        self.tasks
            .push(spawn_tracker(entity, rx, host.tx.clone()));
        entity_id
    }

    async fn handle_entity_command(
        &self,
        entity_id: &str,
        command: EntityCommand,
    ) -> anyhow::Result<()> {
        let tx = self
            .to_engine
            .as_ref()
            .context("Integration is not set up")?;

        if let Some(switch) = self.switches.get(entity_id) {
            let mut switch = switch.lock().await;
            let on = match command {
                EntityCommand::TurnOn => true,
                EntityCommand::TurnOff => false,
                EntityCommand::Press => anyhow::bail!("Switch {} cannot be pressed", entity_id),
            };
            switch
                .turn(on)
                .await
                .with_context(|| format!("Failed to change {:?}", switch.setting()))?;
            write_state(&*switch, tx).await;
            return Ok(());
        }

        if let Some(button) = self.buttons.get(entity_id) {
            if command != EntityCommand::Press {
                anyhow::bail!("Button {} can only be pressed", entity_id);
            }
            let mut button = button.lock().await;
            button
                .press()
                .await
                .with_context(|| format!("Failed to press {}", entity_id))?;
            write_state(&*button, tx).await;
            return Ok(());
        }

        anyhow::bail!("Unknown entity: {}", entity_id)
    }
}

async fn send(tx: &FromIntegrationSender, msg: FromIntegrationMessage) {
    if let Err(e) = tx.send(msg).await {
        warn!("Failed to send message to engine: {}", e);
    }
}

#[async_trait]
impl Integration for BlueCurrentIntegration {
    fn name(&self) -> &str {
        DOMAIN
    }

    async fn setup(&mut self, host: HostHandle) -> anyhow::Result<()> {
        if !self.config.enabled {
            info!("Blue Current integration is disabled, skipping");
            return Ok(());
        }

        info!("Setting up Blue Current integration");
        self.start(host).await?;
        info!(
            "Blue Current integration set up with {} charge points",
            self.connector
                .as_ref()
                .map_or(0, |c| c.charge_point_ids().len())
        );
        Ok(())
    }

    async fn handle_message(&mut self, msg: ToIntegrationMessage) -> anyhow::Result<()> {
        match msg {
            ToIntegrationMessage::EntityCommand { entity_id, command } => {
                debug!("Command {:?} for {}", command, entity_id);
                self.handle_entity_command(&entity_id, command).await
            }
            ToIntegrationMessage::CallService { service, data, .. } => {
                anyhow::ensure!(self.connector.is_some(), "Integration is not set up");
                call_service(self.client.as_ref(), &self.config.card, &service, &data).await?;
                Ok(())
            }
        }
    }

    async fn shutdown(&mut self) -> anyhow::Result<()> {
        info!("Shutting down Blue Current integration");
        for task in self.tasks.drain(..) {
            task.abort();
        }
        if let Some(connector) = self.connector.take() {
            connector.disconnect().await;
        }
        Ok(())
    }
}
