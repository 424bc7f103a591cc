use std::collections::HashMap;
use std::sync::Arc;
use std::sync::PoisonError;

use arc_swap::ArcSwap;
use tokio::sync::broadcast;
use tokio::sync::mpsc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;
use tracing::warn;

use super::dispatcher::Dispatcher;
use super::event::Event;
use super::integration::FromIntegrationReceiver;
use super::integration::FromIntegrationSender;
use super::integration::HostHandle;
use super::integration::Integration;
use super::integration::ToIntegrationSender;
use super::message::EntityCommand;
use super::message::FromIntegrationMessage;
use super::message::ToIntegrationMessage;
use super::state::EntityState;
use super::state::State;

/// Engine
///
/// This structure handles the flow of events, sending commands to the correct integration,
/// and maintaining a view of the world with State.
pub struct Engine {
    /// Centralized state snapshot (readers load the Arc, writer stores a new one)
    state: ArcSwap<State>,

    /// Communication channels to integrations (for commands), keyed by integration name
    integration_channels: std::sync::Mutex<HashMap<String, ToIntegrationSender>>,

    /// Receive messages from integrations (events)
    message_rx: Mutex<FromIntegrationReceiver>,

    /// Sender for integrations to report events back to the engine
    message_tx: FromIntegrationSender,

    /// Signal bus shared with every integration
    dispatcher: Dispatcher,

    /// Automation events
    events: broadcast::Sender<Event>,

    /// Handles for integration tasks
    integration_handles: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

/// Capacity for the integration→engine message channel
/// Provides backpressure when integrations send faster than the engine can process
const FROM_INTEGRATION_CHANNEL_SIZE: usize = 1024;

/// Capacity for the automation event channel; slow subscribers lag rather than block
const EVENT_CHANNEL_SIZE: usize = 256;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("No integration found for entity: {0}")]
    UnknownEntity(String),

    #[error("Integration channel not found: {0}")]
    UnknownIntegration(String),

    #[error("Integration '{0}' is no longer running")]
    IntegrationStopped(String),
}

impl Engine {
    /// Create a new Engine instance
    pub fn new() -> Self {
        let (message_tx, message_rx) = mpsc::channel(FROM_INTEGRATION_CHANNEL_SIZE);
        let (events, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        Self {
            state: ArcSwap::new(Arc::default()),
            integration_channels: std::sync::Mutex::new(HashMap::new()),
            message_rx: Mutex::new(message_rx),
            message_tx,
            dispatcher: Dispatcher::new(),
            events,
            integration_handles: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Register an integration with the engine
    ///
    /// This spawns the integration in a background task, wires up channels,
    /// and starts its setup process.
    pub fn register_integration(&self, mut integration: Box<dyn Integration>) {
        let name = integration.name().to_string();
        let (to_integration_tx, mut to_integration_rx) = mpsc::unbounded_channel();
        let host = HostHandle {
            tx: self.message_tx.clone(),
            dispatcher: self.dispatcher.clone(),
        };

        self.integration_channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.clone(), to_integration_tx);

        // Spawn integration task
        let handle = tokio::spawn(async move {
            if let Err(e) = integration.setup(host).await {
                warn!("Integration '{}' setup failed: {:#}", name, e);
                return;
            }

            // Process commands from engine
            while let Some(msg) = to_integration_rx.recv().await {
                if let Err(e) = integration.handle_message(msg).await {
                    warn!("Integration '{}' failed to handle message: {:#}", name, e);
                }
            }

            if let Err(e) = integration.shutdown().await {
                warn!("Integration '{}' shutdown failed: {:#}", name, e);
            }
        });

        self.integration_handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handle);
    }

    /// Send a command to an integration
    ///
    /// Entity commands are routed to the integration owning the entity, service calls to the
    /// integration registered under the service domain.
    pub fn send_command(&self, msg: ToIntegrationMessage) -> Result<(), EngineError> {
        let integration_name = match &msg {
            ToIntegrationMessage::EntityCommand { entity_id, .. } => self
                .state
                .load()
                .registry
                .get(entity_id)
                .map(|entry| entry.integration.clone())
                .ok_or_else(|| EngineError::UnknownEntity(entity_id.clone()))?,
            ToIntegrationMessage::CallService { domain, .. } => domain.clone(),
        };

        let channels = self
            .integration_channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let tx = channels
            .get(&integration_name)
            .ok_or_else(|| EngineError::UnknownIntegration(integration_name.clone()))?;

        tx.send(msg)
            .map_err(|_| EngineError::IntegrationStopped(integration_name))
    }

    /// Send a command to a single entity
    pub fn send_entity_command(
        &self,
        entity_id: impl Into<String>,
        command: EntityCommand,
    ) -> Result<(), EngineError> {
        self.send_command(ToIntegrationMessage::EntityCommand {
            entity_id: entity_id.into(),
            command,
        })
    }

    /// Call a service of an integration
    pub fn call_service(
        &self,
        domain: impl Into<String>,
        service: impl Into<String>,
        data: serde_json::Value,
    ) -> Result<(), EngineError> {
        self.send_command(ToIntegrationMessage::CallService {
            domain: domain.into(),
            service: service.into(),
            data,
        })
    }

    /// Run the engine's main event loop
    ///
    /// Processes incoming events from integrations and updates state.
    pub async fn run(&self) {
        info!("Engine starting");

        let mut rx = self.message_rx.lock().await;
        while let Some(msg) = rx.recv().await {
            self.handle_event(msg);
        }

        info!("Engine shutting down");
    }

    /// Stop every integration and wait for their shutdown to complete.
    pub async fn shutdown(&self) {
        // Dropping the command channels ends each integration's command loop.
        self.integration_channels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();

        let handles: Vec<_> = self
            .integration_handles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        for handle in handles {
            if let Err(e) = handle.await {
                warn!("Integration task failed: {}", e);
            }
        }
    }

    /// Get a snapshot of the current engine state.
    ///
    /// Clones the `Arc` (atomic refcount bump), essentially free.
    pub fn state_snapshot(&self) -> Arc<State> {
        self.state.load_full()
    }

    /// Shared signal bus
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Subscribe to automation events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Handle an event from an integration
    pub(crate) fn handle_event(&self, msg: FromIntegrationMessage) {
        match msg {
            FromIntegrationMessage::DeviceRegistered { device } => {
                info!("Device registered: {} ({})", device.name, device.id);
                let mut state = State::clone(&self.state.load());
                state.devices.insert(device.id.clone(), device);
                self.state.store(Arc::new(state));
            }
            FromIntegrationMessage::EntityRegistered { entry } => {
                info!(
                    "Entity registered: {} (from {})",
                    entry.entity_id, entry.integration
                );

                // State is not populated until the first state-change message arrives.
                let mut state = State::clone(&self.state.load());
                if let Some(device) = entry
                    .device_id
                    .as_ref()
                    .and_then(|id| state.devices.get_mut(id))
                {
                    device.add_entity(entry.entity_id.clone());
                }
                state.registry.insert(entry.entity_id.clone(), entry);
                self.state.store(Arc::new(state));
            }
            FromIntegrationMessage::StateChanged { entity_id, state } => {
                debug!("State changed: {} -> {}", entity_id, state.state);
                self.write_states(vec![(entity_id, state)]);
            }
            FromIntegrationMessage::MarkUnavailable { config_entry_id } => {
                let updates: Vec<_> = self
                    .state
                    .load()
                    .entries_for_config_entry(&config_entry_id)
                    .map(|entry| (entry.entity_id.clone(), EntityState::unavailable()))
                    .collect();
                info!(
                    "Marking {} entities of {} unavailable",
                    updates.len(),
                    config_entry_id
                );
                self.write_states(updates);
            }
        }
    }

    fn write_states(&self, updates: Vec<(String, EntityState)>) {
        let mut state = State::clone(&self.state.load());
        let mut events = Vec::with_capacity(updates.len());
        for (entity_id, new_state) in updates {
            let old_state = state.entities.insert(entity_id.clone(), new_state.clone());
            if old_state.as_ref() != Some(&new_state) {
                events.push(Event::StateChanged {
                    entity_id,
                    old_state,
                    new_state,
                });
            }
        }
        self.state.store(Arc::new(state));

        for event in events {
            // No subscribers is not an error.
            let _ = self.events.send(event);
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
