//! Entity abstraction
//!
//! All entities (switches, sensors, buttons) implement the Entity trait. The engine only
//! ever sees their state; integrations keep the concrete types to execute commands.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::warn;

use super::dispatcher::SignalReceiver;
use super::integration::FromIntegrationSender;
use super::message::FromIntegrationMessage;
use super::registry::Platform;
use super::state::EntityState;

pub type SharedEntity = Arc<Mutex<dyn Entity>>;

/// Base trait that all entities must implement
pub trait Entity: Send + Sync {
    fn entity_id(&self) -> &str;

    fn unique_id(&self) -> &str;

    fn platform(&self) -> Platform;

    /// Device this entity belongs to, if any
    fn device_id(&self) -> Option<&str> {
        None
    }

    /// Dispatcher signals after which the entity must re-read its backing data
    fn signals(&self) -> Vec<String>;

    /// Refresh cached values from the backing data.
    fn update_from_latest_data(&mut self);

    /// Current state as written to the engine
    fn state(&self) -> EntityState;
}

/// Write the current state of `entity` to the engine.
pub async fn write_state(entity: &dyn Entity, tx: &FromIntegrationSender) {
    let msg = FromIntegrationMessage::StateChanged {
        entity_id: entity.entity_id().to_string(),
        state: entity.state(),
    };
    if let Err(e) = tx.send(msg).await {
        warn!("Failed to send StateChanged message: {}", e);
    }
}

/// Keep an entity in sync with its signals.
///
/// The entity is refreshed and written once immediately, then again after every signal
/// delivered to `signals`. The receiver must be connected before the backing data can
/// change, otherwise updates made in between are missed.
pub fn spawn_tracker(
    entity: SharedEntity,
    mut signals: SignalReceiver,
    tx: FromIntegrationSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            {
                let mut guard = entity.lock().await;
                guard.update_from_latest_data();
                debug!("Refreshed entity {}", guard.entity_id());
                write_state(&*guard, &tx).await;
            }

            if signals.recv().await.is_none() {
                break;
            }
        }
    })
}
