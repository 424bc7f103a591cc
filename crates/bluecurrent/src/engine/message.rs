//! Type-safe message system for the engine
//!
//! Messages are split by direction to enforce correct usage at compile time:
//! - `FromIntegrationMessage`: Events from integrations to the engine
//! - `ToIntegrationMessage`: Commands from the engine to integrations

use super::device::Device;
use super::registry::RegistryEntry;
use super::state::EntityState;

/// Messages FROM integrations TO the engine (events/state updates)
#[derive(Debug, Clone)]
pub enum FromIntegrationMessage {
    /// A device was created or updated
    DeviceRegistered { device: Device },

    /// An entity was registered
    EntityRegistered { entry: RegistryEntry },

    /// An entity wrote a new state
    StateChanged {
        entity_id: String,
        state: EntityState,
    },

    /// Force every entity of a config entry into the unavailable state
    MarkUnavailable { config_entry_id: String },
}

/// Commands addressed to a single entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityCommand {
    TurnOn,
    TurnOff,
    Press,
}

/// Messages FROM the engine TO integrations (commands)
#[derive(Debug, Clone)]
pub enum ToIntegrationMessage {
    /// Command for one entity, routed to the integration that owns it
    EntityCommand {
        entity_id: String,
        command: EntityCommand,
    },

    /// Service call, routed to the integration registered under `domain`
    CallService {
        domain: String,
        service: String,
        data: serde_json::Value,
    },
}
