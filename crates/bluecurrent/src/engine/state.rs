use std::collections::HashMap;

use serde::Deserialize;
use serde::Serialize;

use super::device::Device;
use super::registry::RegistryEntry;

/// State string written for entities that cannot currently report a value.
pub const STATE_UNAVAILABLE: &str = "unavailable";

/// State string of an entity that has never had a value (e.g. a button never pressed).
pub const STATE_UNKNOWN: &str = "unknown";

/// Current state of a single entity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityState {
    /// Primary state string ("on", "charging", "12.5", "unavailable", ...)
    pub state: String,

    /// Extra attributes exposed alongside the state.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

impl EntityState {
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            attributes: serde_json::Map::new(),
        }
    }

    pub fn unavailable() -> Self {
        Self::new(STATE_UNAVAILABLE)
    }

    pub fn unknown() -> Self {
        Self::new(STATE_UNKNOWN)
    }

    pub fn on_off(on: bool) -> Self {
        Self::new(if on { "on" } else { "off" })
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    pub fn is_available(&self) -> bool {
        self.state != STATE_UNAVAILABLE
    }
}

/// Centralized snapshot of the entire engine state.
#[derive(Debug, Clone, Default, Serialize)]
pub struct State {
    /// entity_id -> current state
    pub entities: HashMap<String, EntityState>,

    /// entity_id -> registry entry
    pub registry: HashMap<String, RegistryEntry>,

    /// device_id -> device
    pub devices: HashMap<String, Device>,
}

impl State {
    pub fn entity(&self, entity_id: &str) -> Option<&EntityState> {
        self.entities.get(entity_id)
    }

    /// All registry entries created for a config entry.
    pub fn entries_for_config_entry<'a>(
        &'a self,
        config_entry_id: &'a str,
    ) -> impl Iterator<Item = &'a RegistryEntry> + 'a {
        self.registry
            .values()
            .filter(move |entry| entry.config_entry_id == config_entry_id)
    }
}
