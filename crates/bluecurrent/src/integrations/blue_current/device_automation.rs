//! Device triggers and conditions on charge point activity and vehicle status.
//!
//! Every charge point device offers one trigger and one condition per activity and per
//! vehicle status. A trigger fires when its sensor changes *to* the type; a condition holds
//! while the sensor is in it.

use serde::Deserialize;
use serde::Serialize;
use strum::IntoEnumIterator;
use tokio::sync::broadcast;
use tracing::warn;

use super::entity::entity_id;
use super::ACTIVITY;
use super::DOMAIN;
use super::VEHICLE_STATUS;
use crate::engine::Device;
use crate::engine::Event;
use crate::engine::Platform;
use crate::engine::State;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumIter, strum::EnumString, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ActivityType {
    Available,
    Charging,
    Unavailable,
    Error,
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumIter, strum::EnumString, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum VehicleStatusType {
    Standby,
    VehicleDetected,
    Ready,
    NoPower,
    VehicleError,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AutomationError {
    #[error("Device {0} is not a Blue Current charge point")]
    NotAChargePoint(String),

    #[error("Invalid type {kind} for {entity_id}")]
    InvalidType { kind: String, entity_id: String },

    #[error("Entity {0} is not an activity or vehicle status sensor")]
    InvalidEntity(String),
}

/// Trigger configuration as listed for a device and handed back to attach.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTrigger {
    pub platform: String,
    pub device_id: String,
    pub domain: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub entity_id: String,
}

/// Condition configuration as listed for a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCondition {
    pub condition: String,
    pub device_id: String,
    pub domain: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub entity_id: String,
}

/// `(type, entity_id)` for every automation a device offers.
fn automations(device: &Device) -> Result<Vec<(&'static str, String)>, AutomationError> {
    let evse_id = device
        .identifier(DOMAIN)
        .ok_or_else(|| AutomationError::NotAChargePoint(device.id.clone()))?;

    let activity = entity_id(Platform::Sensor, evse_id, ACTIVITY);
    let vehicle_status = entity_id(Platform::Sensor, evse_id, VEHICLE_STATUS);

    let activities = ActivityType::iter().map(|t| (<&'static str>::from(t), activity.clone()));
    let statuses =
        VehicleStatusType::iter().map(|t| (<&'static str>::from(t), vehicle_status.clone()));
    Ok(activities.chain(statuses).collect())
}

/// Check that `kind` is a valid type for the sensor `entity_id`.
fn validate(kind: &str, entity_id: &str) -> Result<(), AutomationError> {
    let valid = if entity_id.ends_with(&format!("_{ACTIVITY}")) {
        kind.parse::<ActivityType>().is_ok()
    } else if entity_id.ends_with(&format!("_{VEHICLE_STATUS}")) {
        kind.parse::<VehicleStatusType>().is_ok()
    } else {
        return Err(AutomationError::InvalidEntity(entity_id.to_string()));
    };

    if valid {
        Ok(())
    } else {
        Err(AutomationError::InvalidType {
            kind: kind.to_string(),
            entity_id: entity_id.to_string(),
        })
    }
}

/// List the triggers of a charge point device.
pub fn get_triggers(device: &Device) -> Result<Vec<DeviceTrigger>, AutomationError> {
    Ok(automations(device)?
        .into_iter()
        .map(|(kind, entity_id)| DeviceTrigger {
            platform: "device".to_string(),
            device_id: device.id.clone(),
            domain: DOMAIN.to_string(),
            kind: kind.to_string(),
            entity_id,
        })
        .collect())
}

/// List the conditions of a charge point device.
pub fn get_conditions(device: &Device) -> Result<Vec<DeviceCondition>, AutomationError> {
    Ok(automations(device)?
        .into_iter()
        .map(|(kind, entity_id)| DeviceCondition {
            condition: "device".to_string(),
            device_id: device.id.clone(),
            domain: DOMAIN.to_string(),
            kind: kind.to_string(),
            entity_id,
        })
        .collect())
}

impl DeviceTrigger {
    pub fn validate(&self) -> Result<(), AutomationError> {
        validate(&self.kind, &self.entity_id)
    }

    /// Whether `event` moves the trigger's entity into the trigger's type.
    pub fn matches(&self, event: &Event) -> bool {
        let Event::StateChanged {
            entity_id,
            old_state,
            new_state,
        } = event;

        entity_id == &self.entity_id
            && new_state.state == self.kind
            && old_state.as_ref().map(|s| s.state.as_str()) != Some(self.kind.as_str())
    }

    /// Validate and start listening on `events`.
    pub fn attach(
        self,
        events: broadcast::Receiver<Event>,
    ) -> Result<TriggerListener, AutomationError> {
        self.validate()?;
        Ok(TriggerListener {
            trigger: self,
            events,
        })
    }
}

impl DeviceCondition {
    pub fn validate(&self) -> Result<(), AutomationError> {
        validate(&self.kind, &self.entity_id)
    }

    /// Whether the entity is currently in the condition's type.
    pub fn test(&self, state: &State) -> bool {
        state
            .entity(&self.entity_id)
            .is_some_and(|s| s.state == self.kind)
    }
}

/// An attached trigger.
pub struct TriggerListener {
    trigger: DeviceTrigger,
    events: broadcast::Receiver<Event>,
}

impl TriggerListener {
    /// Wait for the next event firing the trigger. `None` once the engine is gone.
    pub async fn next(&mut self) -> Option<Event> {
        loop {
            match self.events.recv().await {
                Ok(event) if self.trigger.matches(&event) => return Some(event),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Trigger for {} missed {} events", self.trigger.entity_id, n)
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
