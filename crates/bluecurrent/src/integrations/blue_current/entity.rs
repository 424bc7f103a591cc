//! Naming and plumbing shared by every charge point entity.

use std::sync::Arc;

use serde_json::Value;

use super::connector::value_update_signal;
use super::connector::Connector;
use super::message::Record;
use super::DOMAIN;
use super::MANUFACTURER;
use crate::engine::Device;
use crate::engine::Platform;

/// Entity id of a charge point entity, e.g. `sensor.101_activity`.
pub fn entity_id(platform: Platform, evse_id: &str, key: &str) -> String {
    format!("{}.{}_{}", platform, evse_id, key)
}

/// Unique id of a charge point entity, e.g. `activity_101`.
pub fn unique_id(key: &str, evse_id: &str) -> String {
    format!("{}_{}", key, evse_id)
}

pub fn device_id(evse_id: &str) -> String {
    format!("{}_{}", DOMAIN, evse_id)
}

/// Device record for one charge point.
pub fn charge_point_device(evse_id: &str, model_type: Option<&str>) -> Device {
    let name = match model_type {
        Some(model) => format!("{} {}", model, evse_id),
        None => evse_id.to_string(),
    };
    let mut device = Device::new(device_id(evse_id), name);
    device
        .identifiers
        .push((DOMAIN.to_string(), evse_id.to_string()));
    device.manufacturer = Some(MANUFACTURER.to_string());
    device.model = model_type.map(str::to_string);
    device
}

/// Render a record value as a state string.
pub fn state_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Read a flag that is either a plain bool or `{"value": bool, ...}`.
pub fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Object(map) => map.get("value").and_then(Value::as_bool),
        _ => None,
    }
}

/// The part of an entity bound to one charge point record.
pub struct ChargePointEntity {
    pub connector: Arc<Connector>,
    pub evse_id: String,
    pub entity_id: String,
    pub unique_id: String,
    pub device_id: String,
}

impl ChargePointEntity {
    pub fn new(connector: Arc<Connector>, evse_id: &str, platform: Platform, key: &str) -> Self {
        Self {
            connector,
            evse_id: evse_id.to_string(),
            entity_id: entity_id(platform, evse_id, key),
            unique_id: unique_id(key, evse_id),
            device_id: device_id(evse_id),
        }
    }

    /// Snapshot of the backing record; empty if the charge point is gone.
    pub fn record(&self) -> Record {
        self.connector
            .charge_point(&self.evse_id)
            .unwrap_or_default()
    }

    pub fn signals(&self) -> Vec<String> {
        vec![value_update_signal(&self.evse_id)]
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_naming() {
        assert_eq!(entity_id(Platform::Sensor, "101", "activity"), "sensor.101_activity");
        assert_eq!(entity_id(Platform::Switch, "101", "block"), "switch.101_block");
        assert_eq!(unique_id("activity", "101"), "activity_101");
        assert_eq!(device_id("101"), "blue_current_101");
    }

    #[test]
    fn test_charge_point_device() {
        let device = charge_point_device("101", Some("hidden"));
        assert_eq!(device.name, "hidden 101");
        assert_eq!(device.identifier(DOMAIN), Some("101"));
        assert_eq!(device.manufacturer.as_deref(), Some("Blue Current"));
        assert_eq!(device.model.as_deref(), Some("hidden"));

        assert_eq!(charge_point_device("102", None).name, "102");
    }

    #[test]
    fn test_flag() {
        assert_eq!(flag(&json!(true)), Some(true));
        assert_eq!(flag(&json!({"value": false, "permanent": true})), Some(false));
        assert_eq!(flag(&json!("on")), None);
        assert_eq!(flag(&json!({"permanent": true})), None);
    }

    #[test]
    fn test_state_string() {
        assert_eq!(state_string(&json!("charging")), "charging");
        assert_eq!(state_string(&json!(10.52)), "10.52");
        assert_eq!(state_string(&json!(12)), "12");
    }
}
