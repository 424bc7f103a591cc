use std::sync::Arc;

use serde_json::Value;

use super::connector::grid_update_signal;
use super::connector::Connector;
use super::entity::state_string;
use super::entity::ChargePointEntity;
use crate::engine::Entity;
use crate::engine::EntityState;
use crate::engine::Platform;

const UNIT: &str = "unit_of_measurement";

/// A sensor reading one field of a record.
#[derive(Debug, Clone, Copy)]
pub struct SensorDescription {
    pub key: &'static str,
    pub unit: Option<&'static str>,
}

const fn sensor(key: &'static str, unit: Option<&'static str>) -> SensorDescription {
    SensorDescription { key, unit }
}

const VOLT: Option<&str> = Some("V");
const AMPERE: Option<&str> = Some("A");

pub const SENSORS: &[SensorDescription] = &[
    sensor("activity", None),
    sensor("vehicle_status", None),
    sensor("actual_v1", VOLT),
    sensor("actual_v2", VOLT),
    sensor("actual_v3", VOLT),
    sensor("avg_voltage", VOLT),
    sensor("actual_p1", AMPERE),
    sensor("actual_p2", AMPERE),
    sensor("actual_p3", AMPERE),
    sensor("avg_current", AMPERE),
    sensor("total_kw", Some("kW")),
    sensor("actual_kwh", Some("kWh")),
    sensor("total_cost", Some("EUR")),
    sensor("start_datetime", None),
    sensor("stop_datetime", None),
    sensor("offline_since", None),
    sensor("max_usage", AMPERE),
    sensor("smartcharging_max_usage", AMPERE),
    sensor("max_offline", AMPERE),
    sensor("current_left", AMPERE),
];

pub const GRID_SENSORS: &[SensorDescription] = &[
    sensor("grid_actual_p1", AMPERE),
    sensor("grid_actual_p2", AMPERE),
    sensor("grid_actual_p3", AMPERE),
    sensor("grid_max_current", AMPERE),
];

fn reading(value: Option<&Value>, unit: Option<&str>) -> EntityState {
    match value {
        None | Some(Value::Null) => EntityState::unavailable(),
        Some(value) => {
            let state = EntityState::new(state_string(value));
            match unit {
                Some(unit) => state.with_attribute(UNIT, unit),
                None => state,
            }
        }
    }
}

/// Sensor for one field of a charge point record.
pub struct ChargePointSensor {
    base: ChargePointEntity,
    description: SensorDescription,
    value: Option<Value>,
}

impl ChargePointSensor {
    pub fn new(connector: Arc<Connector>, evse_id: &str, description: SensorDescription) -> Self {
        Self {
            base: ChargePointEntity::new(connector, evse_id, Platform::Sensor, description.key),
            description,
            value: None,
        }
    }
}

impl Entity for ChargePointSensor {
    fn entity_id(&self) -> &str {
        &self.base.entity_id
    }

    fn unique_id(&self) -> &str {
        &self.base.unique_id
    }

    fn platform(&self) -> Platform {
        Platform::Sensor
    }

    fn device_id(&self) -> Option<&str> {
        Some(&self.base.device_id)
    }

    fn signals(&self) -> Vec<String> {
        self.base.signals()
    }

    fn update_from_latest_data(&mut self) {
        self.value = self.base.record().remove(self.description.key);
    }

    fn state(&self) -> EntityState {
        reading(self.value.as_ref(), self.description.unit)
    }
}

/// Sensor for one field of the account wide grid record.
pub struct GridSensor {
    connector: Arc<Connector>,
    description: SensorDescription,
    entity_id: String,
    value: Option<Value>,
}

impl GridSensor {
    pub fn new(connector: Arc<Connector>, description: SensorDescription) -> Self {
        Self {
            connector,
            description,
            entity_id: format!("{}.{}", Platform::Sensor, description.key),
            value: None,
        }
    }
}

impl Entity for GridSensor {
    fn entity_id(&self) -> &str {
        &self.entity_id
    }

    fn unique_id(&self) -> &str {
        self.description.key
    }

    fn platform(&self) -> Platform {
        Platform::Sensor
    }

    fn signals(&self) -> Vec<String> {
        vec![grid_update_signal()]
    }

    fn update_from_latest_data(&mut self) {
        self.value = self.connector.grid().remove(self.description.key);
    }

    fn state(&self) -> EntityState {
        reading(self.value.as_ref(), self.description.unit)
    }
}
