//! Inbound websocket messages and their classification.
//!
//! The vendor tags every message with an `object` discriminator. Only a fixed vocabulary is
//! understood; [`classify`] maps a message onto exactly one [`Update`] or drops it.

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde_json::Map;
use serde_json::Value;

use super::EVSE_ID;
use super::MODEL_TYPE;

/// Open record of charge point or grid fields.
pub type Record = Map<String, Value>;

pub(crate) const CHARGE_POINTS: &str = "CHARGE_POINTS";
const VALUE_TYPES: [&str; 2] = ["CH_STATUS", "CH_SETTINGS"];
const GRID: &str = "GRID";
const SERVICE_REPLY_PREFIX: &str = "STATUS_";

const DATA: &str = "data";
const RESULT: &str = "result";
const SUCCESS: &str = "success";

/// A decoded message as delivered by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub object: String,

    #[serde(flatten)]
    pub fields: Record,
}

impl Message {
    pub fn new(object: impl Into<String>, fields: Record) -> Self {
        Self {
            object: object.into(),
            fields,
        }
    }
}

/// A charge point as listed by discovery.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChargePointDescriptor {
    #[serde(deserialize_with = "string_or_number")]
    pub evse_id: String,
    pub model_type: String,
}

/// Settings whose change is acknowledged with a `{object, evse_id, result}` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumString, strum::IntoStaticStr, strum::EnumIter)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Setting {
    PublicCharging,
    PlugAndCharge,
    LinkedChargeCardsOnly,
    Block,
}

impl Setting {
    /// Charge point record field holding this setting.
    pub fn field(self) -> &'static str {
        match self {
            Setting::PublicCharging => "public_charging",
            Setting::PlugAndCharge => "plug_and_charge",
            Setting::LinkedChargeCardsOnly => "linked_charge_cards_only",
            Setting::Block => "block",
        }
    }
}

/// Imperative actions whose outcome is only reported, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::IntoStaticStr)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum Service {
    SoftReset,
    Reboot,
    StartSession,
    StopSession,
}

/// What a message asks the connector to do.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Full list of charge points on the account
    ChargePoints(Vec<ChargePointDescriptor>),

    /// Partial status or settings values of one charge point
    Values { evse_id: String, data: Record },

    /// Replacement grid snapshot
    Grid(Record),

    /// Acknowledged setting change
    Setting {
        evse_id: String,
        setting: Setting,
        result: Value,
    },

    /// Outcome of a service call
    Service { service: Service, success: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed {object} message: {reason}")]
pub struct MalformedMessage {
    pub object: String,
    pub reason: String,
}

/// Classify a message. `Ok(None)` means the discriminator is not understood.
pub fn classify(message: Message) -> Result<Option<Update>, MalformedMessage> {
    let Message { object, mut fields } = message;
    let malformed = |reason: &str| MalformedMessage {
        object: object.clone(),
        reason: reason.to_string(),
    };

    if object == CHARGE_POINTS {
        let data = fields.remove(DATA).ok_or_else(|| malformed("missing data"))?;
        let descriptors: Vec<ChargePointDescriptor> =
            serde_json::from_value(data).map_err(|e| malformed(&e.to_string()))?;
        return Ok(Some(Update::ChargePoints(descriptors)));
    }

    if VALUE_TYPES.contains(&object.as_str()) {
        let Some(Value::Object(mut data)) = fields.remove(DATA) else {
            return Err(malformed("data is not an object"));
        };
        let evse_id = take_evse_id(&mut data).ok_or_else(|| malformed("missing evse_id"))?;
        return Ok(Some(Update::Values { evse_id, data }));
    }

    if object.contains(GRID) {
        let Some(Value::Object(data)) = fields.remove(DATA) else {
            return Err(malformed("data is not an object"));
        };
        return Ok(Some(Update::Grid(data)));
    }

    if let Ok(setting) = object.parse::<Setting>() {
        let evse_id = take_evse_id(&mut fields).ok_or_else(|| malformed("missing evse_id"))?;
        let result = fields.remove(RESULT).ok_or_else(|| malformed("missing result"))?;
        return Ok(Some(Update::Setting {
            evse_id,
            setting,
            result,
        }));
    }

    let service_name = object.strip_prefix(SERVICE_REPLY_PREFIX).unwrap_or(&object);
    if let Ok(service) = service_name.parse::<Service>() {
        let success = fields
            .get(SUCCESS)
            .and_then(Value::as_bool)
            .ok_or_else(|| malformed("missing success flag"))?;
        return Ok(Some(Update::Service { service, success }));
    }

    Ok(None)
}

/// Remove the charge point id from a payload; ids may arrive as strings or numbers.
fn take_evse_id(fields: &mut Record) -> Option<String> {
    match fields.remove(EVSE_ID)? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "invalid charge point id: {other}"
        ))),
    }
}

/// A record containing only the model type, as created by discovery.
pub(crate) fn discovered_record(model_type: &str) -> Record {
    let mut record = Record::new();
    record.insert(MODEL_TYPE.to_string(), Value::String(model_type.to_string()));
    record
}
