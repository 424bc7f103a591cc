use std::sync::Arc;

use serde_json::Value;

use super::client::ClientError;
use super::connector::Connector;
use super::entity::flag;
use super::entity::ChargePointEntity;
use super::message::Setting;
use super::ACTIVITY;
use super::OPERATIVE;
use crate::engine::Entity;
use crate::engine::EntityState;
use crate::engine::Platform;

const AVAILABLE: &str = "available";

/// Switch for one toggleable charge point setting.
///
/// Settings other than `block` can only be changed while the charge point is idle, so the
/// switch is unavailable during any other activity.
pub struct ChargePointSwitch {
    base: ChargePointEntity,
    setting: Setting,
    is_on: bool,
    available: bool,
}

impl ChargePointSwitch {
    pub fn new(connector: Arc<Connector>, evse_id: &str, setting: Setting) -> Self {
        Self {
            base: ChargePointEntity::new(connector, evse_id, Platform::Switch, setting.field()),
            setting,
            is_on: false,
            available: false,
        }
    }

    pub fn setting(&self) -> Setting {
        self.setting
    }

    /// Change the setting on the charge point and assume it took effect.
    pub async fn turn(&mut self, on: bool) -> Result<(), ClientError> {
        let client = self.base.connector.client();
        let evse_id = self.base.evse_id.as_str();
        match self.setting {
            Setting::PublicCharging => client.set_public_charging(evse_id, on).await?,
            Setting::PlugAndCharge => client.set_plug_and_charge(evse_id, on).await?,
            Setting::LinkedChargeCardsOnly => {
                client.set_linked_charge_cards_only(evse_id, on).await?
            }
            Setting::Block => client.block(evse_id, on).await?,
        }
        self.is_on = on;
        Ok(())
    }
}

impl Entity for ChargePointSwitch {
    fn entity_id(&self) -> &str {
        &self.base.entity_id
    }

    fn unique_id(&self) -> &str {
        &self.base.unique_id
    }

    fn platform(&self) -> Platform {
        Platform::Switch
    }

    fn device_id(&self) -> Option<&str> {
        Some(&self.base.device_id)
    }

    fn signals(&self) -> Vec<String> {
        self.base.signals()
    }

    fn update_from_latest_data(&mut self) {
        let record = self.base.record();
        let mut value = record.get(self.setting.field()).and_then(flag);
        if self.setting == Setting::Block && value.is_none() {
            value = record
                .get(OPERATIVE)
                .and_then(Value::as_bool)
                .map(|operative| !operative);
        }

        let idle = record.get(ACTIVITY).and_then(Value::as_str) == Some(AVAILABLE);
        match value {
            Some(on) if idle || self.setting == Setting::Block => {
                self.is_on = on;
                self.available = true;
            }
            _ => self.available = false,
        }
    }

    fn state(&self) -> EntityState {
        if self.available {
            EntityState::on_off(self.is_on)
        } else {
            EntityState::unavailable()
        }
    }
}
