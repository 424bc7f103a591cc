use std::sync::Arc;

use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use serde_json::Value;

use super::client::ClientError;
use super::connector::Connector;
use super::entity::flag;
use super::entity::ChargePointEntity;
use super::message::Record;
use super::ACTIVITY;
use super::VEHICLE_STATUS;
use crate::engine::Entity;
use crate::engine::EntityState;
use crate::engine::Platform;

const SMART_CHARGING: &str = "smart_charging";
const PRICE_BASED_CHARGING: &str = "price_based_charging";
const DELAYED_CHARGING: &str = "delayed_charging";
const CHARGING: &str = "charging";
const DELAYED: &str = "delayed";
const VEHICLE_ERROR: &str = "vehicle_error";

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumIter, strum::IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ButtonKind {
    Reset,
    Reboot,
    StartSession,
    StopSession,
    Boost,
}

impl ButtonKind {
    pub fn key(self) -> &'static str {
        self.into()
    }
}

fn is_set(record: &Record, key: &str) -> bool {
    record.get(key).and_then(flag).unwrap_or(false)
}

/// Boost can only override a smart charging profile that is holding the session back.
fn boost_available(record: &Record) -> bool {
    if !is_set(record, SMART_CHARGING)
        || record.get(VEHICLE_STATUS).and_then(Value::as_str) == Some(VEHICLE_ERROR)
    {
        return false;
    }

    let activity = record.get(ACTIVITY).and_then(Value::as_str);
    if is_set(record, DELAYED_CHARGING) {
        return activity == Some(DELAYED);
    }
    if is_set(record, PRICE_BASED_CHARGING) {
        return activity == Some(CHARGING);
    }
    false
}

/// Button performing one action on a charge point.
///
/// Its state is the time of the last press.
pub struct ChargePointButton {
    base: ChargePointEntity,
    kind: ButtonKind,
    card: String,
    available: bool,
    last_pressed: Option<DateTime<Utc>>,
}

impl ChargePointButton {
    pub fn new(connector: Arc<Connector>, evse_id: &str, kind: ButtonKind, card: &str) -> Self {
        Self {
            base: ChargePointEntity::new(connector, evse_id, Platform::Button, kind.key()),
            kind,
            card: card.to_string(),
            available: true,
            last_pressed: None,
        }
    }

    pub async fn press(&mut self) -> Result<(), ClientError> {
        let client = self.base.connector.client();
        let evse_id = self.base.evse_id.as_str();
        match self.kind {
            ButtonKind::Reset => client.reset(evse_id).await?,
            ButtonKind::Reboot => client.reboot(evse_id).await?,
            ButtonKind::StartSession => client.start_session(evse_id, &self.card).await?,
            ButtonKind::StopSession => client.stop_session(evse_id).await?,
            ButtonKind::Boost => {
                let record = self.base.record();
                if is_set(&record, SMART_CHARGING) {
                    if is_set(&record, PRICE_BASED_CHARGING) {
                        client
                            .override_price_based_charging_profile(evse_id, true)
                            .await?;
                    }
                    if is_set(&record, DELAYED_CHARGING) {
                        client.override_delayed_charging_profile(evse_id, true).await?;
                    }
                }
            }
        }
        self.last_pressed = Some(Utc::now());
        Ok(())
    }
}

impl Entity for ChargePointButton {
    fn entity_id(&self) -> &str {
        &self.base.entity_id
    }

    fn unique_id(&self) -> &str {
        &self.base.unique_id
    }

    fn platform(&self) -> Platform {
        Platform::Button
    }

    fn device_id(&self) -> Option<&str> {
        Some(&self.base.device_id)
    }

    fn signals(&self) -> Vec<String> {
        self.base.signals()
    }

    fn update_from_latest_data(&mut self) {
        if self.kind == ButtonKind::Boost {
            self.available = boost_available(&self.base.record());
        }
    }

    fn state(&self) -> EntityState {
        match (self.available, self.last_pressed) {
            (false, _) => EntityState::unavailable(),
            (true, None) => EntityState::unknown(),
            (true, Some(at)) => EntityState::new(at.to_rfc3339_opts(SecondsFormat::Secs, true)),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use strum::IntoEnumIterator;

    use super::*;
    use crate::engine::Dispatcher;
    use crate::integrations::blue_current::client::MockClient;

    fn setup(record: Value) -> (Arc<MockClient>, Arc<Connector>) {
        let client = Arc::new(MockClient::new());
        let connector = Arc::new(Connector::new(client.clone(), Dispatcher::new()));
        connector.add_charge_point("101", "hidden");
        connector
            .update_charge_point("101", record.as_object().unwrap().clone())
            .unwrap();
        (client, connector)
    }

    #[tokio::test]
    async fn test_press_each_button() {
        let (client, connector) = setup(json!({"activity": "charging"}));

        for kind in ButtonKind::iter().filter(|k| *k != ButtonKind::Boost) {
            let mut button = ChargePointButton::new(connector.clone(), "101", kind, "card-uid");
            button.update_from_latest_data();
            assert_eq!(button.state(), EntityState::unknown());

            button.press().await.unwrap();
            let pressed = DateTime::parse_from_rfc3339(&button.state().state).unwrap();
            assert!(Utc::now().signed_duration_since(pressed).num_seconds() < 5);
        }

        assert_eq!(
            client.calls(),
            vec![
                "reset(101)",
                "reboot(101)",
                "start_session(101, card-uid)",
                "stop_session(101)",
            ]
        );
    }

    #[test]
    fn test_button_ids() {
        let (_, connector) = setup(json!({}));
        let button = ChargePointButton::new(connector, "101", ButtonKind::StopSession, "BCU_APP");
        assert_eq!(button.entity_id(), "button.101_stop_session");
        assert_eq!(button.unique_id(), "stop_session_101");
    }

    #[test]
    fn test_boost_availability() {
        let cases = [
            (json!({"smart_charging": false, "activity": "charging"}), false),
            (
                json!({
                    "smart_charging": true,
                    "activity": "delayed",
                    "delayed_charging": {"value": true},
                    "price_based_charging": {"value": false}
                }),
                true,
            ),
            (
                json!({
                    "smart_charging": true,
                    "activity": "charging",
                    "delayed_charging": {"value": true},
                    "price_based_charging": {"value": true}
                }),
                false,
            ),
            (
                json!({
                    "smart_charging": true,
                    "activity": "charging",
                    "delayed_charging": {"value": false},
                    "price_based_charging": {"value": true}
                }),
                true,
            ),
            (
                json!({
                    "smart_charging": true,
                    "activity": "charging",
                    "vehicle_status": "vehicle_error",
                    "price_based_charging": {"value": true}
                }),
                false,
            ),
        ];

        for (record, expected) in cases {
            assert_eq!(
                boost_available(record.as_object().unwrap()),
                expected,
                "{record}"
            );
        }
    }

    #[tokio::test]
    async fn test_boost_overrides_active_profiles() {
        let (client, connector) = setup(json!({
            "smart_charging": true,
            "activity": "charging",
            "delayed_charging": {"value": false},
            "price_based_charging": {"value": true}
        }));
        let mut boost = ChargePointButton::new(connector.clone(), "101", ButtonKind::Boost, "BCU_APP");
        boost.update_from_latest_data();
        assert_eq!(boost.state(), EntityState::unknown());

        boost.press().await.unwrap();
        assert_eq!(
            client.calls(),
            vec!["override_price_based_charging_profile(101, true)"]
        );

        connector
            .update_charge_point("101", json!({"smart_charging": false}).as_object().unwrap().clone())
            .unwrap();
        boost.update_from_latest_data();
        assert!(!boost.state().is_available());
    }
}
