//! Blue Current charge points.
//!
//! The vendor pushes every state change over one websocket session. The [`Connector`] folds
//! those messages into a record per charge point and announces each change on the engine's
//! dispatcher; the entities re-read their record when their signal fires. A [`Supervisor`]
//! keeps the session alive and marks every entity unavailable while it is down.

#[allow(clippy::module_inception)]
mod blue_current;
mod button;
mod client;
pub mod config_flow;
mod connector;
pub mod device_automation;
mod entity;
mod message;
mod sensor;
mod services;
mod supervisor;
mod switch;

use std::time::Duration;

pub use blue_current::BlueCurrentIntegration;
pub use blue_current::SetupError;
pub use client::BlueCurrentClient;
pub use client::ChargeCard;
pub use client::ClientError;
pub use client::Inbox;
pub use client::InboxSender;
#[cfg(test)]
pub use client::MockClient;
pub use connector::grid_update_signal;
pub use connector::value_update_signal;
pub use connector::Connector;
pub use connector::ConnectorError;
pub use message::classify;
pub use message::MalformedMessage;
pub use message::Message;
pub use message::Record;
pub use message::Service;
pub use message::Setting;
pub use message::Update;
pub use services::call_service;
pub use services::ServiceError;
pub use services::ServiceName;
pub use supervisor::mark_unavailable;
pub use supervisor::receive_loop;
pub use supervisor::retry_delay;
pub use supervisor::Supervisor;

pub const DOMAIN: &str = "blue_current";
pub const MANUFACTURER: &str = "Blue Current";

pub(crate) const EVSE_ID: &str = "evse_id";
pub(crate) const MODEL_TYPE: &str = "model_type";
pub(crate) const ACTIVITY: &str = "activity";
pub(crate) const OPERATIVE: &str = "operative";
pub(crate) const VEHICLE_STATUS: &str = "vehicle_status";
pub(crate) const UNAVAILABLE: &str = "unavailable";

/// Delay before reconnecting after a live session failed
pub const SMALL_DELAY: Duration = Duration::from_secs(1);

/// Delay between reconnect attempts after a transport failure
pub const LARGE_DELAY: Duration = Duration::from_secs(20);
