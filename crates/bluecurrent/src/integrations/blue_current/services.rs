//! Services registered under the `blue_current` domain.
//!
//! Each takes `{"evse_id": ...}` and forwards to the client without waiting for the
//! acknowledgement, which only arrives later on the websocket.

use serde_json::Value;
use tracing::info;

use super::client::BlueCurrentClient;
use super::client::ClientError;
use super::EVSE_ID;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumString, strum::IntoStaticStr, strum::EnumIter)]
#[strum(serialize_all = "snake_case")]
pub enum ServiceName {
    Reset,
    Reboot,
    StartSession,
    StopSession,
}

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Service {0} requires an evse_id")]
    MissingEvseId(&'static str),

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Run `service` with the service call `data`. Sessions are started with `card`.
pub async fn call_service(
    client: &dyn BlueCurrentClient,
    card: &str,
    service: &str,
    data: &Value,
) -> Result<(), ServiceError> {
    let name: ServiceName = service
        .parse()
        .map_err(|_| ServiceError::UnknownService(service.to_string()))?;

    let evse_id = match data.get(EVSE_ID) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(ServiceError::MissingEvseId(name.into())),
    };

    info!("Calling {} for charge point {}", service, evse_id);
    match name {
        ServiceName::Reset => client.reset(&evse_id).await?,
        ServiceName::Reboot => client.reboot(&evse_id).await?,
        ServiceName::StartSession => client.start_session(&evse_id, card).await?,
        ServiceName::StopSession => client.stop_session(&evse_id).await?,
    }
    Ok(())
}
