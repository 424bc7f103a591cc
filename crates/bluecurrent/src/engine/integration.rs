use async_trait::async_trait;
use tokio::sync::mpsc;

use super::dispatcher::Dispatcher;
use super::message::FromIntegrationMessage;
use super::message::ToIntegrationMessage;

/// Channel types for messages FROM integrations TO the engine
/// These are bounded channels to provide backpressure
pub type FromIntegrationSender = mpsc::Sender<FromIntegrationMessage>;
pub type FromIntegrationReceiver = mpsc::Receiver<FromIntegrationMessage>;

/// Channel types for messages FROM the engine TO integrations (unbounded - engine must not block)
pub type ToIntegrationSender = mpsc::UnboundedSender<ToIntegrationMessage>;

/// Host services handed to an integration during setup.
#[derive(Debug, Clone)]
pub struct HostHandle {
    /// Report events back to the engine
    pub tx: FromIntegrationSender,

    /// Shared signal bus
    pub dispatcher: Dispatcher,
}

/// Integration trait that all integrations must implement
#[async_trait]
pub trait Integration: Send + Sync {
    /// Get the name/identifier of this integration
    ///
    /// Service calls addressed to this domain are routed here.
    fn name(&self) -> &str;

    /// Set up the integration - connect, discover devices, register entities, etc.
    async fn setup(&mut self, host: HostHandle) -> anyhow::Result<()>;

    /// Handle a command from the engine
    async fn handle_message(&mut self, msg: ToIntegrationMessage) -> anyhow::Result<()>;

    /// Shut down the integration gracefully
    async fn shutdown(&mut self) -> anyhow::Result<()>;
}
