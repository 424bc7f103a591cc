mod device;
mod dispatcher;
#[allow(clippy::module_inception)]
mod engine;
mod entity;
mod event;
mod integration;
mod message;
mod registry;
pub mod state;

pub use device::Device;
pub use dispatcher::Dispatcher;
pub use dispatcher::SignalReceiver;
pub use engine::Engine;
pub use engine::EngineError;
pub use entity::spawn_tracker;
pub use entity::write_state;
pub use entity::Entity;
pub use entity::SharedEntity;
pub use event::Event;
pub use integration::FromIntegrationReceiver;
pub use integration::FromIntegrationSender;
pub use integration::HostHandle;
pub use integration::Integration;
pub use message::EntityCommand;
pub use message::FromIntegrationMessage;
pub use message::ToIntegrationMessage;
pub use registry::Platform;
pub use registry::RegistryEntry;
pub use state::EntityState;
pub use state::State;
