use super::state::EntityState;

/// Automation-level events.
///
/// Distinct from `FromIntegrationMessage` (transport-level). The engine converts
/// `FromIntegrationMessage` into `Event` at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    StateChanged {
        entity_id: String,
        old_state: Option<EntityState>,
        new_state: EntityState,
    },
}
