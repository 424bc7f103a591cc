use serde::Serialize;

/// Entity platforms known to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display, strum::AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Platform {
    Sensor,
    Switch,
    Button,
}

/// Registry record of an entity, kept for as long as the engine runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryEntry {
    pub entity_id: String,
    pub unique_id: String,
    pub platform: Platform,

    /// Name of the integration that owns the entity (commands are routed there)
    pub integration: String,

    /// Config entry the entity was created for
    pub config_entry_id: String,

    /// Device the entity belongs to, if any
    pub device_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_display() {
        assert_eq!(Platform::Sensor.to_string(), "sensor");
        assert_eq!(Platform::Button.as_ref(), "button");
    }
}
