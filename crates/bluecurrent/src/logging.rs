use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

/// Build the target filter for the configured default level and per-target overrides.
pub fn filter(config: &LoggingConfig) -> Targets {
    config.overrides.iter().fold(
        Targets::new().with_default(LevelFilter::from(config.level)),
        |targets, (target, level)| targets.with_target(target.clone(), LevelFilter::from(*level)),
    )
}

/// Install the global tracing subscriber.
///
/// Fails if a global subscriber has already been set.
pub fn init(config: &LoggingConfig) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter(config))
        .try_init()
}

#[cfg(test)]
mod tests {
    use tracing::Level;

    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_filter_levels() {
        let mut config = LoggingConfig {
            level: LogLevel::Warn,
            ..Default::default()
        };
        config
            .overrides
            .insert("bluecurrent::integrations".to_string(), LogLevel::Debug);

        let targets = filter(&config);
        assert!(targets.would_enable("bluecurrent::engine", &Level::WARN));
        assert!(!targets.would_enable("bluecurrent::engine", &Level::INFO));
        assert!(targets.would_enable("bluecurrent::integrations::blue_current", &Level::DEBUG));
        assert!(!targets.would_enable("bluecurrent::integrations", &Level::TRACE));
    }

    #[test]
    fn test_init_only_once() {
        let config = LoggingConfig::default();
        assert!(init(&config).is_ok());
        assert!(init(&config).is_err());
    }
}
