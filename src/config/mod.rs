mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{
    BrokerSettings, LoggingSettings, MessageLimitSettings, QueueSettings, RateLimitSettings,
    Settings, ThrottleSettings, WorkerSettings,
};


/// Loads the configuration from the default file and environment variables
/// Merges the configuration with default values
/// Returns a `Settings` struct containing the queue, broker, throttle,
/// workers and logging configurations
///
/// Environment variables separate sections with a double underscore so
/// multi-word field names survive the split: `QUEUE__HOST`,
/// `WORKERS__WATCH_INTERVAL_MS`.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(Environment::default().separator("__"));

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(merge(partial))
}

/// Merge partially specified settings onto the defaults.
fn merge(partial: PartialSettings) -> Settings {
    let default = Settings::default();

    Settings {
        queue: QueueSettings {
            host: partial
                .queue
                .as_ref()
                .and_then(|q| q.host.clone())
                .unwrap_or(default.queue.host),
            port: partial
                .queue
                .as_ref()
                .and_then(|q| q.port)
                .unwrap_or(default.queue.port),
            name: partial
                .queue
                .as_ref()
                .and_then(|q| q.name.clone())
                .unwrap_or(default.queue.name),
        },
        broker: BrokerSettings {
            interval: partial
                .broker
                .as_ref()
                .and_then(|b| b.interval.clone())
                .unwrap_or(default.broker.interval),
            retries: partial
                .broker
                .as_ref()
                .and_then(|b| b.retries)
                .unwrap_or(default.broker.retries),
            timeout_secs: partial
                .broker
                .as_ref()
                .and_then(|b| b.timeout_secs)
                .unwrap_or(default.broker.timeout_secs),
        },
        throttle: ThrottleSettings {
            workers: partial
                .throttle
                .as_ref()
                .and_then(|t| t.workers)
                .unwrap_or(default.throttle.workers),
            queue: RateLimitSettings {
                unit: partial
                    .throttle
                    .as_ref()
                    .and_then(|t| t.queue.as_ref())
                    .and_then(|q| q.unit.clone())
                    .unwrap_or(default.throttle.queue.unit),
                value: partial
                    .throttle
                    .as_ref()
                    .and_then(|t| t.queue.as_ref())
                    .and_then(|q| q.value)
                    .unwrap_or(default.throttle.queue.value),
            },
            messages: partial
                .throttle
                .as_ref()
                .and_then(|t| t.messages.clone())
                .unwrap_or(default.throttle.messages),
        },
        workers: WorkerSettings {
            path: partial
                .workers
                .as_ref()
                .and_then(|w| w.path.clone())
                .unwrap_or(default.workers.path),
            watch_interval_ms: partial
                .workers
                .as_ref()
                .and_then(|w| w.watch_interval_ms)
                .unwrap_or(default.workers.watch_interval_ms),
        },
        logging: LoggingSettings {
            enabled: partial
                .logging
                .as_ref()
                .and_then(|l| l.enabled)
                .unwrap_or(default.logging.enabled),
            level: partial
                .logging
                .as_ref()
                .and_then(|l| l.level.clone())
                .unwrap_or(default.logging.level),
        },
    }
}
