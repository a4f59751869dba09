use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Covers the queue connection, the broker's retry and timeout policy, the
/// throttle limits, the worker source tree and logging.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub queue: QueueSettings,
    pub broker: BrokerSettings,
    pub throttle: ThrottleSettings,
    pub workers: WorkerSettings,
    pub logging: LoggingSettings,
}

/// Connection parameters for the queue server.
#[derive(Debug, Deserialize, Clone)]
pub struct QueueSettings {
    pub host: String,
    pub port: u16,
    /// The queue name.
    pub name: String,
}

/// Operational parameters for the broker.
#[derive(Debug, Deserialize, Clone)]
pub struct BrokerSettings {
    /// The polling interval schedule, in seconds. Consumed by the queue
    /// transport, not by the broker core.
    pub interval: Vec<u64>,
    /// The number of times a message will be retried after failing.
    pub retries: u32,
    /// The number of seconds until a message is considered timed out.
    pub timeout_secs: u64,
}

/// Admission control limits.
#[derive(Debug, Deserialize, Clone)]
pub struct ThrottleSettings {
    /// The number of workers that may execute concurrently.
    pub workers: usize,
    /// The queue-wide rate limit.
    pub queue: RateLimitSettings,
    /// Message-specific rate limits, evaluated in order; first match wins.
    pub messages: Vec<MessageLimitSettings>,
}

/// A sliding-window rate limit. A value of zero means unlimited.
#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitSettings {
    /// One of: second, minute, five-minute, quarter-hour, half-hour,
    /// hour, day.
    pub unit: String,
    pub value: usize,
}

/// A rate limit scoped to messages matching a pattern.
#[derive(Debug, Deserialize, Clone)]
pub struct MessageLimitSettings {
    /// Optional label, used for diagnostics only.
    #[serde(default)]
    pub name: Option<String>,
    /// Pattern matched against the full raw message body.
    pub regex: String,
    #[serde(default = "default_unit")]
    pub unit: String,
    #[serde(default)]
    pub value: usize,
}

/// Location and reload behaviour of the worker source tree.
#[derive(Debug, Deserialize, Clone)]
pub struct WorkerSettings {
    /// The absolute or relative path to the directory for worker modules.
    pub path: String,
    /// How often the source tree is checked for changes.
    pub watch_interval_ms: u64,
}

/// Logging settings.
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub enabled: bool,
    /// The minimum level to be logged.
    pub level: String,
}

/// Partial configuration settings loaded from files or environment.
///
/// Allows partial specification of settings. Missing values can be filled
/// using defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub queue: Option<PartialQueueSettings>,
    pub broker: Option<PartialBrokerSettings>,
    pub throttle: Option<PartialThrottleSettings>,
    pub workers: Option<PartialWorkerSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialQueueSettings {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PartialBrokerSettings {
    pub interval: Option<Vec<u64>>,
    pub retries: Option<u32>,
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialThrottleSettings {
    pub workers: Option<usize>,
    pub queue: Option<PartialRateLimitSettings>,
    pub messages: Option<Vec<MessageLimitSettings>>,
}

#[derive(Debug, Deserialize)]
pub struct PartialRateLimitSettings {
    pub unit: Option<String>,
    pub value: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct PartialWorkerSettings {
    pub path: Option<String>,
    pub watch_interval_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub enabled: Option<bool>,
    pub level: Option<String>,
}

fn default_unit() -> String {
    "minute".to_string()
}

/// Provides default values for `Settings`.
///
/// Ensures the application has sensible defaults if no configuration is
/// provided.
impl Default for Settings {
    fn default() -> Self {
        Self {
            queue: QueueSettings {
                host: "127.0.0.1".to_string(),
                port: 6379,
                name: String::new(),
            },
            broker: BrokerSettings {
                interval: vec![0, 1, 5, 10],
                retries: 10,
                timeout_secs: 30,
            },
            throttle: ThrottleSettings {
                workers: 5,
                queue: RateLimitSettings {
                    unit: "minute".to_string(),
                    value: 0,
                },
                messages: Vec::new(),
            },
            workers: WorkerSettings {
                path: "./workers".to_string(),
                watch_interval_ms: 2000,
            },
            logging: LoggingSettings {
                enabled: false,
                level: "info".to_string(),
            },
        }
    }
}
