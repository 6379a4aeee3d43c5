// Instance configuration
//
// Everything comes from environment variables. Routing for the messaging
// collaborator is mandatory; the interval knobs silently fall back to defaults
// when they are absent or malformed.

use std::time::Duration;

use crate::error::ConfigError;

/// Fixed HTTP port every instance listens on
pub const HTTP_PORT: u16 = 8080;

const DEFAULT_MESSAGE_INTERVAL_SECS: u64 = 1;
const DEFAULT_ENV_RESPONSE_DELAY_SECS: u64 = 0;
const DEFAULT_HANDLER_DELAY_SECS: u64 = 10;

/// Where status messages are published
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubSubConfig {
    /// Google Cloud project that owns the topic
    pub project_id: String,
    /// Topic receiving status messages
    pub topic_name: String,
    /// Emulator host (`host:port`); when set, publish over plain HTTP without auth
    pub emulator_host: Option<String>,
    /// Fixed OAuth bearer token; overrides application default credentials
    pub access_token: Option<String>,
}

/// Request handler settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandlerConfig {
    /// Artificial latency applied to every hello request
    pub response_delay: Duration,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            response_delay: Duration::from_secs(DEFAULT_HANDLER_DELAY_SECS),
        }
    }
}

/// Full configuration for one instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceConfig {
    pub pubsub: PubSubConfig,
    /// Period between unsolicited status publishes
    pub message_interval: Duration,
    pub handler: HandlerConfig,
}

impl InstanceConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or(ConfigError::Missing(key))
        };

        let project_id = required("PROJECT_ID")?;
        let topic_name = required("TOPIC_NAME")?;

        // A zero period would never tick, so it counts as malformed
        let message_interval = parse_secs(lookup("MESSAGE_INTERVAL"))
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_MESSAGE_INTERVAL_SECS);

        // Overrides the handler's own default, including with 0 when unset
        let response_delay =
            parse_secs(lookup("RESPONSE_DELAY_INTERVAL")).unwrap_or(DEFAULT_ENV_RESPONSE_DELAY_SECS);

        Ok(Self {
            pubsub: PubSubConfig {
                project_id,
                topic_name,
                emulator_host: lookup("PUBSUB_EMULATOR_HOST").filter(|v| !v.is_empty()),
                access_token: lookup("PUBSUB_ACCESS_TOKEN").filter(|v| !v.is_empty()),
            },
            message_interval: Duration::from_secs(message_interval),
            handler: HandlerConfig {
                response_delay: Duration::from_secs(response_delay),
            },
        })
    }
}

fn parse_secs(value: Option<String>) -> Option<u64> {
    value.and_then(|v| v.trim().parse().ok())
}
