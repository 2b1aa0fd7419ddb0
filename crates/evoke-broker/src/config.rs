use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

/// SQS caps a single receive at 10 messages.
const MAX_EVENTS_PER_MACHINE: i32 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config {key} must be set")]
    Missing { key: &'static str },

    #[error("config {key} has invalid value '{value}'")]
    Invalid { key: &'static str, value: String },
}

/// Runtime configuration for the broker daemon.
///
/// Values come from an optional TOML file overlaid by `EVOKE_*` environment
/// variables; `fly_app` and `fly_region` additionally fall back to the
/// `FLY_APP_NAME` / `FLY_REGION` variables the Fly runtime provides.
#[derive(Debug, Clone)]
pub struct EvokeConfig {
    pub environment: String,
    pub sqs_queue_url: String,
    pub sqs_long_poll_seconds: i32,
    pub events_per_machine: i32,
    pub fly_app: String,
    pub fly_region: String,
    pub fly_token: String,
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    environment: Option<String>,
    sqs_queue_url: Option<String>,
    sqs_long_poll_seconds: Option<i32>,
    events_per_machine: Option<i32>,
    fly_app: Option<String>,
    fly_region: Option<String>,
    fly_token: Option<String>,
}

impl EvokeConfig {
    /// Load configuration from an optional TOML file plus the process
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let raw = match path {
            Some(p) => toml::from_str(&std::fs::read_to_string(p)?)?,
            None => RawConfig::default(),
        };
        Self::resolve(raw, &|key| std::env::var(key).ok())
    }

    /// Resolve a raw config against an environment lookup. Split out so
    /// tests can supply their own environment.
    fn resolve(
        mut raw: RawConfig,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(v) = env("EVOKE_ENV") {
            raw.environment = Some(v);
        }
        if let Some(v) = env("EVOKE_SQS_QUEUE_URL") {
            raw.sqs_queue_url = Some(v);
        }
        if let Some(v) = env("EVOKE_SQS_LONG_POLL_SECONDS") {
            raw.sqs_long_poll_seconds = Some(parse_int("EVOKE_SQS_LONG_POLL_SECONDS", &v)?);
        }
        if let Some(v) = env("EVOKE_EVENTS_PER_MACHINE") {
            raw.events_per_machine = Some(parse_int("EVOKE_EVENTS_PER_MACHINE", &v)?);
        }
        if let Some(v) = env("EVOKE_FLY_APP") {
            raw.fly_app = Some(v);
        }
        if let Some(v) = env("EVOKE_FLY_REGION") {
            raw.fly_region = Some(v);
        }
        if let Some(v) = env("EVOKE_FLY_TOKEN") {
            raw.fly_token = Some(v);
        }

        let sqs_queue_url = raw.sqs_queue_url.ok_or(ConfigError::Missing {
            key: "EVOKE_SQS_QUEUE_URL",
        })?;
        let fly_token = raw.fly_token.ok_or(ConfigError::Missing {
            key: "EVOKE_FLY_TOKEN",
        })?;

        // The Fly runtime already knows which app and region we run in.
        let fly_app = raw
            .fly_app
            .or_else(|| env("FLY_APP_NAME"))
            .ok_or(ConfigError::Missing {
                key: "EVOKE_FLY_APP (or FLY_APP_NAME)",
            })?;
        let fly_region = raw
            .fly_region
            .or_else(|| env("FLY_REGION"))
            .ok_or(ConfigError::Missing {
                key: "EVOKE_FLY_REGION (or FLY_REGION)",
            })?;

        let mut events_per_machine = raw.events_per_machine.unwrap_or(5);
        if events_per_machine > MAX_EVENTS_PER_MACHINE {
            tracing::warn!(
                requested = events_per_machine,
                "events_per_machine exceeds the SQS receive cap, using 10"
            );
            events_per_machine = MAX_EVENTS_PER_MACHINE;
        }

        Ok(Self {
            environment: raw.environment.unwrap_or_else(|| "local".into()),
            sqs_queue_url,
            sqs_long_poll_seconds: raw.sqs_long_poll_seconds.unwrap_or(10),
            events_per_machine,
            fly_app,
            fly_region,
            fly_token,
        })
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

fn parse_int(key: &'static str, value: &str) -> Result<i32, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}
