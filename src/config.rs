use std::{collections::HashMap, time::Duration};

use config::{Config as ConfigLib, ConfigError, Environment};

/// Fallback applied to each timeout knob when it is unset or unusable
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 60_000;

/// HTTP timeouts for CRL retrieval, read from the environment.
///
/// `CRL_CONNECT_TIMEOUT_MS` and `CRL_READ_TIMEOUT_MS` are consulted on
/// every fetch rather than captured at startup, so changes take effect
/// for the next request. Each knob falls back to 60 s independently when
/// unset or not a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTimeouts {
    pub connect: Duration,
    pub read: Duration,
}

impl Default for FetchTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
            read: Duration::from_millis(DEFAULT_FETCH_TIMEOUT_MS),
        }
    }
}

impl FetchTimeouts {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let mut builder = ConfigLib::builder();

        // If env_vars is provided, we use it instead of system environment
        // This is to avoid systems variables pollution across tests
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            // Use system environment variables
            // Should be in the format CRL_CONNECT_TIMEOUT_MS / CRL_READ_TIMEOUT_MS
            builder = builder.add_source(Environment::with_prefix("CRL").prefix_separator("_"));
        }

        let settings = builder.build()?;
        Ok(Self {
            connect: timeout_from(&settings, "connect_timeout_ms"),
            read: timeout_from(&settings, "read_timeout_ms"),
        })
    }
}

fn timeout_from(settings: &ConfigLib, key: &str) -> Duration {
    let millis = settings
        .get_int(key)
        .ok()
        .and_then(|raw| u64::try_from(raw).ok())
        .unwrap_or(DEFAULT_FETCH_TIMEOUT_MS);
    Duration::from_millis(millis)
}
