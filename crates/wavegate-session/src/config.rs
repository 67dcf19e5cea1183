//! Client configuration.
//!
//! Built in code with [`GatewayConfig::new`] and the `with_*` setters, or
//! loaded from the environment with [`GatewayConfig::from_env`]. The token
//! is redacted in `Debug` output.

use std::collections::HashMap;
use std::env;
use std::str::FromStr;
use std::time::Duration;

use rand::Rng;
use wavegate_protocol::{ConnectionProperties, Intents};

use crate::{ConfigError, Token};

/// Default gateway endpoint (API v9, JSON encoding).
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=9&encoding=json";

/// Default REST API base.
pub const DEFAULT_API_BASE: &str = "https://discord.com/api/v9";

/// Default number of consecutive failed reconnects before giving up.
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

const TOKEN_VAR: &str = "WAVEGATE_TOKEN";
const GATEWAY_URL_VAR: &str = "WAVEGATE_GATEWAY_URL";
const INTENTS_VAR: &str = "WAVEGATE_INTENTS";
const MAX_RECONNECTS_VAR: &str = "WAVEGATE_MAX_RECONNECTS";
const API_BASE_VAR: &str = "WAVEGATE_API_BASE";

/// Everything a gateway client needs to open and keep a session.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// The bot credential.
    pub token: Token,

    /// Gateway URL for a fresh Identify. A Resume goes to the
    /// `resume_gateway_url` from READY when one was given.
    pub gateway_url: String,

    /// Event categories to subscribe to (default: 643).
    pub intents: Intents,

    /// Client description sent in Identify.
    pub properties: ConnectionProperties,

    /// Consecutive failed reconnect attempts allowed before the client
    /// stops with `ReconnectExhausted`. The count resets whenever the
    /// session reaches `Active`.
    pub max_reconnect_attempts: u32,

    /// Delay before the first reconnect attempt; doubles per attempt.
    pub reconnect_base_delay: Duration,

    /// Upper bound on the reconnect delay.
    pub reconnect_max_delay: Duration,

    /// REST API base URL.
    pub api_base: String,
}

impl GatewayConfig {
    /// A config with defaults for everything but the token.
    pub fn new(token: Token) -> Self {
        Self {
            token,
            gateway_url: DEFAULT_GATEWAY_URL.to_owned(),
            intents: Intents::default(),
            properties: ConnectionProperties::default(),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_base_delay: Duration::from_secs(1),
            reconnect_max_delay: Duration::from_secs(30),
            api_base: DEFAULT_API_BASE.to_owned(),
        }
    }

    /// Loads configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Loads configuration from a map of variables (for testing).
    ///
    /// `WAVEGATE_TOKEN` is required. `WAVEGATE_GATEWAY_URL`,
    /// `WAVEGATE_INTENTS`, `WAVEGATE_MAX_RECONNECTS`, and
    /// `WAVEGATE_API_BASE` override the defaults.
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let token = vars
            .get(TOKEN_VAR)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(TOKEN_VAR.to_owned()))?;

        let mut config = Self::new(Token::new(token.as_str()));

        if let Some(url) = vars.get(GATEWAY_URL_VAR) {
            if !url.starts_with("ws://") && !url.starts_with("wss://") {
                return Err(invalid(GATEWAY_URL_VAR, url));
            }
            config.gateway_url = url.clone();
        }
        if let Some(bits) = parse_var::<u64>(vars, INTENTS_VAR)? {
            config.intents = Intents::from_bits(bits);
        }
        if let Some(max) = parse_var::<u32>(vars, MAX_RECONNECTS_VAR)? {
            config.max_reconnect_attempts = max;
        }
        if let Some(base) = vars.get(API_BASE_VAR) {
            config.api_base = base.trim_end_matches('/').to_owned();
        }

        Ok(config)
    }

    /// Sets the gateway URL.
    pub fn with_gateway_url(mut self, url: impl Into<String>) -> Self {
        self.gateway_url = url.into();
        self
    }

    /// Sets the intents.
    pub fn with_intents(mut self, intents: Intents) -> Self {
        self.intents = intents;
        self
    }

    /// Sets the reconnect budget.
    pub fn with_max_reconnect_attempts(mut self, max: u32) -> Self {
        self.max_reconnect_attempts = max;
        self
    }

    /// Sets the reconnect backoff bounds.
    pub fn with_reconnect_delay(mut self, base: Duration, max: Duration) -> Self {
        self.reconnect_base_delay = base;
        self.reconnect_max_delay = max.max(base);
        self
    }

    /// Sets the REST API base URL.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    /// Delay before reconnect attempt number `attempt` (1-based).
    ///
    /// Exponential from `reconnect_base_delay`, capped at
    /// `reconnect_max_delay`, plus up to 25% random jitter so a fleet of
    /// clients dropped together does not reconnect in lockstep.
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self
            .reconnect_base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.reconnect_max_delay);
        let jitter_ms = (delay.as_millis() / 4) as u64;
        if jitter_ms == 0 {
            return delay;
        }
        delay + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
    }
}

/// Random 1-5 second pause before re-identifying after a non-resumable
/// invalid session.
pub fn reidentify_delay() -> Duration {
    Duration::from_millis(rand::rng().random_range(1_000..=5_000))
}

fn parse_var<T: FromStr>(
    vars: &HashMap<String, String>,
    name: &str,
) -> Result<Option<T>, ConfigError> {
    vars.get(name)
        .map(|raw| raw.trim().parse::<T>().map_err(|_| invalid(name, raw)))
        .transpose()
}

fn invalid(name: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        name: name.to_owned(),
        value: value.to_owned(),
    }
}
