//! Configuration and environment selection.
use serde::{Deserialize, Serialize};
use std::{str::FromStr, time::Duration};
use thiserror::Error;

pub const RECEPTION_PATH: &str =
    "/comprobantes-electronicos-ws/RecepcionComprobantesOffline?wsdl";
pub const AUTHORIZATION_PATH: &str =
    "/comprobantes-electronicos-ws/AutorizacionComprobantesOffline?wsdl";
pub const DEFAULT_NUMERIC_CODE: &str = "12345678";
pub const NUMERIC_CODE_LEN: usize = 8;
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// SRI environment (`ambiente`) selection.
/// - Test: the "pruebas" environment, code `1`.
/// - Production: the live environment, code `2`.
///
/// # Examples
/// ```rust
/// use std::str::FromStr;
/// use comprobantes_core::config::Environment;
///
/// let env = Environment::from_str("pruebas")?;
/// assert_eq!(env, Environment::Test);
/// assert_eq!(env.code(), "1");
/// # Ok::<(), comprobantes_core::config::EnvironmentParseError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Test,
    Production,
}

/// Error returned when parsing an [`Environment`] from a string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvironmentParseError {
    #[error("invalid environment: {input}")]
    Invalid { input: String },
}

impl FromStr for Environment {
    type Err = EnvironmentParseError;
    fn from_str(env: &str) -> Result<Environment, EnvironmentParseError> {
        match env.trim().to_ascii_lowercase().as_str() {
            "1" | "pruebas" | "test" => Ok(Environment::Test),
            "2" | "produccion" | "production" => Ok(Environment::Production),
            _ => Err(EnvironmentParseError::Invalid {
                input: env.to_string(),
            }),
        }
    }
}

impl Environment {
    /// Code used in `infoTributaria/ambiente` and in the access key.
    pub fn code(&self) -> &'static str {
        match self {
            Environment::Test => "1",
            Environment::Production => "2",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Test => "pruebas",
            Environment::Production => "produccion",
        }
    }

    pub fn host(&self) -> &'static str {
        match self {
            Environment::Test => "https://celcer.sri.gob.ec",
            Environment::Production => "https://cel.sri.gob.ec",
        }
    }
}

/// Error returned by [`Config::from_env`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Environment(#[from] EnvironmentParseError),
    #[error("invalid call timeout: {input}")]
    InvalidTimeout { input: String },
    #[error("numeric code must be 8 digits: {input:?}")]
    InvalidNumericCode { input: String },
}

/// Per-environment settings handed to a submission workflow.
///
/// # Examples
/// ```rust
/// use std::time::Duration;
/// use comprobantes_core::config::{Config, Environment};
///
/// let config = Config::new(Environment::Test).with_call_timeout(Duration::from_secs(5));
/// assert_eq!(config.host(), "https://celcer.sri.gob.ec");
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    env: Environment,
    host: String,
    numeric_code: String,
    call_timeout: Duration,
}

impl Config {
    pub fn new(env: Environment) -> Self {
        Self {
            env,
            host: env.host().to_string(),
            numeric_code: DEFAULT_NUMERIC_CODE.to_string(),
            call_timeout: DEFAULT_CALL_TIMEOUT,
        }
    }

    /// Reads `SRI_ENVIRONMENT`, `SRI_HOST`, `SRI_NUMERIC_CODE` and
    /// `SRI_CALL_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = match lookup("SRI_ENVIRONMENT") {
            Some(value) => value.parse()?,
            None => Environment::Test,
        };
        let mut config = Config::new(env);
        if let Some(host) = lookup("SRI_HOST").filter(|h| !h.trim().is_empty()) {
            config.host = host.trim_end_matches('/').to_string();
        }
        if let Some(code) = lookup("SRI_NUMERIC_CODE") {
            config = config.with_numeric_code(code)?;
        }
        if let Some(raw) = lookup("SRI_CALL_TIMEOUT_SECS") {
            let secs: u64 = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidTimeout { input: raw.clone() })?;
            config.call_timeout = Duration::from_secs(secs);
        }
        Ok(config)
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Sets the `codigoNumerico` used for generated access keys.
    pub fn with_numeric_code(mut self, code: impl Into<String>) -> Result<Self, ConfigError> {
        let code = code.into();
        if code.len() != NUMERIC_CODE_LEN || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ConfigError::InvalidNumericCode { input: code });
        }
        self.numeric_code = code;
        Ok(self)
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn env(&self) -> Environment {
        self.env
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn reception_url(&self) -> String {
        format!("{}{}", self.host, RECEPTION_PATH)
    }

    pub fn authorization_url(&self) -> String {
        format!("{}{}", self.host, AUTHORIZATION_PATH)
    }

    pub fn numeric_code(&self) -> &str {
        &self.numeric_code
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::new(Environment::Test)
    }
}
