use std::{fmt, net::SocketAddr, time::Duration};

use crate::{
    env_value, server_bind_address, ENV_APP_ENV, ENV_DATABASE_URL, ENV_JWT_EXPIRES_IN,
    ENV_JWT_SECRET,
};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://policy-desk.db?mode=rwc";
pub const DEFAULT_TOKEN_TTL: &str = "7d";

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns the canonical name used for logging/metrics labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Runtime configuration resolved from environment variables.
#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub environment: Environment,
    pub database_url: String,
    pub jwt_secret: Vec<u8>,
    pub token_ttl: Duration,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("environment", &self.environment)
            .field("database_url", &self.database_url)
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = match env_value(ENV_APP_ENV) {
            Some(value) => Environment::from_str(&value)?,
            None => Environment::Development,
        };
        let bind_addr = server_bind_address().map_err(ConfigError::BindAddress)?;
        let database_url =
            env_value(ENV_DATABASE_URL).unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());
        let jwt_secret = env_value(ENV_JWT_SECRET).ok_or(ConfigError::MissingJwtSecret)?;

        let ttl_value =
            env_value(ENV_JWT_EXPIRES_IN).unwrap_or_else(|| DEFAULT_TOKEN_TTL.to_string());
        let token_ttl = parse_duration(&ttl_value)
            .ok_or_else(|| ConfigError::InvalidTokenTtl(ttl_value.clone()))?;

        Ok(Self {
            bind_addr,
            environment,
            database_url,
            jwt_secret: jwt_secret.into_bytes(),
            token_ttl,
        })
    }
}

/// Parses `<n>s`, `<n>m`, `<n>h`, `<n>d`, or bare seconds. Zero is rejected.
pub fn parse_duration(value: &str) -> Option<Duration> {
    let value = value.trim();
    let (digits, unit_secs) = match value.char_indices().last()? {
        (idx, 's') => (&value[..idx], 1),
        (idx, 'm') => (&value[..idx], 60),
        (idx, 'h') => (&value[..idx], 3_600),
        (idx, 'd') => (&value[..idx], 86_400),
        _ => (value, 1),
    };
    let amount: u64 = digits.parse().ok()?;
    let secs = amount.checked_mul(unit_secs)?;
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    BindAddress(std::net::AddrParseError),
    MissingJwtSecret,
    InvalidTokenTtl(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::BindAddress(err) => write!(f, "invalid APP_BIND_ADDR value: {err}"),
            Self::MissingJwtSecret => write!(f, "JWT_SECRET must be set to a non-empty value"),
            Self::InvalidTokenTtl(value) => write!(
                f,
                "JWT_EXPIRES_IN must look like '7d', '12h', '30m', '45s' or a number of seconds (got {value})"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
