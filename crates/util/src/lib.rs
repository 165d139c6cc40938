pub mod config;

use std::{env, net::SocketAddr};

pub use config::{AppConfig, ConfigError, Environment};

pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8080";

pub const ENV_APP_ENV: &str = "APP_ENV";
pub const ENV_BIND_ADDR: &str = "APP_BIND_ADDR";
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_JWT_SECRET: &str = "JWT_SECRET";
pub const ENV_JWT_EXPIRES_IN: &str = "JWT_EXPIRES_IN";

/// Loads `.env` into the process environment if the file exists.
pub fn load_env_file() {
    let _ = dotenvy::dotenv();
}

/// Reads an environment variable, treating unset, non-unicode and blank values alike.
pub fn env_value(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Address for the HTTP listener, from `APP_BIND_ADDR` or [`DEFAULT_BIND_ADDR`].
pub fn server_bind_address() -> Result<SocketAddr, std::net::AddrParseError> {
    env_value(ENV_BIND_ADDR)
        .as_deref()
        .unwrap_or(DEFAULT_BIND_ADDR)
        .parse()
}

#[cfg(test)]
pub(crate) static ENV_GUARD: std::sync::LazyLock<std::sync::Mutex<()>> =
    std::sync::LazyLock::new(|| std::sync::Mutex::new(()));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_bind_address_falls_back_to_default() {
        let _lock = ENV_GUARD.lock().expect("env guard poisoned");
        env::remove_var(ENV_BIND_ADDR);
        assert_eq!(
            server_bind_address().expect("default parses").to_string(),
            DEFAULT_BIND_ADDR
        );

        env::set_var(ENV_BIND_ADDR, "   ");
        assert_eq!(
            server_bind_address().expect("default parses").to_string(),
            DEFAULT_BIND_ADDR
        );
        env::remove_var(ENV_BIND_ADDR);
    }

    #[test]
    fn custom_bind_address_is_trimmed() {
        let _lock = ENV_GUARD.lock().expect("env guard poisoned");
        env::set_var(ENV_BIND_ADDR, " 0.0.0.0:9000 ");
        let addr = server_bind_address().expect("custom address should parse");
        assert_eq!(addr.to_string(), "0.0.0.0:9000");
        env::remove_var(ENV_BIND_ADDR);
    }

    #[test]
    fn malformed_bind_address_is_an_error() {
        let _lock = ENV_GUARD.lock().expect("env guard poisoned");
        env::set_var(ENV_BIND_ADDR, "localhost");
        assert!(server_bind_address().is_err());
        env::remove_var(ENV_BIND_ADDR);
    }
}
