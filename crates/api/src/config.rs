//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `3000`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `DATABASE_URL`: Postgres connection string (default: unset, in-memory ledgers)
/// - `DATABASE_MAX_CONNECTIONS`: pool size when `DATABASE_URL` is set (default: `10`)
/// - `RESERVATION_TTL_SECS`: age after which a pending reservation is swept (default: `300`)
/// - `SWEEP_INTERVAL_SECS`: how often the sweep runs (default: `60`)
/// - `SEED_DATA`: insert bootstrap accounts and items into empty ledgers (default: `true`)
/// - `CLEAR_RESERVATIONS_ON_START`: drop every pending reservation at startup
///   (default: `true` for in-memory ledgers, `false` when `DATABASE_URL` is set,
///   since other instances may be mid-transaction on the same database)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub reservation_ttl: Duration,
    pub sweep_interval: Duration,
    pub seed_data: bool,
    pub clear_reservations_on_start: bool,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let clear_reservations_on_start = lookup("CLEAR_RESERVATIONS_ON_START")
            .and_then(|value| parse_flag(&value))
            .unwrap_or(database_url.is_none());

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(&lookup, "PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            database_url,
            database_max_connections: parse_var(&lookup, "DATABASE_MAX_CONNECTIONS")
                .unwrap_or(defaults.database_max_connections),
            reservation_ttl: parse_var::<u64>(&lookup, "RESERVATION_TTL_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.reservation_ttl),
            sweep_interval: parse_var::<u64>(&lookup, "SWEEP_INTERVAL_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.sweep_interval),
            seed_data: lookup("SEED_DATA")
                .and_then(|value| parse_flag(&value))
                .unwrap_or(defaults.seed_data),
            clear_reservations_on_start,
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            database_max_connections: 10,
            reservation_ttl: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
            seed_data: true,
            clear_reservations_on_start: true,
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    lookup(name).and_then(|value| value.trim().parse().ok())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert!(config.database_url.is_none());
        assert_eq!(config.reservation_ttl, Duration::from_secs(300));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert!(config.seed_data);
        assert!(config.clear_reservations_on_start);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_lookup_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "8081"),
            ("DATABASE_URL", "postgres://localhost/ledgers"),
            ("RESERVATION_TTL_SECS", "30"),
            ("SWEEP_INTERVAL_SECS", "5"),
            ("SEED_DATA", "false"),
        ]));
        assert_eq!(config.port, 8081);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/ledgers")
        );
        assert_eq!(config.reservation_ttl, Duration::from_secs(30));
        assert_eq!(config.sweep_interval, Duration::from_secs(5));
        assert!(!config.seed_data);
        assert!(!config.clear_reservations_on_start);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "not-a-port"),
            ("DATABASE_URL", "  "),
            ("RESERVATION_TTL_SECS", "0"),
            ("SWEEP_INTERVAL_SECS", "0"),
            ("SEED_DATA", "maybe"),
        ]));
        assert_eq!(config.port, 3000);
        assert!(config.database_url.is_none());
        assert_eq!(config.reservation_ttl, Duration::from_secs(300));
        assert_eq!(config.sweep_interval, Duration::from_secs(60));
        assert!(config.seed_data);
    }

    #[test]
    fn test_shared_database_keeps_reservations_unless_asked() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "postgres://db/ledgers")]));
        assert!(!config.clear_reservations_on_start);

        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "postgres://db/ledgers"),
            ("CLEAR_RESERVATIONS_ON_START", "true"),
        ]));
        assert!(config.clear_reservations_on_start);

        let config = Config::from_lookup(lookup(&[("CLEAR_RESERVATIONS_ON_START", "off")]));
        assert!(!config.clear_reservations_on_start);
    }
}
