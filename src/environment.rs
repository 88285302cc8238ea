use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use tokio::time::Duration;

pub const DEFAULT_DATABASE_PATH: &str = "dailyread.db";
pub const DEFAULT_CONCURRENCY: usize = 10;
pub const DEFAULT_INTERVAL_SECS: u64 = 12 * 60 * 60;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {var} has invalid value {value:?}")]
    Invalid { var: &'static str, value: String },
    #[error("environment variable {var} must be greater than zero")]
    NotPositive { var: &'static str },
}

/// Runtime settings for the scraper, read from the process environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub database_path: String,
    pub concurrency: usize,
    pub interval: Duration,
    pub aliases_path: Option<PathBuf>,
}

impl Config {
    /// Reads `DATABASE_PATH`, `SCRAPE_CONCURRENCY`, `SCRAPE_INTERVAL_SECS` and
    /// `FEED_ALIASES_PATH`, falling back to defaults for anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| env::var(var).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_path = lookup("DATABASE_PATH")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DATABASE_PATH.to_string());

        let concurrency: usize =
            parse_positive(&lookup, "SCRAPE_CONCURRENCY", DEFAULT_CONCURRENCY)?;
        let interval_secs: u64 =
            parse_positive(&lookup, "SCRAPE_INTERVAL_SECS", DEFAULT_INTERVAL_SECS)?;

        let aliases_path = lookup("FEED_ALIASES_PATH")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);

        Ok(Config {
            database_path,
            concurrency,
            interval: Duration::from_secs(interval_secs),
            aliases_path,
        })
    }
}

fn parse_positive<F, T>(lookup: &F, var: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialEq + Default,
{
    let Some(raw) = lookup(var) else {
        return Ok(default);
    };
    let value = raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid {
        var,
        value: raw.clone(),
    })?;
    if value == T::default() {
        return Err(ConfigError::NotPositive { var });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.database_path, DEFAULT_DATABASE_PATH);
        assert_eq!(config.concurrency, DEFAULT_CONCURRENCY);
        assert_eq!(config.interval, Duration::from_secs(43_200));
        assert!(config.aliases_path.is_none());
    }

    #[test]
    fn test_reads_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_PATH", "/tmp/feeds.db"),
            ("SCRAPE_CONCURRENCY", " 3 "),
            ("SCRAPE_INTERVAL_SECS", "60"),
            ("FEED_ALIASES_PATH", "aliases.json"),
        ]))
        .unwrap();
        assert_eq!(config.database_path, "/tmp/feeds.db");
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.interval, Duration::from_secs(60));
        assert_eq!(config.aliases_path, Some(PathBuf::from("aliases.json")));
    }

    #[test]
    fn test_rejects_zero_and_garbage() {
        assert_eq!(
            Config::from_lookup(lookup_from(&[("SCRAPE_CONCURRENCY", "0")])),
            Err(ConfigError::NotPositive {
                var: "SCRAPE_CONCURRENCY"
            })
        );
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("SCRAPE_INTERVAL_SECS", "soon")])),
            Err(ConfigError::Invalid { .. })
        ));
    }
}
