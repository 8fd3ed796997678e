//! Runtime settings read from the environment (and `.env`).

use anyhow::{Context, Result};
use std::time::Duration;

pub const DEFAULT_VEHICLES_URL: &str =
    "https://retro.umoiq.com/service/publicXMLFeed?command=vehicleLocations&a=ttc&t=0";
pub const DEFAULT_ROUTES_URL: &str = "https://retro.umoiq.com/service/publicXMLFeed?command=routeList&a=ttc";

#[derive(Debug, Clone)]
pub struct Config {
    pub vehicles_url: String,
    pub routes_url: String,
    pub http_timeout: Duration,
    pub http_connect_timeout: Duration,
    pub data_dir: String,
    pub s3_bucket: Option<String>,
    pub s3_key_prefix: String,
    pub record_prefix: String,
    pub routes_prefix: String,
    pub listen_address: String,
    pub trigger_path: String,
    pub current_signing_key: Option<String>,
    pub next_signing_key: Option<String>,
    pub bearer_token: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source. Empty values
    /// count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let or = |name: &str, default: &str| var(name).unwrap_or_else(|| default.to_string());
        let secs = |name: &str, default: u64| -> Result<Duration> {
            match var(name) {
                Some(v) => v
                    .trim()
                    .parse()
                    .map(Duration::from_secs)
                    .with_context(|| format!("{name} must be a whole number of seconds, got {v:?}")),
                None => Ok(Duration::from_secs(default)),
            }
        };

        let mut trigger_path = or("TRIGGER_PATH", "/api/collect");
        if !trigger_path.starts_with('/') {
            trigger_path.insert(0, '/');
        }

        Ok(Self {
            vehicles_url: or("FEED_VEHICLES_URL", DEFAULT_VEHICLES_URL),
            routes_url: or("FEED_ROUTES_URL", DEFAULT_ROUTES_URL),
            http_timeout: secs("HTTP_TIMEOUT_SECS", 30)?,
            http_connect_timeout: secs("HTTP_CONNECT_TIMEOUT_SECS", 10)?,
            data_dir: or("DATA_DIR", "data"),
            s3_bucket: var("S3_BUCKET"),
            s3_key_prefix: or("S3_KEY_PREFIX", ""),
            record_prefix: or("RECORD_FILE_PREFIX", "speeds"),
            routes_prefix: or("ROUTES_FILE_PREFIX", "routes"),
            listen_address: or("LISTEN_ADDRESS", "0.0.0.0:8080"),
            trigger_path,
            current_signing_key: var("TRIGGER_CURRENT_SIGNING_KEY"),
            next_signing_key: var("TRIGGER_NEXT_SIGNING_KEY"),
            bearer_token: var("TRIGGER_BEARER_TOKEN"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.vehicles_url, DEFAULT_VEHICLES_URL);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.data_dir, "data");
        assert_eq!(config.s3_bucket, None);
        assert_eq!(config.trigger_path, "/api/collect");
        assert_eq!(config.record_prefix, "speeds");
        assert!(config.bearer_token.is_none());
    }

    #[test]
    fn test_overrides_and_blank_values() {
        let config = config(&[
            ("S3_BUCKET", "transit-speeds"),
            ("HTTP_TIMEOUT_SECS", " 5 "),
            ("TRIGGER_PATH", "collect"),
            ("TRIGGER_BEARER_TOKEN", "  "),
        ])
        .unwrap();

        assert_eq!(config.s3_bucket.as_deref(), Some("transit-speeds"));
        assert_eq!(config.http_timeout, Duration::from_secs(5));
        assert_eq!(config.trigger_path, "/collect");
        assert!(config.bearer_token.is_none());
    }

    #[test]
    fn test_bad_timeout_is_an_error() {
        assert!(config(&[("HTTP_TIMEOUT_SECS", "soon")]).is_err());
    }
}
