use std::{env, time::Duration};

use url::Url;

use super::env::{
    AppConfig, ClassifierConfig, ConfigError, DirectoryConfig, FeedConfig, LoggingConfig,
    TimingConfig,
};

pub fn load_config() -> Result<AppConfig, ConfigError> {
    AppConfig::from_env()
}

impl AppConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let endpoint_url = env::var("FILTER_ENDPOINT_URL")
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or(ConfigError::Missing("FILTER_ENDPOINT_URL"))?;
        if Url::parse(&endpoint_url).is_err() {
            return Err(ConfigError::Invalid {
                key: "FILTER_ENDPOINT_URL",
                value: endpoint_url,
            });
        }

        let classifier = ClassifierConfig {
            endpoint_url,
            request_timeout: parse_u64("FILTER_REQUEST_TIMEOUT_MS").map(Duration::from_millis),
            max_in_flight: parse_u64("MAX_IN_FLIGHT")
                .map(|v| v.max(1) as usize)
                .unwrap_or(16),
        };

        let defaults = FeedConfig::default();
        let feed = FeedConfig {
            host: env::var("FEED_HOST").unwrap_or(defaults.host),
            root_paths: env::var("FEED_ROOT_PATHS")
                .map(|value| split_list(&value))
                .ok()
                .filter(|paths| !paths.is_empty())
                .unwrap_or(defaults.root_paths),
            gate_quorum: parse_u64("GATE_QUORUM")
                .map(|v| v as usize)
                .unwrap_or(defaults.gate_quorum),
        };

        let defaults = TimingConfig::default();
        let timing = TimingConfig {
            initial_scan_delay: parse_millis("INITIAL_SCAN_DELAY_MS")
                .unwrap_or(defaults.initial_scan_delay),
            scan_interval: parse_millis("SCAN_INTERVAL_MS").unwrap_or(defaults.scan_interval),
            gate_message_interval: parse_millis("GATE_MESSAGE_INTERVAL_MS")
                .unwrap_or(defaults.gate_message_interval),
            navigation_poll: parse_millis("NAVIGATION_POLL_MS")
                .unwrap_or(defaults.navigation_poll),
            store_poll: parse_millis("STORE_POLL_MS").unwrap_or(defaults.store_poll),
        };

        let directories = DirectoryConfig {
            logs_dir: env::var("LOGS_DIR").unwrap_or_else(|_| "logs".to_string()),
            data_dir: env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            store_filename: env::var("STORE_FILENAME")
                .unwrap_or_else(|_| "store.json".to_string()),
        };

        let logging = LoggingConfig {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        };

        let snapshot_path = env::var("SNAPSHOT_PATH").ok().filter(|v| !v.is_empty());

        Ok(Self {
            classifier,
            feed,
            timing,
            directories,
            logging,
            snapshot_path,
        })
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(|part| part.trim().to_string())
        .filter(|part| !part.is_empty())
        .collect()
}

fn parse_u64(key: &str) -> Option<u64> {
    env::var(key)
        .ok()
        .and_then(|value| value.trim().parse::<u64>().ok())
}

// Zero-length periods would spin the event loop.
fn parse_millis(key: &str) -> Option<Duration> {
    parse_u64(key).filter(|v| *v > 0).map(Duration::from_millis)
}
