use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub classifier: ClassifierConfig,
    pub feed: FeedConfig,
    pub timing: TimingConfig,
    pub directories: DirectoryConfig,
    pub logging: LoggingConfig,
    pub snapshot_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    pub endpoint_url: String,
    pub request_timeout: Option<Duration>,
    pub max_in_flight: usize,
}

#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub host: String,
    pub root_paths: Vec<String>,
    pub gate_quorum: usize,
}

#[derive(Debug, Clone)]
pub struct TimingConfig {
    pub initial_scan_delay: Duration,
    pub scan_interval: Duration,
    pub gate_message_interval: Duration,
    pub navigation_poll: Duration,
    pub store_poll: Duration,
}

#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub logs_dir: String,
    pub data_dir: String,
    pub store_filename: String,
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: String,
}

impl FeedConfig {
    pub fn is_root_path(&self, path: &str) -> bool {
        self.root_paths.iter().any(|root| root == path)
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            host: "www.youtube.com".to_string(),
            root_paths: vec!["/".to_string(), "/feed/trending".to_string()],
            gate_quorum: 10,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            initial_scan_delay: Duration::from_millis(3_000),
            scan_interval: Duration::from_millis(5_000),
            gate_message_interval: Duration::from_millis(2_000),
            navigation_poll: Duration::from_millis(500),
            store_poll: Duration::from_millis(1_000),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}
