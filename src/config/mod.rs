pub mod env;
mod loader;

pub use env::{AppConfig, ClassifierConfig, DirectoryConfig, FeedConfig, TimingConfig};
pub use loader::load_config;
