pub mod bridge;
pub mod persisted;

pub use bridge::PreferenceBridge;
pub use persisted::PersistedStore;
