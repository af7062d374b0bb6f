pub mod item;
pub mod types;

pub use item::{ElementId, FeedItem};
pub use types::{
    ClassificationOutcome, Decision, EpochCause, EpochId, StoreChange, StoreKey, StoreSnapshot,
};
