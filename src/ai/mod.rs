pub mod client;
pub mod inference;

pub use client::{Classifier, FilterClient};
pub use inference::ClassifyError;
