//! Feed filter: scans a video feed, classifies each item against the user's
//! preferences through a remote endpoint, and dims the items it should hide.

pub mod ai;
pub mod app;
pub mod config;
pub mod domain;
pub mod feed;
pub mod infrastructure;
pub mod page;
pub mod store;
pub mod tasks;
