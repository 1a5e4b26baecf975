//! In-process broadcast hub

pub mod hub;

pub use hub::{Hub, HubCommand, HubHandle, HubStats, Submission, Verdict};
