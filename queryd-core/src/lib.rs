//! Cost-aware query-processing pipeline.
//!
//! The [`router::Router`] is the single entry point: it classifies a query,
//! dispatches to the matching tier processor, and returns a [`types::Response`].

pub mod cache;
pub mod capabilities;
pub mod classifier;
pub mod config;
pub mod context;
pub mod error;
pub mod learning;
pub mod mcp;
pub mod prompt;
pub mod registry;
pub mod router;
pub mod tiers;
pub mod types;
pub mod usage_tracker;
pub mod watcher;

pub use config::RouterConfig;
pub use error::QueryDError;
pub use router::{Metrics, Router};
pub use types::{Query, Response};
