//! Shared traits and helper types reused across the `queryd` workspace.
//!
//! These types intentionally have no knowledge of the query-processing
//! pipeline in `queryd-core` so that the pipeline can be tested without
//! pulling in a concrete logging backend, error reporter, or workspace
//! layout.

pub mod errors;
pub mod paths;
pub mod telemetry;
pub mod tokens;
pub mod usage;

pub use errors::{DisplayErrorFormatter, ErrorFormatter, ErrorReporter, NoopErrorReporter};
pub use paths::{StaticWorkspacePaths, WorkspacePaths, ensure_within_workspace, is_relevant_change};
pub use telemetry::{NoopTelemetry, TelemetrySink};
pub use tokens::estimate_tokens;
pub use usage::Usage;
