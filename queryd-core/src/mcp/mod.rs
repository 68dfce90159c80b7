//! The MCP (multi-capability provider) execution layer (spec §4.2, C2).

pub mod executor;

pub use executor::McpExecutor;
