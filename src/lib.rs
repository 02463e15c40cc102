//! # Feedback Context Server
//!
//! A real-time context engine for customer feedback, served to AI agents
//! over the Model Context Protocol (MCP).
//!
//! This crate provides:
//! - **Context registry**: named in-memory tables, each refreshed on its own
//!   timer and swapped atomically so readers never see a partial load
//! - **Feedback tables**: recent feedback, cultural insights, team statistics
//!   and anomaly alerts, loaded from SQL Server
//! - **Tools**: MCP lookups, scans, schemas and table metadata
//! - **Dashboard API**: the same reads as JSON over HTTP (`http` feature)
//!
//! ## Architecture
//!
//! Loaders produce whole tables; the registry owns scheduling, staleness
//! and metrics; transports are thin translations over registry reads.

pub mod config;
pub mod constants;
pub mod context;
pub mod database;
pub mod error;
pub mod feedback;
pub mod server;
pub mod shutdown;
pub mod telemetry;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use context::{ContextRegistry, SharedRegistry};
pub use error::{McpError, ServerError};
pub use server::FeedbackContextServer;
