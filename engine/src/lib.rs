//! Ludo Engine Library
//!
//! Core of the Ludo voice assistant: turns classified game requests
//! into device commands for a remote game-launching appliance, over an
//! asynchronous push-style transport. This library is used by the main
//! binary and integration tests.

/// Configuration management module
pub mod config;

/// Run-level error types
pub mod errors;

/// Correlation table for in-flight device commands
pub mod correlation;

/// Batch (generation) tracking for multi-step searches
pub mod batch;

/// Sequential search execution and result aggregation
pub mod search;

/// Per-intent decision strategies
pub mod strategy;

/// Orchestration coordinator and execution context
pub mod coordinator;

/// Decision oracle abstraction (external classification/selection)
pub mod oracle;

/// Device command boundary and WebSocket link
pub mod device;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;
