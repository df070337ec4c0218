//! Flowr Engine Library
//!
//! This library provides the core functionality of the Flowr orchestration
//! engine. It is used by both the main binary and integration tests.

/// Configuration management module
pub mod config;

/// Generative collaborator boundary
pub mod generative;

/// Capability adapters for the two worker classes
pub mod adapters;

/// Session state and persistence module
pub mod session;

/// Orchestration core: decomposition, routing, dispatch, merge
pub mod orchestrator;

/// Observability event stream
pub mod events;

/// Telemetry and structured logging
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
