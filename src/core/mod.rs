// src/core/mod.rs

// The `core` module holds everything that talks to the scanning engine or
// interprets what it returns. The HTTP surface in `api` is a thin layer on top.

/// Data structures shared across the pipeline: targets, job handles,
/// findings, and the triaged result.
pub mod models;

/// The failure taxonomy for engine calls and scan runs.
pub mod error;

/// Static table of the engine actions in use.
pub mod engine_api;

/// Retry-wrapped HTTP access to the engine.
pub mod client;

/// The scan phases and the orchestrator that chains them.
pub mod scanner;
