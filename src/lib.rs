#![allow(rustdoc::bare_urls)]
//! # Rust client for the FeatureHub SSE API
//!
//! This library is a Rust client SDK for [FeatureHub](https://www.featurehub.io/),
//! the open source feature management platform.
//!
//! It maintains a live, eventually consistent mirror of a FeatureHub edge's
//! feature store by subscribing to its server-sent event stream, and resolves
//! per-request feature values by evaluating layered targeting strategies
//! against a caller-supplied evaluation context.
//!
//! ## License
//!
//! This library is double licensed under the Apache 2.0 and MIT licenses.
//! This means that the user can choose either of the licenses.

/// Analytics event fan-out to pluggable collectors
pub mod analytics;
/// The primary API: a streaming client and its configuration
pub mod client;
/// Types commonly used across SSE payloads and strategy evaluation
pub mod commons;
/// Caller-supplied evaluation context
pub mod context;
/// The SSE frame dispatcher and its lifecycle state machine
pub mod dispatcher;
/// Error
pub mod error;
/// Per-feature change notifiers
pub mod notifiers;
/// SSE payload types
pub mod responses;
/// The replicated feature store
pub mod store;
/// Strategy evaluation and the typed predicate engine
pub mod strategies;
/// The SSE transport: subscription, framing, channel fan-out
pub mod transport;
