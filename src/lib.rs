//! Esprof - profiling timings for Elasticsearch HTTP exchanges
//!
//! Completed request/response exchanges are turned into custom timings with
//! a readable diagnostic text and attached to an explicitly passed profiler
//! session.

#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs, clippy::all, clippy::pedantic, clippy::cargo)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::field_reassign_with_default,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod error;
pub mod exchange;
pub mod network;
pub mod profiling;
pub mod recording;

pub use error::{EsprofError, Result};
pub use exchange::{AttemptMetrics, Exchange, ExchangeFailure, RequestMetrics};
pub use profiling::{NodeId, Profiler, ProfilerSession, SessionManager, TimingRecord};
pub use recording::{build_diagnostic_text, ResponseRecorder, ELASTICSEARCH_CATEGORY};
