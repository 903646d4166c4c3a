//! Network layer for esprof
//!
//! Produces exchanges from real HTTP calls and feeds them to the recorder.

mod client;

pub use client::{EsRequest, ProfiledClient};
