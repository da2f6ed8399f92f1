//! Fetch pipeline: identity resolution, landing-page probe, artifact
//! download, and durable storage.
//!
//! # Architecture
//!
//! - [`identity`] - Ordered first-match-wins URL pattern table
//! - [`probe`] - Landing-page search for the designated PDF affordance
//! - [`HttpClient`] - Page fetches and streaming artifact downloads
//! - [`RateLimiter`] - Per-host request spacing
//! - [`FetchDispatcher`] - Per-item fetch sequence and the bounded
//!   worker pool over a work set
//!
//! The dispatcher is deliberately retry-free: failed items stay eligible
//! in the next run's work set (idempotent-by-construction retry).

mod client;
mod dispatcher;
mod error;
pub mod identity;
mod limiter;
pub mod probe;

pub use client::{
    CONNECT_TIMEOUT_SECS, HttpClient, PageFetch, READ_TIMEOUT_SECS, default_user_agent,
};
pub use dispatcher::{DEFAULT_CONCURRENCY, DispatchError, FetchDispatcher, FetchStats};
pub use error::FetchError;
pub use identity::{DocumentIdentity, resolve_identity};
pub use limiter::RateLimiter;
pub use probe::{LinkProbe, find_pdf_link};
