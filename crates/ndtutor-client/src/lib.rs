//! HTTP client for the natural-deduction tutor backend.
//!
//! [`ApiClient`] covers every `/api/*` route the tutor uses and implements
//! [`ndtutor_core::RuleApplier`], so a live backend can be plugged straight
//! into the proof-tree reconciliation.

pub mod client;
pub mod config;

pub use client::{ApiClient, ClientError};
pub use config::{ClientConfig, ConfigError};
