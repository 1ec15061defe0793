//! # cleanview Common Library
//!
//! Shared code for the cleanview engine and command-line tool:
//! - Time interval value type and interval algebra
//! - Error types
//! - Configuration file resolution and atomic writes
//! - Human-readable time formatting
//! - Fast media fingerprints

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod human_time;
pub mod interval;

pub use error::{Error, Result};
pub use interval::{Action, MatchSource, TimeInterval};
