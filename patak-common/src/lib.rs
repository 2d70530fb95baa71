//! # Patak Common Library
//!
//! Shared code for the Patak metering services including:
//! - Domain models (readings, house summaries, payments, billing periods)
//! - The residential tariff calculator
//! - Event types for the real-time stream
//! - Configuration loading
//! - Error and timestamp utilities

pub mod config;
pub mod error;
pub mod events;
pub mod models;
pub mod sse;
pub mod tariff;
pub mod time;

pub use error::{Error, Result};
pub use tariff::compute_bill;
