//! # Opus Common Library
//!
//! Shared code for the Opus service:
//! - Database schema, models and initialization
//! - Event types (OpusEvent enum) and EventBus
//! - Configuration loading
//! - Common error type

pub mod config;
pub mod db;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{EventBus, OpusEvent};
