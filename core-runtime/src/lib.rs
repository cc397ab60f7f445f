//! # Core Runtime Module
//!
//! Foundational runtime infrastructure shared by every core crate:
//! - Logging and tracing bootstrap
//! - Configuration builder and photo search settings
//! - Event bus carrying store changes and album fetch lifecycle

pub mod config;
pub mod error;
pub mod events;
pub mod logging;

pub use error::{Error, Result};
