//! Core utilities for the pantry scanner
//!
//! This crate provides shared functionality used by the scanner, the lookup
//! chain and the CLI:
//!
//! - **Error handling**: Structured errors with codes, context, and remediation suggestions
//! - **Configuration**: TOML-based configuration with defaults and validation
//! - **Resilience**: Backoff schedules and a circuit breaker for flaky providers
//!
//! # Example
//!
//! ```rust,no_run
//! use pantry_core::config::Config;
//!
//! let config = Config::load(None).expect("invalid configuration");
//! println!("polling every {:?}", config.schema.barcode.poll_interval());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod retry;

pub use error::{Error, ErrorCode, Result, ResultExt};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{Config, ConfigSchema};
    pub use crate::error::{exit_codes, Error, ErrorCode, Result, ResultExt};
    pub use crate::retry::{CircuitBreaker, CircuitBreakerConfig, CircuitState, RetryConfig};
}
