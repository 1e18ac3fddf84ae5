//! CLI command implementations

pub mod config;
pub mod decode;
pub mod extract;
pub mod lookup;
pub mod scan;
