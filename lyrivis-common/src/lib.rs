//! lyrivis-common - shared types for the lyrivis services
//!
//! Holds the workspace-wide error type and configuration resolution
//! (root folder + service TOML file).

pub mod config;
pub mod error;

pub use error::{Error, Result};
