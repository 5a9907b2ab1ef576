//! Strata Common - Shared types and utilities
//!
//! This crate provides the identifiers, segment position codec, error
//! definitions and configuration shared by all Strata metabase components.

pub mod config;
pub mod error;
pub mod position;
pub mod types;

pub use config::Config;
pub use error::{Error, ErrorClass, Result};
pub use position::SegmentPosition;
pub use types::*;
