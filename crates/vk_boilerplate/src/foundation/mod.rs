//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the boilerplate:
//! - Math types and projection helpers
//! - Logging initialization

pub mod logging;
pub mod math;
