//! Core types and utilities for derkit
//!
//! This crate provides the error taxonomy shared by every derkit crate and the
//! constant-time primitive library used by security-sensitive callers.

pub mod constant_time;
pub mod error;

pub use error::{Asn1Error, Asn1Result};
