//! # Servitor Support
//!
//! Shared helpers for the Servitor service container.
//!
//! This crate provides:
//! - Text rendering for error messages (resolution chains, type names)
//! - "Did you mean?" suggestions for unknown service ids

pub mod rendering;
