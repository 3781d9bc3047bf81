//! Core types and traits for MuslimGPT
//!
//! This crate provides the message store, the derived session registry,
//! the per-conversation session context, configuration and logging used by
//! the other MuslimGPT crates.

pub mod config;
pub mod error;
pub mod logging;
pub mod session;
pub mod store;
pub mod utils;

pub use error::{Error, Result};
