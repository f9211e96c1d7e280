//! Tealtree Core - Shared types library.
//!
//! This crate provides common types used across all Tealtree components:
//! - `client` - Client-resident session, cart, rate limiter and route guard
//! - `cli` - Command-line tools for inspecting and driving client state
//!
//! # Architecture
//!
//! The core crate contains only types and traits - no I/O, no storage access,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices and roles

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
