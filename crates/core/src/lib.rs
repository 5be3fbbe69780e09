//! Soko Core - Shared domain types.
//!
//! This crate provides the types shared by the storefront and its tests:
//! - typed backend IDs
//! - decimal prices that tolerate both string and number encodings
//! - cart quantities that can never be zero
//! - validated email addresses and order statuses
//!
//! # Architecture
//!
//! The core crate contains only types and pure logic - no I/O, no HTTP
//! clients. Everything that talks to the Soko backend lives in
//! `soko-storefront`.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
