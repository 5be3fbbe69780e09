//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `auth` - Token login, registration and session revalidation
//! - `cart` - Optimistic cart edits with refetch rollback, checkout

pub mod auth;
pub mod cart;
