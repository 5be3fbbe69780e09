//! Domain models for the storefront.

pub mod cart;
pub mod catalog;
pub mod session;

pub use cart::{CartError, CartLine, CartSnapshot};
pub use session::{SessionUser, keys as session_keys};
