//! Core type system and domain definitions
//!
//! Identifiers and policies the sync engine works with: the API servers it
//! talks to, the items and repositories it keeps current, and how each
//! repository's items are displayed.

pub mod item;
pub mod repository;
pub mod server;

pub use item::*;
pub use repository::*;
pub use server::*;
