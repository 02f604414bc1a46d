//! Database models split into domain-specific modules.

pub mod common;
pub mod item;
pub mod user;

pub use common::*;
pub use item::*;
pub use user::*;
