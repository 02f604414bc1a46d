//! Item lifecycle and access-control engine.
//!
//! Everything in here is independent of HTTP: handlers resolve an actor with
//! [`IdentityResolver`], hand raw form values to [`ItemEngine`], and map the
//! resulting [`EngineError`] onto whatever responses they use.

mod access;
mod attachment;
mod error;
mod identity;
mod lifecycle;
mod search;

pub use access::*;
pub use attachment::*;
pub use error::*;
pub use identity::*;
pub use lifecycle::*;
pub use search::*;
