//! Core types for catalog sync.
//!
//! Source records come from the upstream product feed, remote records are what
//! the catalog returns, and payloads are what we write back.

pub mod id;
pub mod payload;
pub mod remote;
pub mod source;

pub use id::*;
pub use payload::*;
pub use remote::*;
pub use source::*;
