#![warn(missing_docs)]
//! In-process key-value backend for lockbox, powered by Moka.
//!
//! Useful for tests and for single-process deployments where every session
//! handler lives in the same address space.

mod backend;
mod builder;

pub use backend::MokaBackend;
pub use builder::MokaBackendBuilder;
