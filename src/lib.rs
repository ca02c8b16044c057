//! Profile-scoped snapshot capture/restore.
//!
//! Named profiles each hold an ordered set of named snapshots of external
//! system state. The state itself is an opaque payload supplied by a
//! [`provider::StateProvider`]; this crate only stores it, lists it, and
//! pushes it back out.

pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod provider;
pub mod registry;
pub mod store;
pub mod surface;

pub use error::{Error, Result};
