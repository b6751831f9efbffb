//! Runtime system
//!
//! This module contains the dataflow primitives: single-assignment cells,
//! tagged task arguments, and the task pool that runs task graphs.

pub mod error;
pub mod ivar;
pub mod scheduler;
pub mod value;

pub use error::{RuntimeError, RuntimeResult};
