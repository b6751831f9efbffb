//! Task argument values
//!
//! This module provides the tagged, type-erased argument representation used
//! by task descriptors, and the conversions between it and ordinary Rust
//! values.

pub mod arg_value;
pub mod params;

pub use arg_value::{ArgType, ArgValue, FloatWidth, IntWidth, TaskArg};
pub use params::{ArgSlot, FromParams, Params, Unpacker};
