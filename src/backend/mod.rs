//! Backend module - Code emission

pub mod emitter;
pub mod writer;

pub use emitter::{emit, Emitter};
