//! Minimal RESP wire layer: the [`frame::Frame`] type, an incremental
//! encoder/decoder pair, and the crate error type.
//!
//! The codec is intentionally small. It covers the RESP2 frames a cluster
//! write pipeline actually exchanges; RESP3 push types are out of scope.

pub mod codec;
pub mod error;
pub mod frame;
