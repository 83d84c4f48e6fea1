//! Incremental RESP encoding and decoding.
//!
//! The [`Encoder`] accumulates frames into an internal buffer so a batch
//! of commands can be written to the socket in a single burst; the
//! [`Decoder`] consumes raw bytes and yields complete frames, returning
//! `Ok(None)` while the input is still partial.

mod decoder;
mod encoder;

pub use decoder::Decoder;
pub use encoder::Encoder;
