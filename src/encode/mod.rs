//! Encoder and multiplexer seams.
//!
//! The render session drives these traits in timeline order; `ffmpeg` implementations produce
//! the final MP4, in-memory ones back the tests.

/// `ffmpeg`-based encoders and muxer (system `ffmpeg` binary).
pub mod ffmpeg;
/// Encoder traits and in-memory implementations.
pub mod sink;
