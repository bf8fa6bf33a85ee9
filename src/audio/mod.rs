//! Bundled audio backend: decoding and a cpal-based [`AudioResource`]
//! implementation.
//!
//! [`AudioResource`]: crate::playback::AudioResource

pub mod decoder;
pub mod engine;
pub mod types;

pub use engine::AudioEngine;
pub use types::{AudioData, MediaError, MediaErrorKind};
