//! Voice-message playback widget for [iced].
//!
//! Renders an amplitude peaks bar with click/drag seeking, a play/pause
//! toggle and a time readout for an audio source supplied as raw bytes.
//! The playback model observes an [`AudioResource`] and commands it
//! through a small guarded surface; a cpal-backed [`AudioEngine`] is
//! bundled as the default resource, and hosts with their own playback
//! stack can implement the trait instead.
//!
//! ```no_run
//! use voicemail_player::player::VoicemailPlayer;
//! use voicemail_player::ui::BarGeometry;
//!
//! let (mut player, _boot) = VoicemailPlayer::new(BarGeometry::default());
//! player.set_source(std::fs::read("voicemail.mp3").unwrap(), Some("mp3".into()));
//! ```
//!
//! [iced]: https://docs.rs/iced
//! [`AudioResource`]: playback::AudioResource
//! [`AudioEngine`]: audio::AudioEngine

pub mod audio;
pub mod peaks;
pub mod playback;
pub mod player;
pub mod ui;

pub use audio::{AudioData, AudioEngine, MediaError, MediaErrorKind};
pub use peaks::{extract_peaks, Peak, PeakCache};
pub use playback::{
    AudioResource, PlaybackCommands, PlaybackMonitor, PlaybackState, PlaybackStatus,
};
pub use player::VoicemailPlayer;
pub use ui::{BarAlignment, BarGeometry, PeaksBar, PeaksBarEvent};
