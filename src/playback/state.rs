use crate::audio::types::MediaError;

use super::resource::{AudioResource, NetworkActivity, Readiness};

/// Decimal places considered when comparing two snapshots for equality.
const TIME_CHECK_PRECISION: i32 = 2;

/// Exactly one status holds at any snapshot instant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaybackStatus {
    /// No source attached.
    Empty,
    /// Source attached, not enough data buffered to play through.
    Loading,
    /// A transport or decode failure.
    Error,
    /// Paused or ended with enough data to play.
    Ready,
    Playing,
}

/// Immutable snapshot of audio playback at one observed instant.
#[derive(Clone, Debug)]
pub struct PlaybackState {
    /// As reported by the resource: `NaN` while unknown, `+inf` for
    /// unbounded streams.
    pub duration: f64,
    pub current_time: f64,
    pub status: PlaybackStatus,
    pub error: Option<MediaError>,
}

impl PlaybackState {
    /// The pre-attachment state.
    pub const EMPTY: PlaybackState = PlaybackState {
        duration: f64::NAN,
        current_time: 0.0,
        status: PlaybackStatus::Empty,
        error: None,
    };

    /// Reads the resource's attributes synchronously and classifies its
    /// status. Precedence, first match wins: error, no source, still
    /// loading, paused/ended, playing.
    pub fn from_resource(resource: &dyn AudioResource) -> Self {
        let error = resource.error();
        let status = if error.is_some() {
            PlaybackStatus::Error
        } else {
            match resource.network_activity() {
                NetworkActivity::NoSource => PlaybackStatus::Empty,
                NetworkActivity::Loading if resource.readiness() < Readiness::EnoughData => {
                    PlaybackStatus::Loading
                }
                _ if resource.is_paused() || resource.has_ended() => PlaybackStatus::Ready,
                _ => PlaybackStatus::Playing,
            }
        };

        PlaybackState {
            duration: resource.duration(),
            current_time: resource.current_time(),
            status,
            error,
        }
    }

    /// True while the duration is pending (`NaN`) or unbounded (`+inf`).
    pub fn is_duration_unknown(&self) -> bool {
        !self.duration.is_finite()
    }

    /// Played fraction in [0, 1]. Returns 0 whenever the duration is
    /// unknown or not positive, never `NaN` or `inf`.
    pub fn progress(&self) -> f64 {
        if self.duration.is_finite() && self.duration > 0.0 {
            self.current_time / self.duration
        } else {
            0.0
        }
    }

    pub fn remaining_time(&self) -> f64 {
        if self.is_duration_unknown() {
            0.0
        } else {
            self.duration - self.current_time
        }
    }

    /// Snapshot equality used to suppress redundant notifications: status
    /// must match and currentTime/duration must agree to 2 decimal places.
    /// An unknown duration only equals another unknown duration.
    pub fn equal(a: &PlaybackState, b: &PlaybackState) -> bool {
        a.status == b.status
            && floats_equal_with_precision(a.current_time, b.current_time)
            && durations_equal(a.duration, b.duration)
    }
}

fn durations_equal(a: f64, b: f64) -> bool {
    match (a.is_finite(), b.is_finite()) {
        (true, true) => floats_equal_with_precision(a, b),
        (false, false) => true,
        _ => false,
    }
}

fn floats_equal_with_precision(a: f64, b: f64) -> bool {
    let multiplier = 10f64.powi(TIME_CHECK_PRECISION);
    (a * multiplier).round() == (b * multiplier).round()
}
