use std::sync::Arc;

use crate::audio::types::MediaError;

/// Network-side activity of a media handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NetworkActivity {
    /// No source has been attached at all.
    NoSource,
    /// A source is attached and no transfer is in flight.
    Idle,
    /// Bytes are being fetched or decoded.
    Loading,
}

/// How much of the attached source is available for playback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Readiness {
    Nothing,
    Metadata,
    EnoughData,
}

/// The fixed set of notifications a resource emits. The subscription
/// adapter listens to all of them; consumers never need to tell them apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaEvent {
    LoadStart,
    LoadedMetadata,
    CanPlayThrough,
    Play,
    Pause,
    Ended,
    TimeUpdate,
    DurationChange,
    Error,
    Abort,
}

/// Identifies one registered listener so it can be removed later.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

pub type EventListener = Arc<dyn Fn(MediaEvent) + Send + Sync>;

/// A host-provided playable media handle.
///
/// This system never creates or tears one down; it only reads attributes,
/// issues command requests and registers change listeners. The bundled
/// [`AudioEngine`](crate::audio::engine::AudioEngine) is one implementation;
/// hosts with their own playback stack can supply another.
pub trait AudioResource: Send + Sync {
    /// Current playback position in seconds.
    fn current_time(&self) -> f64;

    /// Duration in seconds. `NaN` while unknown, `+inf` for unbounded
    /// streams; callers must not conflate either with zero.
    fn duration(&self) -> f64;

    fn is_paused(&self) -> bool;
    fn has_ended(&self) -> bool;
    fn network_activity(&self) -> NetworkActivity;
    fn readiness(&self) -> Readiness;
    fn error(&self) -> Option<MediaError>;

    /// Request playback to begin or resume. A resource that has reached
    /// end-of-media restarts from position 0.
    fn request_play(&self);

    /// Request playback to suspend at the current position. Idempotent.
    fn request_pause(&self);

    /// Move the playback position. Implementations clamp to the media
    /// bounds; validity guards live in [`PlaybackCommands::seek`].
    fn set_position(&self, seconds: f64);

    fn add_listener(&self, listener: EventListener) -> ListenerId;
    fn remove_listener(&self, id: ListenerId);
}

/// Thin imperative command surface over a shared resource.
///
/// All guards against invalid input live here so no caller can push an
/// undefined position into the resource.
#[derive(Clone)]
pub struct PlaybackCommands {
    resource: Arc<dyn AudioResource>,
}

impl PlaybackCommands {
    pub fn new(resource: Arc<dyn AudioResource>) -> Self {
        Self { resource }
    }

    pub fn play(&self) {
        self.resource.request_play();
    }

    pub fn pause(&self) {
        self.resource.request_pause();
    }

    /// Seek to `target_seconds`, clamped to `[0, duration]`.
    ///
    /// Silently ignored when the target is not finite or the duration is
    /// unknown; seeking is undefined without a bounded duration.
    pub fn seek(&self, target_seconds: f64) {
        if !target_seconds.is_finite() {
            log::debug!("ignoring seek to non-finite position {target_seconds}");
            return;
        }
        let duration = self.resource.duration();
        if !duration.is_finite() {
            log::debug!("ignoring seek: duration is unknown");
            return;
        }
        self.resource.set_position(target_seconds.clamp(0.0, duration));
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::MockResource;
    use super::*;

    fn commands(resource: MockResource) -> (Arc<MockResource>, PlaybackCommands) {
        let resource = Arc::new(resource);
        let commands = PlaybackCommands::new(resource.clone());
        (resource, commands)
    }

    #[test]
    fn play_and_pause_are_forwarded() {
        let (resource, commands) = commands(MockResource::playing(60.0, 0.0));
        commands.play();
        commands.pause();
        commands.pause();
        assert_eq!(*resource.play_requests.lock().unwrap(), 1);
        assert_eq!(*resource.pause_requests.lock().unwrap(), 2);
    }

    #[test]
    fn seek_sets_clamped_position() {
        let (resource, commands) = commands(MockResource::playing(60.0, 0.0));
        commands.seek(42.0);
        commands.seek(-5.0);
        commands.seek(1000.0);
        assert_eq!(*resource.seeks.lock().unwrap(), vec![42.0, 0.0, 60.0]);
    }

    #[test]
    fn seek_ignores_non_finite_targets() {
        let (resource, commands) = commands(MockResource::playing(60.0, 0.0));
        commands.seek(f64::NAN);
        commands.seek(f64::INFINITY);
        commands.seek(f64::NEG_INFINITY);
        assert!(resource.seeks.lock().unwrap().is_empty());
    }

    #[test]
    fn seek_ignores_unknown_duration() {
        let mut mock = MockResource::playing(f64::NAN, 0.0);
        mock.duration = f64::NAN;
        let (resource, commands) = commands(mock);
        commands.seek(42.0);
        assert!(resource.seeks.lock().unwrap().is_empty());

        let mut mock = MockResource::playing(0.0, 0.0);
        mock.duration = f64::INFINITY;
        let (resource, commands) = self::commands(mock);
        commands.seek(42.0);
        assert!(resource.seeks.lock().unwrap().is_empty());
    }
}
