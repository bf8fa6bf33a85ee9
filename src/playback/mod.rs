//! Playback state model, command surface and change subscription.

pub mod monitor;
pub mod resource;
pub mod state;

pub use monitor::{MonitorSubscription, PlaybackMonitor};
pub use resource::{
    AudioResource, EventListener, ListenerId, MediaEvent, NetworkActivity, PlaybackCommands,
    Readiness,
};
pub use state::{PlaybackState, PlaybackStatus};
