use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use iced::widget::column;
use iced::{Element, Subscription, Task};

use crate::audio::engine::AudioEngine;
use crate::audio::types::MediaError;
use crate::playback::{
    MonitorSubscription, PlaybackCommands, PlaybackMonitor, PlaybackState,
};
use crate::ui::controls::{self, ControlMessage};
use crate::ui::peaks_bar::{BarGeometry, PeaksBar, PeaksBarEvent};

/// How often the UI drains pending change notifications. Notifications
/// arriving between ticks coalesce into one snapshot refresh; the refresh
/// always reads the latest state.
const TICK_INTERVAL: std::time::Duration = std::time::Duration::from_millis(100);

#[derive(Clone)]
pub enum Message {
    EngineReady(Result<Arc<AudioEngine>, String>),
    Control(ControlMessage),
    PeaksBar(PeaksBarEvent),
    Tick,
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::EngineReady(Ok(_)) => write!(f, "EngineReady(Ok)"),
            Message::EngineReady(Err(e)) => write!(f, "EngineReady(Err({e:?}))"),
            Message::Control(m) => write!(f, "Control({m:?})"),
            Message::PeaksBar(e) => write!(f, "PeaksBar({e:?})"),
            Message::Tick => write!(f, "Tick"),
        }
    }
}

/// The composed playback widget: engine, state monitor, peaks bar and
/// transport controls wired together. Embed it by mapping its `Message`
/// into the host application's message type and forwarding `update`,
/// `view` and `subscription`.
pub struct VoicemailPlayer {
    engine: Option<Arc<AudioEngine>>,
    commands: Option<PlaybackCommands>,
    monitor: PlaybackMonitor,
    snapshot: Arc<PlaybackState>,
    peaks_bar: PeaksBar,
    /// Set by the change listener, drained on tick.
    dirty: Arc<AtomicBool>,
    /// Held for its drop-side unsubscription.
    _change_listener: Option<MonitorSubscription>,
    /// Bytes handed over before the engine finished starting.
    pending_source: Option<(Vec<u8>, Option<String>)>,
    /// Sample data has been handed to the peaks bar for the current source.
    peaks_attached: bool,
    startup_error: Option<String>,
}

impl VoicemailPlayer {
    /// Create the player and the task that boots the audio engine.
    pub fn new(geometry: BarGeometry) -> (Self, Task<Message>) {
        let player = Self {
            engine: None,
            commands: None,
            monitor: PlaybackMonitor::new(),
            snapshot: Arc::new(PlaybackState::EMPTY),
            peaks_bar: PeaksBar::new(geometry),
            dirty: Arc::new(AtomicBool::new(false)),
            _change_listener: None,
            pending_source: None,
            peaks_attached: false,
            startup_error: None,
        };

        let boot = Task::perform(
            async {
                tokio::task::spawn_blocking(AudioEngine::spawn)
                    .await
                    .map_err(|e| e.to_string())?
            },
            Message::EngineReady,
        );

        (player, boot)
    }

    /// Current playback snapshot (for hosts that render their own chrome).
    pub fn playback(&self) -> &PlaybackState {
        &self.snapshot
    }

    /// Attach a new audio source from raw compressed bytes. Fetching the
    /// bytes is the host's concern.
    pub fn set_source(&mut self, bytes: Vec<u8>, extension: Option<String>) {
        self.peaks_attached = false;
        self.peaks_bar.set_audio(None);
        self.peaks_bar.set_progress(0.0);
        match &self.engine {
            Some(engine) => engine.set_source(bytes, extension),
            None => self.pending_source = Some((bytes, extension)),
        }
        self.dirty.store(true, Ordering::Relaxed);
    }

    /// Surface a failure from the host's byte transport as the error state.
    pub fn report_transport_error(&mut self, message: impl Into<String>) {
        if let Some(engine) = &self.engine {
            engine.report_transport_error(MediaError::transport(message));
            self.dirty.store(true, Ordering::Relaxed);
        } else {
            self.startup_error = Some(message.into());
        }
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        match message {
            Message::EngineReady(Ok(engine)) => {
                self.monitor.attach(engine.clone());
                let dirty = self.dirty.clone();
                self._change_listener = Some(self.monitor.subscribe(move || {
                    dirty.store(true, Ordering::Relaxed);
                }));
                self.commands = Some(PlaybackCommands::new(engine.clone()));
                if let Some((bytes, extension)) = self.pending_source.take() {
                    engine.set_source(bytes, extension);
                }
                self.engine = Some(engine);
                self.dirty.store(true, Ordering::Relaxed);
                Task::none()
            }
            Message::EngineReady(Err(error)) => {
                log::error!("audio engine failed to start: {error}");
                self.startup_error = Some(error);
                Task::none()
            }
            Message::Control(ControlMessage::Play) => {
                if let Some(commands) = &self.commands {
                    commands.play();
                }
                Task::none()
            }
            Message::Control(ControlMessage::Pause) => {
                if let Some(commands) = &self.commands {
                    commands.pause();
                }
                Task::none()
            }
            Message::PeaksBar(PeaksBarEvent::Seek(relative)) => {
                // seek() ignores the unknown-duration case on its own
                if let Some(commands) = &self.commands {
                    commands.seek(relative as f64 * self.snapshot.duration);
                }
                self.dirty.store(true, Ordering::Relaxed);
                Task::none()
            }
            Message::Tick => {
                if self.dirty.swap(false, Ordering::Relaxed) {
                    self.refresh();
                }
                Task::none()
            }
        }
    }

    fn refresh(&mut self) {
        let next = self.monitor.snapshot();
        if !Arc::ptr_eq(&next, &self.snapshot) {
            self.peaks_bar.set_progress(next.progress() as f32);
            self.snapshot = next;
        }

        if !self.peaks_attached {
            if let Some(data) = self.engine.as_ref().and_then(|e| e.sample_data()) {
                self.peaks_bar.set_audio(Some(data));
                self.peaks_attached = true;
            }
        }
    }

    pub fn view(&self) -> Element<'_, Message> {
        let controls: Element<'_, Message> = match &self.startup_error {
            Some(error) => iced::widget::text(format!("Audio unavailable: {error}"))
                .size(14)
                .color(iced::Color::from_rgb(1.0, 0.3, 0.3))
                .into(),
            None => controls::view_controls(&self.snapshot).map(Message::Control),
        };

        let bar = self.peaks_bar.view().map(Message::PeaksBar);

        column![controls, bar].spacing(5).into()
    }

    pub fn subscription(&self) -> Subscription<Message> {
        iced::time::every(TICK_INTERVAL).map(|_| Message::Tick)
    }
}
