use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};

use crate::playback::resource::{
    AudioResource, EventListener, ListenerId, MediaEvent, NetworkActivity, Readiness,
};

use super::decoder;
use super::types::{AudioData, EngineCommand, MediaError};

/// How often (in output frames) the callback emits a position update.
const POSITION_UPDATE_INTERVAL: usize = 2048;

const NETWORK_NO_SOURCE: u8 = 0;
const NETWORK_IDLE: u8 = 1;
const NETWORK_LOADING: u8 = 2;

const READY_NOTHING: u8 = 0;
const READY_METADATA: u8 = 1;
const READY_ENOUGH_DATA: u8 = 2;

/// Attribute block shared between the UI thread, the decode thread and the
/// audio callback, so `AudioResource` getters never block on the callback.
struct EngineShared {
    position_frames: AtomicUsize,
    playing: AtomicBool,
    ended: AtomicBool,
    sample_rate: AtomicU32,
    /// f64 bit pattern; NaN while the duration is unknown.
    duration_bits: AtomicU64,
    network: AtomicU8,
    readiness: AtomicU8,
    error: Mutex<Option<MediaError>>,
    audio: Mutex<Option<Arc<AudioData>>>,
    listeners: Mutex<Vec<(ListenerId, EventListener)>>,
    next_listener: AtomicU64,
    /// Load generation. The mutex doubles as the lock around load
    /// transitions: starting a load, reporting a transport error and
    /// installing a decode result all hold it, so a completion from a
    /// stale generation is dropped without touching any state.
    generation: Mutex<u64>,
}

impl EngineShared {
    fn new() -> Self {
        Self {
            position_frames: AtomicUsize::new(0),
            playing: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            sample_rate: AtomicU32::new(0),
            duration_bits: AtomicU64::new(f64::NAN.to_bits()),
            network: AtomicU8::new(NETWORK_NO_SOURCE),
            readiness: AtomicU8::new(READY_NOTHING),
            error: Mutex::new(None),
            audio: Mutex::new(None),
            listeners: Mutex::new(Vec::new()),
            next_listener: AtomicU64::new(0),
            generation: Mutex::new(0),
        }
    }

    fn set_duration(&self, seconds: f64) {
        self.duration_bits.store(seconds.to_bits(), Ordering::Relaxed);
    }

    fn duration(&self) -> f64 {
        f64::from_bits(self.duration_bits.load(Ordering::Relaxed))
    }
}

/// Playback logic that runs inside the audio callback. Split out from the
/// stream plumbing so it can be exercised without an output device.
struct EngineCore {
    shared: Arc<EngineShared>,
    audio: Option<Arc<AudioData>>,
    event_tx: Sender<MediaEvent>,
    frames_since_update: usize,
}

impl EngineCore {
    fn new(shared: Arc<EngineShared>, event_tx: Sender<MediaEvent>) -> Self {
        Self {
            shared,
            audio: None,
            event_tx,
            frames_since_update: 0,
        }
    }

    fn emit(&self, event: MediaEvent) {
        let _ = self.event_tx.send(event);
    }

    fn handle_command(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::SetAudio(data) => {
                self.audio = Some(data);
                self.shared.position_frames.store(0, Ordering::Relaxed);
                self.shared.playing.store(false, Ordering::Relaxed);
                self.shared.ended.store(false, Ordering::Relaxed);
            }
            EngineCommand::Play => {
                if self.audio.is_none() {
                    return;
                }
                // native end-of-media behavior: play restarts from the top
                if self.shared.ended.swap(false, Ordering::Relaxed) {
                    self.shared.position_frames.store(0, Ordering::Relaxed);
                }
                if !self.shared.playing.swap(true, Ordering::Relaxed) {
                    self.emit(MediaEvent::Play);
                }
            }
            EngineCommand::Pause => {
                if self.shared.playing.swap(false, Ordering::Relaxed) {
                    self.emit(MediaEvent::Pause);
                }
            }
            EngineCommand::Seek(seconds) => {
                if let Some(audio) = &self.audio {
                    let frame = (seconds * audio.sample_rate as f64) as usize;
                    let frame = frame.min(audio.num_frames());
                    self.shared.position_frames.store(frame, Ordering::Relaxed);
                    if frame < audio.num_frames() {
                        self.shared.ended.store(false, Ordering::Relaxed);
                    }
                    self.emit(MediaEvent::TimeUpdate);
                }
            }
            EngineCommand::ClearAudio => {
                self.audio = None;
                self.shared.position_frames.store(0, Ordering::Relaxed);
                self.shared.playing.store(false, Ordering::Relaxed);
                self.shared.ended.store(false, Ordering::Relaxed);
            }
        }
    }

    /// Fill the output buffer with the next frames, advancing the shared
    /// position and reporting progress and end-of-media.
    fn fill_buffer(&mut self, output: &mut [f32], out_channels: u16) {
        if !self.shared.playing.load(Ordering::Relaxed) {
            output.fill(0.0);
            return;
        }

        let audio = match &self.audio {
            Some(a) => a.clone(),
            None => {
                output.fill(0.0);
                return;
            }
        };

        let audio_channels = audio.channels.max(1) as usize;
        let out_channels = out_channels.max(1) as usize;
        let total_frames = audio.num_frames();
        let out_frames = output.len() / out_channels;
        let mut position = self.shared.position_frames.load(Ordering::Relaxed);

        for f in 0..out_frames {
            if position >= total_frames {
                // reached the end: silence the rest and stop
                for sample in &mut output[f * out_channels..] {
                    *sample = 0.0;
                }
                self.shared.playing.store(false, Ordering::Relaxed);
                self.shared.ended.store(true, Ordering::Relaxed);
                self.shared.position_frames.store(total_frames, Ordering::Relaxed);
                self.emit(MediaEvent::Pause);
                self.emit(MediaEvent::Ended);
                return;
            }

            for c in 0..out_channels {
                let src_c = (c % audio_channels) as u16;
                output[f * out_channels + c] = audio.sample(src_c, position);
            }
            position += 1;
            self.frames_since_update += 1;
        }

        self.shared.position_frames.store(position, Ordering::Relaxed);

        if self.frames_since_update >= POSITION_UPDATE_INTERVAL {
            self.frames_since_update = 0;
            self.emit(MediaEvent::TimeUpdate);
        }
    }
}

/// cpal-backed default implementation of [`AudioResource`].
///
/// Give it compressed bytes with [`set_source`](AudioEngine::set_source)
/// and it behaves like a media element: it decodes in the background,
/// reports loading/ready/error through its attributes, emits the
/// [`MediaEvent`] set, and plays through the default output device.
pub struct AudioEngine {
    shared: Arc<EngineShared>,
    cmd_tx: Sender<EngineCommand>,
    event_tx: Sender<MediaEvent>,
}

impl AudioEngine {
    /// Build the output stream and start the event dispatch thread.
    pub fn spawn() -> Result<Arc<AudioEngine>, String> {
        let (cmd_tx, cmd_rx) = crossbeam_channel::bounded::<EngineCommand>(64);
        let (event_tx, event_rx) = crossbeam_channel::bounded::<MediaEvent>(256);

        let shared = Arc::new(EngineShared::new());

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or("no audio output device found")?;

        let config = device
            .default_output_config()
            .map_err(|e| format!("failed to get output config: {e}"))?;

        let channels = config.channels();
        let sample_format = config.sample_format();

        let mut core = EngineCore::new(shared.clone(), event_tx.clone());

        let stream = match sample_format {
            cpal::SampleFormat::F32 => device
                .build_output_stream(
                    &config.into(),
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        while let Ok(cmd) = cmd_rx.try_recv() {
                            core.handle_command(cmd);
                        }
                        core.fill_buffer(data, channels);
                    },
                    |err| {
                        log::error!("audio stream error: {err}");
                    },
                    None,
                )
                .map_err(|e| format!("failed to build output stream: {e}"))?,
            other => return Err(format!("unsupported sample format: {other:?}")),
        };

        stream
            .play()
            .map_err(|e| format!("failed to start stream: {e}"))?;

        // keep the stream alive by parking a thread that owns it
        std::thread::Builder::new()
            .name("audio-keepalive".into())
            .spawn(move || {
                let _stream = stream;
                loop {
                    std::thread::park();
                }
            })
            .map_err(|e| format!("failed to spawn keepalive thread: {e}"))?;

        spawn_dispatcher(shared.clone(), event_rx)?;

        Ok(Arc::new(AudioEngine {
            shared,
            cmd_tx,
            event_tx,
        }))
    }

    /// Attach a new source from raw compressed bytes.
    ///
    /// Decoding happens on a background thread under a load generation;
    /// replacing the source (or dropping the engine) while a decode is in
    /// flight makes its completion a silent no-op.
    pub fn set_source(self: &Arc<Self>, bytes: Vec<u8>, extension: Option<String>) {
        let generation = self.begin_load();

        let engine = self.clone();
        std::thread::Builder::new()
            .name("audio-decode".into())
            .spawn(move || {
                let result = decoder::decode_bytes(bytes, extension.as_deref());
                engine.finish_load(generation, result);
            })
            .ok();
    }

    /// Open a new load generation: invalidate any in-flight decode and
    /// reset the loading state.
    fn begin_load(&self) -> u64 {
        let shared = &self.shared;
        let mut generation = shared.generation.lock().unwrap();
        *generation += 1;

        if shared.network.swap(NETWORK_LOADING, Ordering::Relaxed) == NETWORK_LOADING {
            // a previous load was still in flight
            self.emit(MediaEvent::Abort);
        }
        shared.readiness.store(READY_NOTHING, Ordering::Relaxed);
        shared.set_duration(f64::NAN);
        *shared.error.lock().unwrap() = None;
        *shared.audio.lock().unwrap() = None;
        let _ = self.cmd_tx.send(EngineCommand::ClearAudio);
        self.emit(MediaEvent::LoadStart);
        *generation
    }

    /// Install a completed decode. The generation lock spans the staleness
    /// check and the installation, so a `begin_load` or transport error on
    /// another thread cannot slip in between them.
    fn finish_load(&self, generation: u64, result: Result<AudioData, MediaError>) {
        let current = self.shared.generation.lock().unwrap();
        if *current != generation {
            log::debug!("discarding decode result for replaced source");
            return;
        }

        match result {
            Ok(data) => {
                let data = Arc::new(data);
                self.shared
                    .sample_rate
                    .store(data.sample_rate, Ordering::Relaxed);
                self.shared.set_duration(data.duration);
                *self.shared.error.lock().unwrap() = None;
                *self.shared.audio.lock().unwrap() = Some(data.clone());
                let _ = self.cmd_tx.send(EngineCommand::SetAudio(data));
                self.shared
                    .readiness
                    .store(READY_ENOUGH_DATA, Ordering::Relaxed);
                self.shared.network.store(NETWORK_IDLE, Ordering::Relaxed);
                self.emit(MediaEvent::LoadedMetadata);
                self.emit(MediaEvent::DurationChange);
                self.emit(MediaEvent::CanPlayThrough);
            }
            Err(error) => {
                log::warn!("audio load failed: {error}");
                *self.shared.error.lock().unwrap() = Some(error);
                self.shared.network.store(NETWORK_IDLE, Ordering::Relaxed);
                self.emit(MediaEvent::Error);
            }
        }
    }

    /// Surface a transport failure (the byte fetch is the host's job, the
    /// resulting error status is ours). Supersedes any decode still in
    /// flight.
    pub fn report_transport_error(&self, error: MediaError) {
        let mut generation = self.shared.generation.lock().unwrap();
        *generation += 1;
        *self.shared.error.lock().unwrap() = Some(error);
        self.shared.network.store(NETWORK_IDLE, Ordering::Relaxed);
        self.emit(MediaEvent::Error);
    }

    /// The decoded sample data of the current source, once loading is done.
    pub fn sample_data(&self) -> Option<Arc<AudioData>> {
        self.shared.audio.lock().unwrap().clone()
    }

    fn emit(&self, event: MediaEvent) {
        let _ = self.event_tx.send(event);
    }
}

impl Drop for AudioEngine {
    fn drop(&mut self) {
        // invalidate any in-flight decode
        if let Ok(mut generation) = self.shared.generation.lock() {
            *generation += 1;
        }
    }
}

/// Fans events out to registered listeners, off the realtime callback.
fn spawn_dispatcher(
    shared: Arc<EngineShared>,
    event_rx: Receiver<MediaEvent>,
) -> Result<(), String> {
    std::thread::Builder::new()
        .name("audio-events".into())
        .spawn(move || {
            for event in event_rx {
                let listeners: Vec<EventListener> = shared
                    .listeners
                    .lock()
                    .unwrap()
                    .iter()
                    .map(|(_, l)| l.clone())
                    .collect();
                for listener in listeners {
                    listener(event);
                }
            }
        })
        .map_err(|e| format!("failed to spawn event thread: {e}"))?;
    Ok(())
}

impl AudioResource for AudioEngine {
    fn current_time(&self) -> f64 {
        let rate = self.shared.sample_rate.load(Ordering::Relaxed);
        if rate == 0 {
            return 0.0;
        }
        self.shared.position_frames.load(Ordering::Relaxed) as f64 / rate as f64
    }

    fn duration(&self) -> f64 {
        self.shared.duration()
    }

    fn is_paused(&self) -> bool {
        !self.shared.playing.load(Ordering::Relaxed)
    }

    fn has_ended(&self) -> bool {
        self.shared.ended.load(Ordering::Relaxed)
    }

    fn network_activity(&self) -> NetworkActivity {
        match self.shared.network.load(Ordering::Relaxed) {
            NETWORK_IDLE => NetworkActivity::Idle,
            NETWORK_LOADING => NetworkActivity::Loading,
            _ => NetworkActivity::NoSource,
        }
    }

    fn readiness(&self) -> Readiness {
        match self.shared.readiness.load(Ordering::Relaxed) {
            READY_ENOUGH_DATA => Readiness::EnoughData,
            READY_METADATA => Readiness::Metadata,
            _ => Readiness::Nothing,
        }
    }

    fn error(&self) -> Option<MediaError> {
        self.shared.error.lock().unwrap().clone()
    }

    fn request_play(&self) {
        let _ = self.cmd_tx.send(EngineCommand::Play);
    }

    fn request_pause(&self) {
        let _ = self.cmd_tx.send(EngineCommand::Pause);
    }

    fn set_position(&self, seconds: f64) {
        let _ = self.cmd_tx.send(EngineCommand::Seek(seconds));
    }

    fn add_listener(&self, listener: EventListener) -> ListenerId {
        let id = ListenerId(self.shared.next_listener.fetch_add(1, Ordering::Relaxed));
        self.shared.listeners.lock().unwrap().push((id, listener));
        id
    }

    fn remove_listener(&self, id: ListenerId) {
        self.shared
            .listeners
            .lock()
            .unwrap()
            .retain(|(lid, _)| *lid != id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_audio(frames: usize, sample_rate: u32) -> AudioData {
        AudioData {
            samples: (0..frames).map(|i| ((i % 4) as f32 - 1.5) / 2.0).collect(),
            sample_rate,
            channels: 1,
            duration: frames as f64 / sample_rate as f64,
        }
    }

    fn test_audio(frames: usize, sample_rate: u32) -> Arc<AudioData> {
        Arc::new(raw_audio(frames, sample_rate))
    }

    /// An engine wired to channels but no output stream, enough to drive
    /// the load state machine directly.
    fn offline_engine() -> (Arc<AudioEngine>, Receiver<EngineCommand>, Receiver<MediaEvent>) {
        let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let engine = Arc::new(AudioEngine {
            shared: Arc::new(EngineShared::new()),
            cmd_tx,
            event_tx,
        });
        (engine, cmd_rx, event_rx)
    }

    fn core_with_audio(frames: usize) -> (EngineCore, Receiver<MediaEvent>, Arc<EngineShared>) {
        let shared = Arc::new(EngineShared::new());
        shared.sample_rate.store(100, Ordering::Relaxed);
        let (event_tx, event_rx) = crossbeam_channel::unbounded();
        let mut core = EngineCore::new(shared.clone(), event_tx);
        core.handle_command(EngineCommand::SetAudio(test_audio(frames, 100)));
        (core, event_rx, shared)
    }

    fn drain(rx: &Receiver<MediaEvent>) -> Vec<MediaEvent> {
        rx.try_iter().collect()
    }

    #[test]
    fn paused_core_outputs_silence() {
        let (mut core, _rx, shared) = core_with_audio(1000);
        let mut out = vec![1.0f32; 64];
        core.fill_buffer(&mut out, 2);
        assert!(out.iter().all(|s| *s == 0.0));
        assert_eq!(shared.position_frames.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn playing_advances_position_and_emits_updates() {
        let (mut core, rx, shared) = core_with_audio(100_000);
        core.handle_command(EngineCommand::Play);
        assert_eq!(drain(&rx), vec![MediaEvent::Play]);

        let mut out = vec![0.0f32; POSITION_UPDATE_INTERVAL * 2];
        core.fill_buffer(&mut out, 2);
        assert_eq!(
            shared.position_frames.load(Ordering::Relaxed),
            POSITION_UPDATE_INTERVAL
        );
        assert_eq!(drain(&rx), vec![MediaEvent::TimeUpdate]);
    }

    #[test]
    fn reaching_the_end_pauses_and_marks_ended() {
        let (mut core, rx, shared) = core_with_audio(10);
        core.handle_command(EngineCommand::Play);
        drain(&rx);

        let mut out = vec![0.7f32; 64];
        core.fill_buffer(&mut out, 2);
        assert!(shared.ended.load(Ordering::Relaxed));
        assert!(!shared.playing.load(Ordering::Relaxed));
        assert_eq!(shared.position_frames.load(Ordering::Relaxed), 10);
        assert_eq!(drain(&rx), vec![MediaEvent::Pause, MediaEvent::Ended]);
        // tail of the buffer is silence
        assert!(out[20..].iter().all(|s| *s == 0.0));
    }

    #[test]
    fn play_after_ended_restarts_from_zero() {
        let (mut core, rx, shared) = core_with_audio(10);
        core.handle_command(EngineCommand::Play);
        let mut out = vec![0.0f32; 64];
        core.fill_buffer(&mut out, 2);
        assert!(shared.ended.load(Ordering::Relaxed));
        drain(&rx);

        core.handle_command(EngineCommand::Play);
        assert_eq!(shared.position_frames.load(Ordering::Relaxed), 0);
        assert!(!shared.ended.load(Ordering::Relaxed));
        assert!(shared.playing.load(Ordering::Relaxed));
        assert_eq!(drain(&rx), vec![MediaEvent::Play]);
    }

    #[test]
    fn seek_clamps_to_the_media_and_clears_ended() {
        let (mut core, rx, shared) = core_with_audio(1000); // 10s at 100Hz
        core.handle_command(EngineCommand::Seek(5.0));
        assert_eq!(shared.position_frames.load(Ordering::Relaxed), 500);

        core.handle_command(EngineCommand::Seek(99.0));
        assert_eq!(shared.position_frames.load(Ordering::Relaxed), 1000);

        shared.ended.store(true, Ordering::Relaxed);
        core.handle_command(EngineCommand::Seek(1.0));
        assert!(!shared.ended.load(Ordering::Relaxed));
        assert!(drain(&rx).iter().all(|e| *e == MediaEvent::TimeUpdate));
    }

    #[test]
    fn pause_is_idempotent_and_emits_once() {
        let (mut core, rx, _shared) = core_with_audio(1000);
        core.handle_command(EngineCommand::Play);
        drain(&rx);
        core.handle_command(EngineCommand::Pause);
        core.handle_command(EngineCommand::Pause);
        assert_eq!(drain(&rx), vec![MediaEvent::Pause]);
    }

    #[test]
    fn replaced_load_cannot_install_after_the_replacement_finishes() {
        let (engine, _cmd_rx, _event_rx) = offline_engine();
        let first = engine.begin_load();
        let second = engine.begin_load();

        engine.finish_load(second, Ok(raw_audio(600, 200)));
        // the first decode completes late; its result must be dropped
        engine.finish_load(first, Ok(raw_audio(1000, 100)));

        assert_eq!(engine.duration(), 3.0);
        assert_eq!(engine.sample_data().unwrap().sample_rate, 200);
        assert_eq!(engine.readiness(), Readiness::EnoughData);
        assert!(engine.error().is_none());
    }

    #[test]
    fn stale_decode_failure_does_not_mark_the_new_source_failed() {
        let (engine, _cmd_rx, _event_rx) = offline_engine();
        let first = engine.begin_load();
        let second = engine.begin_load();

        engine.finish_load(second, Ok(raw_audio(600, 200)));
        engine.finish_load(first, Err(MediaError::decode("truncated stream")));

        assert!(engine.error().is_none());
        assert_eq!(engine.network_activity(), NetworkActivity::Idle);
    }

    #[test]
    fn transport_error_supersedes_the_decode_in_flight() {
        let (engine, _cmd_rx, _event_rx) = offline_engine();
        let generation = engine.begin_load();
        engine.report_transport_error(MediaError::transport("connection reset"));

        engine.finish_load(generation, Ok(raw_audio(600, 200)));

        assert!(engine.sample_data().is_none());
        assert!(engine.error().is_some());
        assert_eq!(engine.network_activity(), NetworkActivity::Idle);
    }

    #[test]
    fn loading_a_new_source_recovers_from_a_transport_error() {
        let (engine, _cmd_rx, _event_rx) = offline_engine();
        engine.report_transport_error(MediaError::transport("connection reset"));
        assert!(engine.error().is_some());

        let generation = engine.begin_load();
        engine.finish_load(generation, Ok(raw_audio(600, 200)));

        assert!(engine.error().is_none());
        assert_eq!(engine.readiness(), Readiness::EnoughData);
        assert_eq!(engine.duration(), 3.0);
    }

    #[test]
    fn mono_source_feeds_all_output_channels() {
        let (mut core, _rx, _shared) = core_with_audio(1000);
        core.handle_command(EngineCommand::Play);
        let mut out = vec![0.0f32; 8];
        core.fill_buffer(&mut out, 2);
        for frame in out.chunks(2) {
            assert_eq!(frame[0], frame[1]);
        }
    }
}
