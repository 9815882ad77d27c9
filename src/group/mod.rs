//! The streaming controller: connects a set of receivers, paces the
//! pipeline against the wall clock and fans packets out to every
//! session on one shared RTP clock.

mod pacer;

#[cfg(test)]
mod group_tests;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use rand::Rng;
use tokio::sync::{watch, Mutex as AsyncMutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::audio::{PacketPipeline, PcmSource};
use crate::control::{TrackMetadata, Volume};
use crate::error::{AirTunesError, Result};
use crate::protocol::rtp::constants::FRAMES_PER_PACKET;
use crate::session::RaopSession;
use crate::types::{AirTunesConfig, RaopDevice};

/// Controller states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// No stream
    Idle,
    /// Sessions are being opened
    Connecting,
    /// Audio is flowing
    Streaming,
    /// FLUSH sent, the teardown timer is running
    Paused,
    /// The pause outlived the timer; sessions are torn down
    TornDown,
}

impl PlaybackState {
    fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Connecting => "Connecting",
            Self::Streaming => "Streaming",
            Self::Paused => "Paused",
            Self::TornDown => "TornDown",
        }
    }
}

/// The group's single logical RTP clock.
///
/// Every session shares this progression, which is what makes resend by
/// sequence number meaningful across the whole group.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RtpClock {
    pub next_seq: u16,
    pub next_ts: u32,
    pub ssrc: u32,
    pub pending_first: bool,
    pub frames_since_sync: u32,
}

impl RtpClock {
    fn random() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            next_seq: rng.gen(),
            next_ts: rng.gen(),
            ssrc: rng.gen(),
            pending_first: true,
            frames_since_sync: 0,
        }
    }

    /// Sequence and timestamp of the most recently emitted packet
    pub fn last_sent(&self) -> (u16, u32) {
        (
            self.next_seq.wrapping_sub(1),
            self.next_ts.wrapping_sub(FRAMES_PER_PACKET),
        )
    }
}

/// State shared between the controller and its spawned tasks
pub(crate) struct StreamShared {
    pub state: StdMutex<PlaybackState>,
    pub clock: StdMutex<RtpClock>,
    pub sessions: RwLock<Vec<RaopSession>>,
    pub pipeline: AsyncMutex<Option<PacketPipeline>>,
    pub streaming: AtomicBool,
    pub ended_tx: watch::Sender<bool>,
}

impl StreamShared {
    pub(crate) fn state(&self) -> PlaybackState {
        *self.state.lock().expect("state lock poisoned")
    }

    pub(crate) fn set_state(&self, state: PlaybackState) {
        *self.state.lock().expect("state lock poisoned") = state;
    }
}

/// The top-level AirTunes engine.
///
/// Add receivers, then `play` a PCM source; the engine keeps every
/// receiver locked to the same playhead and survives losing individual
/// sessions.
pub struct AirTunes {
    config: AirTunesConfig,
    devices: Vec<RaopDevice>,
    shared: Arc<StreamShared>,
    pacer: Option<JoinHandle<()>>,
    pause_timer: Option<JoinHandle<()>>,
    volume: Volume,
    ended_rx: watch::Receiver<bool>,
}

impl AirTunes {
    /// Create an engine with no receivers
    #[must_use]
    pub fn new(config: AirTunesConfig) -> Self {
        let (ended_tx, ended_rx) = watch::channel(false);
        Self {
            config,
            devices: Vec::new(),
            shared: Arc::new(StreamShared {
                state: StdMutex::new(PlaybackState::Idle),
                clock: StdMutex::new(RtpClock::random()),
                sessions: RwLock::new(Vec::new()),
                pipeline: AsyncMutex::new(None),
                streaming: AtomicBool::new(false),
                ended_tx,
            }),
            pacer: None,
            pause_timer: None,
            volume: Volume::DEFAULT,
            ended_rx,
        }
    }

    /// Register a receiver for the next `play`
    pub fn add_device(&mut self, device: RaopDevice) {
        self.devices.push(device);
    }

    /// Current controller state
    #[must_use]
    pub fn state(&self) -> PlaybackState {
        self.shared.state()
    }

    /// Number of live sessions
    pub async fn session_count(&self) -> usize {
        self.shared.sessions.read().await.len()
    }

    fn expect_state(&self, wanted: PlaybackState, doing: &str) -> Result<()> {
        let current = self.shared.state();
        if current == wanted {
            Ok(())
        } else {
            Err(AirTunesError::InvalidState {
                message: doing.to_string(),
                current: current.name().to_string(),
            })
        }
    }

    /// Connect every registered receiver and start streaming `source`.
    ///
    /// Receivers that fail to connect are skipped with a warning; the
    /// call fails only when none survive.
    ///
    /// # Errors
    ///
    /// [`AirTunesError::InvalidState`] unless idle;
    /// [`AirTunesError::GroupEmpty`] when no session could be opened.
    pub async fn play(&mut self, source: Box<dyn PcmSource>) -> Result<()> {
        self.expect_state(PlaybackState::Idle, "play")?;
        if self.devices.is_empty() {
            return Err(AirTunesError::GroupEmpty);
        }

        self.shared.set_state(PlaybackState::Connecting);
        let clock = {
            let mut guard = self.shared.clock.lock().expect("clock lock poisoned");
            *guard = RtpClock::random();
            *guard
        };

        let mut connected = Vec::new();
        for device in self.devices.clone() {
            let name = device.name.clone();
            match RaopSession::connect(
                device,
                &self.config,
                clock.next_seq,
                clock.next_ts,
                self.volume,
            )
            .await
            {
                Ok(session) => connected.push(session),
                Err(e) if e.is_session_local() => {
                    warn!(device = %name, error = %e, "receiver skipped");
                }
                Err(e) => {
                    self.shared.set_state(PlaybackState::Idle);
                    return Err(e);
                }
            }
        }

        if connected.is_empty() {
            self.shared.set_state(PlaybackState::Idle);
            return Err(AirTunesError::GroupEmpty);
        }

        info!(receivers = connected.len(), "stream starting");
        *self.shared.sessions.write().await = connected;
        *self.shared.pipeline.lock().await = Some(PacketPipeline::new(source, self.config.codec));

        let _ = self.shared.ended_tx.send(false);
        self.shared.set_state(PlaybackState::Streaming);
        self.shared.streaming.store(true, Ordering::Release);
        self.pacer = Some(pacer::spawn(
            self.shared.clone(),
            self.config.timesync_interval_frames,
        ));
        Ok(())
    }

    /// FLUSH all receivers and quiesce the pipeline.
    ///
    /// A timer starts; if `resume` does not arrive within the configured
    /// pause timeout the sessions are torn down.
    ///
    /// # Errors
    ///
    /// [`AirTunesError::InvalidState`] unless streaming.
    pub async fn pause(&mut self) -> Result<()> {
        self.expect_state(PlaybackState::Streaming, "pause")?;

        // Let the pacer finish its in-flight packet so the clock's idea
        // of the last transmitted sequence number is accurate.
        self.shared.streaming.store(false, Ordering::Release);
        if let Some(pacer) = self.pacer.take() {
            let _ = pacer.await;
        }

        let (last_seq, last_ts) = self
            .shared
            .clock
            .lock()
            .expect("clock lock poisoned")
            .last_sent();

        for session in self.shared.sessions.read().await.iter() {
            if let Err(e) = session.flush(last_seq, last_ts).await {
                warn!(device = %session.device().name, error = %e, "FLUSH failed");
            }
        }

        self.shared.set_state(PlaybackState::Paused);

        let shared = self.shared.clone();
        let timeout = self.config.pause_teardown_timeout;
        self.pause_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;

            if shared.state() != PlaybackState::Paused {
                return;
            }
            shared.set_state(PlaybackState::TornDown);

            let mut sessions = shared.sessions.write().await;
            info!(receivers = sessions.len(), "pause expired, tearing down");
            for session in sessions.iter_mut() {
                session.teardown().await;
            }
        }));

        Ok(())
    }

    /// Resume a paused or torn-down stream.
    ///
    /// After a short pause, streaming picks up where the clock left off
    /// with a first-sync and a marker-bit packet. After teardown, every
    /// session replays ANNOUNCE…RECORD with a fresh SSRC and fresh
    /// random sequence/timestamp origins.
    ///
    /// # Errors
    ///
    /// [`AirTunesError::InvalidState`] unless paused or torn down;
    /// [`AirTunesError::GroupEmpty`] when no session survives the
    /// reconnect.
    pub async fn resume(&mut self) -> Result<()> {
        if let Some(timer) = self.pause_timer.take() {
            timer.abort();
        }

        match self.shared.state() {
            PlaybackState::Paused => {
                let mut clock = self.shared.clock.lock().expect("clock lock poisoned");
                clock.pending_first = true;
                clock.frames_since_sync = 0;
            }
            PlaybackState::TornDown => {
                let clock = {
                    let mut guard = self.shared.clock.lock().expect("clock lock poisoned");
                    *guard = RtpClock::random();
                    *guard
                };

                let mut sessions = self.shared.sessions.write().await;
                let mut survivors = Vec::with_capacity(sessions.len());
                for mut session in sessions.drain(..) {
                    match session
                        .reconnect(&self.config, clock.next_seq, clock.next_ts, self.volume)
                        .await
                    {
                        Ok(()) => survivors.push(session),
                        Err(e) => {
                            warn!(device = %session.device().name, error = %e, "reconnect failed");
                        }
                    }
                }

                if survivors.is_empty() {
                    self.shared.set_state(PlaybackState::Idle);
                    return Err(AirTunesError::GroupEmpty);
                }
                *sessions = survivors;
            }
            other => {
                return Err(AirTunesError::InvalidState {
                    message: "resume".into(),
                    current: other.name().to_string(),
                });
            }
        }

        self.shared.set_state(PlaybackState::Streaming);
        self.shared.streaming.store(true, Ordering::Release);
        self.pacer = Some(pacer::spawn(
            self.shared.clone(),
            self.config.timesync_interval_frames,
        ));
        Ok(())
    }

    /// Stop streaming, TEARDOWN every session and return to idle
    pub async fn stop(&mut self) {
        self.shared.streaming.store(false, Ordering::Release);
        if let Some(pacer) = self.pacer.take() {
            let _ = pacer.await;
        }
        if let Some(timer) = self.pause_timer.take() {
            timer.abort();
        }

        let mut sessions = self.shared.sessions.write().await;
        for session in sessions.iter_mut() {
            session.teardown().await;
        }
        sessions.clear();
        drop(sessions);

        *self.shared.pipeline.lock().await = None;
        self.shared.set_state(PlaybackState::Idle);
        info!("stream stopped");
    }

    /// Completes when the PCM source runs dry (the engine then tears
    /// down and idles)
    pub async fn wait_stream_end(&self) {
        let mut rx = self.ended_rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Set the volume on every session
    ///
    /// # Errors
    ///
    /// Returns the first session's error; remaining sessions are still
    /// attempted.
    pub async fn set_volume(&mut self, volume: Volume) -> Result<()> {
        self.volume = volume;
        let mut first_error = None;
        for session in self.shared.sessions.read().await.iter() {
            if let Err(e) = session.set_volume(volume).await {
                warn!(device = %session.device().name, error = %e, "volume update failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Report progress (start/current/end RTP timestamps) to receivers
    /// that want it
    ///
    /// # Errors
    ///
    /// Returns the first session's error.
    pub async fn set_progress(&mut self, start: u32, current: u32, end: u32) -> Result<()> {
        let mut first_error = None;
        for session in self.shared.sessions.read().await.iter() {
            if let Err(e) = session.set_progress(start, current, end).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Push track metadata to receivers that want it
    ///
    /// # Errors
    ///
    /// Returns the first session's error.
    pub async fn set_track_info(&mut self, track: &TrackMetadata) -> Result<()> {
        let rtptime = self.shared.clock.lock().expect("clock lock poisoned").next_ts;
        let mut first_error = None;
        for session in self.shared.sessions.read().await.iter() {
            if let Err(e) = session.set_track_info(track, rtptime).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Push album art to receivers that want it
    ///
    /// # Errors
    ///
    /// Returns the first session's error.
    pub async fn set_artwork(&mut self, mime: &str, image: &[u8]) -> Result<()> {
        let rtptime = self.shared.clock.lock().expect("clock lock poisoned").next_ts;
        let mut first_error = None;
        for session in self.shared.sessions.read().await.iter() {
            if let Err(e) = session.set_artwork(mime, image.to_vec(), rtptime).await {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for AirTunes {
    fn drop(&mut self) {
        if let Some(pacer) = self.pacer.take() {
            pacer.abort();
        }
        if let Some(timer) = self.pause_timer.take() {
            timer.abort();
        }
    }
}
