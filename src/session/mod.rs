//! Per-receiver session: RTSP control connection, UDP endpoints,
//! resend backlog and sync state

mod capabilities;
mod keys;
mod rtsp_client;
pub mod udp;


pub use capabilities::{ArtChannel, AudioFormat, Capabilities, MetadataChannel, SpeakerKind};
pub use keys::StreamKeys;
pub use rtsp_client::RtspClient;

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::{self, NtpTime};
use crate::control::{TrackMetadata, Volume};
use crate::error::{AirTunesError, Result};
use crate::protocol::crypto::AudioCipher;
use crate::protocol::rtp::{AudioPacket, PacketBacklog, SyncPacket};
use crate::protocol::sdp;
use crate::types::{AirTunesConfig, RaopDevice};

use udp::{LinkStats, ServerPorts, UdpEndpoints};

/// One connected receiver.
///
/// The session exclusively owns its sockets, backlog and sync state.
/// The RTSP connection sits behind its own lock so that a blocking
/// request/response never stalls the audio emit path, which only
/// touches the sockets, the cipher and the backlog.
#[derive(Debug)]
pub struct RaopSession {
    device: RaopDevice,
    rtsp: AsyncMutex<RtspClient>,
    caps: Capabilities,
    speaker: SpeakerKind,
    ports: ServerPorts,
    endpoints: UdpEndpoints,
    peer_control: SocketAddr,
    backlog: Arc<Mutex<PacketBacklog>>,
    keys: Option<StreamKeys>,
    cipher: Option<AudioCipher>,
    time_last_sync: Mutex<NtpTime>,
    stats: Arc<LinkStats>,
    tasks: Vec<JoinHandle<()>>,
    backlog_size: usize,
}

impl RaopSession {
    /// Run the full connect handshake against `device`:
    /// OPTIONS → ANNOUNCE → SETUP → RECORD → initial volume.
    ///
    /// # Errors
    ///
    /// Any handshake failure surfaces as the corresponding
    /// [`AirTunesError`]; the caller decides whether the group goes on
    /// without this receiver.
    pub async fn connect(
        device: RaopDevice,
        config: &AirTunesConfig,
        initial_seq: u16,
        initial_ts: u32,
        volume: Volume,
    ) -> Result<Self> {
        let local_ip = udp::local_ip_for(device.addr.ip())?;
        let endpoints = UdpEndpoints::bind(
            local_ip,
            config.audio_port,
            config.control_port,
            config.timing_port,
        )
        .await?;

        let mut rtsp = RtspClient::new(
            device.addr,
            local_ip,
            config.user_agent.clone(),
            config.rtsp_request_timeout,
            device.password.clone(),
        );
        rtsp.connect().await?;

        let options = rtsp.options().await?;
        let mut caps = Capabilities::derive(&options, config.default_latency_frames);
        if device.txt.as_ref().is_some_and(|txt| txt.machine.is_some()) {
            caps.wants_album_art = ArtChannel::Plist;
        }
        rtsp.set_lowercase_password(caps.lowercase_password);

        let keys = Self::keys_for(&caps)?;
        let cipher = Self::cipher_from(keys.as_ref());
        let sdp_keys = keys.as_ref().map(|k| (k.rsaaeskey(), k.aesiv()));
        let sdp = sdp::announce_body(
            rtsp.session_id(),
            local_ip,
            device.addr.ip(),
            sdp_keys.as_ref().map(|(k, iv)| (k.as_str(), iv.as_str())),
        );
        rtsp.announce(sdp).await?;

        let (ports, jack) = rtsp
            .setup(endpoints.control_port, endpoints.timing_port)
            .await?;
        let speaker = SpeakerKind::from_jack_status(jack.as_deref());

        let record = rtsp.record(initial_seq, initial_ts).await?;
        caps.resolve_latency(record.audio_latency(), config.default_latency_frames);

        endpoints
            .audio
            .connect((device.addr.ip(), ports.server_port))
            .await?;
        let peer_control = SocketAddr::new(device.addr.ip(), ports.control_port);

        let backlog = Arc::new(Mutex::new(PacketBacklog::new(config.backlog_size)));
        let stats = Arc::new(LinkStats::default());
        let tasks = vec![
            udp::spawn_control_listener(
                endpoints.control.clone(),
                backlog.clone(),
                peer_control,
                stats.clone(),
            ),
            udp::spawn_timing_listener(endpoints.timing.clone(), stats.clone()),
        ];

        info!(
            device = %device.name,
            latency = caps.audio_latency_frames,
            encrypted = caps.is_encrypted(),
            ?speaker,
            "session connected"
        );

        let session = Self {
            device,
            rtsp: AsyncMutex::new(rtsp),
            caps,
            speaker,
            ports,
            endpoints,
            peer_control,
            backlog,
            keys,
            cipher,
            time_last_sync: Mutex::new(clock::now_ntp()),
            stats,
            tasks,
            backlog_size: config.backlog_size,
        };
        session.set_volume(volume).await?;

        Ok(session)
    }

    /// Fresh random AES key and IV, generated per session life when the
    /// receiver expects encrypted audio
    fn keys_for(caps: &Capabilities) -> Result<Option<StreamKeys>> {
        if !caps.is_encrypted() {
            return Ok(None);
        }
        StreamKeys::generate()
            .map(Some)
            .map_err(|e| AirTunesError::FatalInternal(format!("session key generation: {e}")))
    }

    fn cipher_from(keys: Option<&StreamKeys>) -> Option<AudioCipher> {
        keys.map(|k| AudioCipher::new(*k.aes_key(), *k.aes_iv()))
    }

    /// Replay the handshake from ANNOUNCE onward after a TEARDOWN.
    ///
    /// OPTIONS is skipped; the capability snapshot from the original
    /// probe stays in force. Key material is regenerated.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`connect`](Self::connect).
    pub async fn reconnect(
        &mut self,
        config: &AirTunesConfig,
        initial_seq: u16,
        initial_ts: u32,
        volume: Volume,
    ) -> Result<()> {
        self.abort_tasks();
        self.backlog.lock().expect("backlog lock poisoned").clear();

        let rtsp = self.rtsp.get_mut();
        if !rtsp.is_connected() {
            rtsp.connect().await?;
        }

        let local_ip = udp::local_ip_for(self.device.addr.ip())?;
        self.keys = Self::keys_for(&self.caps)?;
        self.cipher = Self::cipher_from(self.keys.as_ref());
        let sdp_keys = self.keys.as_ref().map(|k| (k.rsaaeskey(), k.aesiv()));

        let rtsp = self.rtsp.get_mut();
        let sdp = sdp::announce_body(
            rtsp.session_id(),
            local_ip,
            self.device.addr.ip(),
            sdp_keys.as_ref().map(|(k, iv)| (k.as_str(), iv.as_str())),
        );
        rtsp.announce(sdp).await?;

        let (ports, _jack) = rtsp
            .setup(self.endpoints.control_port, self.endpoints.timing_port)
            .await?;
        self.ports = ports;

        let record = rtsp.record(initial_seq, initial_ts).await?;
        self.caps
            .resolve_latency(record.audio_latency(), config.default_latency_frames);

        self.endpoints
            .audio
            .connect((self.device.addr.ip(), ports.server_port))
            .await?;
        self.peer_control = SocketAddr::new(self.device.addr.ip(), ports.control_port);

        self.backlog = Arc::new(Mutex::new(PacketBacklog::new(self.backlog_size)));
        self.tasks = vec![
            udp::spawn_control_listener(
                self.endpoints.control.clone(),
                self.backlog.clone(),
                self.peer_control,
                self.stats.clone(),
            ),
            udp::spawn_timing_listener(self.endpoints.timing.clone(), self.stats.clone()),
        ];
        *self.time_last_sync.lock().expect("sync lock poisoned") = clock::now_ntp();

        self.set_volume(volume).await?;
        debug!(device = %self.device.name, "session reconnected");
        Ok(())
    }

    /// Encrypt (per capability), frame and transmit one audio packet,
    /// retaining the datagram in the backlog for resend.
    ///
    /// This path takes no lock shared with the RTSP surface.
    ///
    /// # Errors
    ///
    /// Returns [`AirTunesError::Io`] when the audio socket send fails.
    pub async fn emit_audio(
        &self,
        sequence: u16,
        timestamp: u32,
        ssrc: u32,
        marker: bool,
        payload_type: u8,
        payload: &Bytes,
    ) -> Result<()> {
        let payload = match &self.cipher {
            Some(cipher) => {
                let mut body = payload.to_vec();
                cipher.encrypt_packet(&mut body);
                Bytes::from(body)
            }
            None => payload.clone(),
        };

        let wire = AudioPacket {
            sequence,
            timestamp,
            ssrc,
            marker,
            payload_type,
            payload,
        }
        .encode();

        self.backlog
            .lock()
            .expect("backlog lock poisoned")
            .store(sequence, timestamp, wire.clone());

        self.endpoints.audio.send(&wire).await?;
        Ok(())
    }

    /// Send a sync packet pinning `now` (the next packet's timestamp) to
    /// wall time.
    ///
    /// # Errors
    ///
    /// Returns [`AirTunesError::Io`] when the control socket send fails.
    pub async fn send_sync(&self, now: u32, first: bool) -> Result<()> {
        let emitted_at = clock::now_ntp();
        let previous = {
            let mut last = self.time_last_sync.lock().expect("sync lock poisoned");
            let previous = *last;
            *last = emitted_at;
            previous
        };

        let packet = SyncPacket {
            first,
            now_minus_latency: now.wrapping_sub(self.caps.audio_latency_frames),
            time_last_sync: if first { emitted_at } else { previous },
            now,
        };

        self.endpoints
            .control
            .send_to(&packet.encode(), self.peer_control)
            .await?;
        Ok(())
    }

    /// FLUSH, quoting the last transmitted packet
    ///
    /// # Errors
    ///
    /// See [`RtspClient::request`].
    pub async fn flush(&self, last_seq: u16, last_rtptime: u32) -> Result<()> {
        self.rtsp.lock().await.flush(last_seq, last_rtptime).await?;
        Ok(())
    }

    /// TEARDOWN, stop serving resends, drop the backlog
    pub async fn teardown(&mut self) {
        if let Err(e) = self.rtsp.get_mut().teardown().await {
            warn!(device = %self.device.name, error = %e, "TEARDOWN failed");
        }
        self.abort_tasks();
        self.backlog.lock().expect("backlog lock poisoned").clear();
    }

    /// Set the receiver volume
    ///
    /// # Errors
    ///
    /// See [`RtspClient::request`].
    pub async fn set_volume(&self, volume: Volume) -> Result<()> {
        let body = format!("volume: {:.6}\r\n", volume.as_db());
        self.rtsp
            .lock()
            .await
            .set_parameter("text/parameters", body.into_bytes(), None)
            .await?;
        Ok(())
    }

    /// Report playback progress as RTP timestamps; a no-op for receivers
    /// that did not ask for progress.
    ///
    /// # Errors
    ///
    /// See [`RtspClient::request`].
    pub async fn set_progress(&self, start: u32, current: u32, end: u32) -> Result<()> {
        if !self.caps.wants_progress {
            return Ok(());
        }
        let body = format!("progress: {start}/{current}/{end}\r\n");
        self.rtsp
            .lock()
            .await
            .set_parameter("text/parameters", body.into_bytes(), None)
            .await?;
        Ok(())
    }

    /// Push track metadata over the channel the receiver asked for
    ///
    /// # Errors
    ///
    /// See [`RtspClient::request`].
    pub async fn set_track_info(&self, track: &TrackMetadata, rtptime: u32) -> Result<()> {
        match self.caps.wants_metadata {
            MetadataChannel::None => Ok(()),
            MetadataChannel::Daap => {
                let body = crate::protocol::daap::encode_track(
                    &track.title,
                    track.artist.as_deref(),
                    track.album.as_deref(),
                );
                self.rtsp
                    .lock()
                    .await
                    .set_parameter(
                        "application/x-dmap-tagged",
                        body,
                        Some(format!("rtptime={rtptime}")),
                    )
                    .await?;
                Ok(())
            }
        }
    }

    /// Push album art over the channel the receiver asked for
    ///
    /// # Errors
    ///
    /// See [`RtspClient::request`].
    pub async fn set_artwork(&self, mime: &str, image: Vec<u8>, rtptime: u32) -> Result<()> {
        match self.caps.wants_album_art {
            ArtChannel::None => Ok(()),
            ArtChannel::Daap => {
                self.rtsp
                    .lock()
                    .await
                    .set_parameter(mime, image, Some(format!("rtptime={rtptime}")))
                    .await?;
                Ok(())
            }
            ArtChannel::Plist => {
                self.rtsp
                    .lock()
                    .await
                    .set_album_art(mime, image, rtptime)
                    .await?;
                Ok(())
            }
        }
    }

    fn abort_tasks(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }

    /// The receiver this session talks to
    #[must_use]
    pub fn device(&self) -> &RaopDevice {
        &self.device
    }

    /// The frozen capability snapshot
    #[must_use]
    pub fn capabilities(&self) -> &Capabilities {
        &self.caps
    }

    /// What the jack probe reported
    #[must_use]
    pub fn speaker(&self) -> SpeakerKind {
        self.speaker
    }

    /// Negotiated receiver ports
    #[must_use]
    pub fn server_ports(&self) -> ServerPorts {
        self.ports
    }

    /// Datagram counters
    #[must_use]
    pub fn stats(&self) -> &Arc<LinkStats> {
        &self.stats
    }
}

impl Drop for RaopSession {
    fn drop(&mut self) {
        self.abort_tasks();
    }
}
