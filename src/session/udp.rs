//! Per-session UDP endpoints: audio out, control in/out, timing in/out

use std::net::{IpAddr, SocketAddr};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::clock;
use crate::error::{AirTunesError, Result};
use crate::protocol::rtp::{PacketBacklog, ResendRequest, TimingPacket};

/// Ports the receiver handed back in the SETUP `Transport` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerPorts {
    /// Destination for audio packets
    pub server_port: u16,
    /// Destination for sync packets and resent audio
    pub control_port: u16,
    /// Receiver's timing port
    pub timing_port: u16,
}

impl ServerPorts {
    /// Parse a SETUP response `Transport` value, e.g.
    /// `RTP/AVP/UDP;unicast;mode=record;server_port=6000;control_port=6001;timing_port=6002`
    ///
    /// # Errors
    ///
    /// Returns [`AirTunesError::RtspProtocol`] when `server_port` is
    /// missing.
    pub fn parse(transport: &str) -> Result<Self> {
        let mut server_port = 0u16;
        let mut control_port = 0u16;
        let mut timing_port = 0u16;

        for part in transport.split(';') {
            if let Some((key, value)) = part.trim().split_once('=') {
                let value = value.parse().unwrap_or(0);
                match key {
                    "server_port" => server_port = value,
                    "control_port" => control_port = value,
                    "timing_port" => timing_port = value,
                    _ => {}
                }
            }
        }

        if server_port == 0 {
            return Err(AirTunesError::RtspProtocol {
                message: format!("no server_port in Transport: {transport}"),
                status_code: None,
            });
        }

        Ok(Self {
            server_port,
            control_port,
            timing_port,
        })
    }
}

/// Datagram counters shared with the listener tasks
#[derive(Debug, Default)]
pub struct LinkStats {
    /// Datagrams dropped for failing validation
    pub malformed_packets: AtomicU64,
    /// Audio packets re-sent from the backlog
    pub resent_packets: AtomicU64,
    /// Timing requests answered
    pub timing_replies: AtomicU64,
}

/// The session's three sockets
#[derive(Debug)]
pub struct UdpEndpoints {
    /// Audio socket, connected to the receiver's server port
    pub audio: Arc<UdpSocket>,
    /// Control socket (sync out, resend requests in, resent audio out)
    pub control: Arc<UdpSocket>,
    /// Timing socket (requests in, responses out)
    pub timing: Arc<UdpSocket>,
    /// Local port the control socket bound
    pub control_port: u16,
    /// Local port the timing socket bound
    pub timing_port: u16,
}

impl UdpEndpoints {
    /// Bind the three sockets, preferring the given port bases and
    /// scanning upward when a port is taken.
    ///
    /// # Errors
    ///
    /// Returns [`AirTunesError::Io`] when no port can be bound at all.
    pub async fn bind(local_ip: IpAddr, audio: u16, control: u16, timing: u16) -> Result<Self> {
        let audio = bind_from(local_ip, audio).await?;
        let control = bind_from(local_ip, control).await?;
        let timing = bind_from(local_ip, timing).await?;

        let control_port = control.local_addr()?.port();
        let timing_port = timing.local_addr()?.port();
        debug!(control_port, timing_port, "UDP endpoints bound");

        Ok(Self {
            audio: Arc::new(audio),
            control: Arc::new(control),
            timing: Arc::new(timing),
            control_port,
            timing_port,
        })
    }
}

/// Bind the first free port at or above `preferred`
async fn bind_from(local_ip: IpAddr, preferred: u16) -> Result<UdpSocket> {
    let unspecified: IpAddr = if local_ip.is_ipv4() {
        "0.0.0.0".parse().unwrap()
    } else {
        "::".parse().unwrap()
    };

    for port in preferred..u16::MAX {
        match UdpSocket::bind((unspecified, port)).await {
            Ok(socket) => return Ok(socket),
            Err(_) => continue,
        }
    }

    Err(AirTunesError::Io(std::io::Error::new(
        std::io::ErrorKind::AddrInUse,
        format!("no UDP port free at or above {preferred}"),
    )))
}

/// The local address the OS routes toward `peer`.
///
/// AirTunes URIs must carry a routable address, so link-local results
/// are rejected.
pub fn local_ip_for(peer: IpAddr) -> Result<IpAddr> {
    let probe = std::net::UdpSocket::bind(if peer.is_ipv4() {
        "0.0.0.0:0"
    } else {
        "[::]:0"
    })?;
    probe.connect((peer, 9))?;
    let ip = probe.local_addr()?.ip();

    if let IpAddr::V4(v4) = ip {
        if v4.is_link_local() {
            return Err(AirTunesError::TransportDown(format!(
                "local address {v4} is link-local"
            )));
        }
    }

    Ok(ip)
}

/// Serve resend requests from the backlog.
///
/// Each requested packet still in the backlog is re-sent verbatim to the
/// receiver's control port; malformed datagrams are dropped and counted.
pub fn spawn_control_listener(
    socket: Arc<UdpSocket>,
    backlog: Arc<Mutex<PacketBacklog>>,
    peer_control: SocketAddr,
    stats: Arc<LinkStats>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = [0u8; 1024];
        loop {
            let Ok((len, from)) = socket.recv_from(&mut buf).await else {
                return;
            };

            let request = match ResendRequest::decode(&buf[..len]) {
                Ok(request) => request,
                Err(e) => {
                    stats.malformed_packets.fetch_add(1, Ordering::Relaxed);
                    warn!(%from, error = %e, "dropping malformed control packet");
                    continue;
                }
            };

            trace!(
                missed = request.missed_seq,
                count = request.count,
                "resend requested"
            );

            for seq in request.sequences() {
                let datagram = {
                    let backlog = backlog.lock().expect("backlog lock poisoned");
                    backlog.fetch(seq).map(|slot| slot.datagram.clone())
                };
                match datagram {
                    Some(datagram) => {
                        if socket.send_to(&datagram, peer_control).await.is_ok() {
                            stats.resent_packets.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    None => {
                        debug!(seq, "resend miss: packet left the backlog");
                    }
                }
            }
        }
    })
}

/// Answer timing requests.
///
/// `received_time` is captured right after the socket read and
/// `send_time` immediately before the write; the gap is our processing
/// delay, which the receiver folds out of its offset estimate.
pub fn spawn_timing_listener(socket: Arc<UdpSocket>, stats: Arc<LinkStats>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = [0u8; 64];
        loop {
            let Ok((len, from)) = socket.recv_from(&mut buf).await else {
                return;
            };
            let received_time = clock::now_ntp();

            let request = match TimingPacket::decode_request(&buf[..len]) {
                Ok(request) => request,
                Err(e) => {
                    stats.malformed_packets.fetch_add(1, Ordering::Relaxed);
                    warn!(%from, error = %e, "dropping malformed timing packet");
                    continue;
                }
            };

            let response = TimingPacket::response_to(&request, received_time, clock::now_ntp());
            if socket.send_to(&response.encode(), from).await.is_ok() {
                stats.timing_replies.fetch_add(1, Ordering::Relaxed);
                trace!(%from, "timing request answered");
            }
        }
    })
}
