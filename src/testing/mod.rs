//! In-process receiver emulation for session and controller tests

mod mock_receiver;

pub use mock_receiver::{MockOptions, MockReceiver, RequestRecord};

use std::time::Duration;

use tokio::net::UdpSocket;

/// Receive one datagram, or `None` after `ms` milliseconds
pub async fn recv_datagram(socket: &UdpSocket, ms: u64) -> Option<Vec<u8>> {
    let mut buf = [0u8; 2048];
    match tokio::time::timeout(Duration::from_millis(ms), socket.recv_from(&mut buf)).await {
        Ok(Ok((n, _))) => Some(buf[..n].to_vec()),
        _ => None,
    }
}

/// Drain datagrams until `ms` milliseconds pass with nothing arriving
pub async fn drain_datagrams(socket: &UdpSocket, ms: u64) -> Vec<Vec<u8>> {
    let mut out = Vec::new();
    while let Some(datagram) = recv_datagram(socket, ms).await {
        out.push(datagram);
    }
    out
}
