//! The wall-clock pacer task.
//!
//! Packet N is due at `stream_start + N * (352 / 44100) s`. When the
//! task falls behind it skips the sleep and catches up; it never skips
//! a sequence number and never re-emits a packet.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::audio::PacketPipeline;
use crate::protocol::rtp::constants::{FRAMES_PER_PACKET, NANOS_PER_PACKET};

use super::{PlaybackState, StreamShared};

pub(crate) fn spawn(shared: Arc<StreamShared>, timesync_interval_frames: u32) -> JoinHandle<()> {
    tokio::spawn(run(shared, timesync_interval_frames))
}

async fn run(shared: Arc<StreamShared>, timesync_interval_frames: u32) {
    let start = Instant::now();
    let mut emitted: u64 = 0;

    loop {
        if !shared.streaming.load(Ordering::Acquire) {
            return;
        }

        let due = start + Duration::from_nanos(emitted * NANOS_PER_PACKET);
        if due > Instant::now() {
            tokio::time::sleep_until(due).await;
        }
        if !shared.streaming.load(Ordering::Acquire) {
            return;
        }

        let packet = {
            let mut pipeline = shared.pipeline.lock().await;
            pipeline.as_mut().and_then(PacketPipeline::next_packet)
        };
        let Some(packet) = packet else {
            end_of_stream(&shared).await;
            return;
        };

        let (seq, ts, ssrc, first, sync_due) = {
            let clock = shared.clock.lock().expect("clock lock poisoned");
            (
                clock.next_seq,
                clock.next_ts,
                clock.ssrc,
                clock.pending_first,
                clock.pending_first || clock.frames_since_sync >= timesync_interval_frames,
            )
        };

        let sessions = shared.sessions.read().await;

        if sync_due {
            for session in sessions.iter() {
                if let Err(e) = session.send_sync(ts, first).await {
                    warn!(device = %session.device().name, error = %e, "sync send failed");
                }
            }
            shared
                .clock
                .lock()
                .expect("clock lock poisoned")
                .frames_since_sync = 0;
        }

        // Packet N reaches every receiver before packet N+1 reaches any.
        let mut failed = Vec::new();
        for (index, session) in sessions.iter().enumerate() {
            if let Err(e) = session
                .emit_audio(seq, ts, ssrc, first, packet.payload_type, &packet.payload)
                .await
            {
                warn!(device = %session.device().name, error = %e, "audio send failed, dropping session");
                failed.push(index);
            }
        }
        let mut group_empty = sessions.is_empty();
        drop(sessions);

        if !failed.is_empty() {
            let mut sessions = shared.sessions.write().await;
            for index in failed.into_iter().rev() {
                if index < sessions.len() {
                    let mut session = sessions.remove(index);
                    tokio::spawn(async move { session.teardown().await });
                }
            }
            group_empty = sessions.is_empty();
        }

        {
            let mut clock = shared.clock.lock().expect("clock lock poisoned");
            clock.next_seq = clock.next_seq.wrapping_add(1);
            clock.next_ts = clock.next_ts.wrapping_add(FRAMES_PER_PACKET);
            clock.pending_first = false;
            clock.frames_since_sync += FRAMES_PER_PACKET;
        }
        emitted += 1;

        if group_empty {
            warn!("every receiver is gone, stopping the stream");
            shared.streaming.store(false, Ordering::Release);
            shared.set_state(PlaybackState::Idle);
            *shared.pipeline.lock().await = None;
            let _ = shared.ended_tx.send(true);
            return;
        }
    }
}

async fn end_of_stream(shared: &Arc<StreamShared>) {
    info!("PCM source exhausted, ending stream");
    shared.streaming.store(false, Ordering::Release);

    let mut sessions = shared.sessions.write().await;
    for session in sessions.iter_mut() {
        session.teardown().await;
    }
    let receivers = sessions.len();
    sessions.clear();
    drop(sessions);

    *shared.pipeline.lock().await = None;
    shared.set_state(PlaybackState::Idle);
    let _ = shared.ended_tx.send(true);
    debug!(receivers, "stream ended");
}
