use std::time::Duration;

use super::*;
use crate::protocol::rtp::{payload_type, AudioPacket, SyncPacket};
use crate::testing::{drain_datagrams, recv_datagram, MockOptions, MockReceiver};
use crate::SilenceSource;

fn fast_config() -> AirTunesConfig {
    AirTunesConfig::builder()
        .pause_teardown_timeout(Duration::from_millis(400))
        .build()
}

async fn engine_with(mock: &MockReceiver, config: AirTunesConfig) -> AirTunes {
    let mut engine = AirTunes::new(config);
    engine.add_device(RaopDevice::new("Mock", mock.addr));
    engine
}

fn decode_audio(datagrams: &[Vec<u8>]) -> Vec<AudioPacket> {
    datagrams
        .iter()
        .map(|d| AudioPacket::decode(d).unwrap())
        .collect()
}

fn sync_packets(datagrams: &[Vec<u8>]) -> Vec<SyncPacket> {
    datagrams
        .iter()
        .filter(|d| d.len() == SyncPacket::SIZE && d[1] & 0x7F == payload_type::SYNC)
        .map(|d| SyncPacket::decode(d).unwrap())
        .collect()
}

#[tokio::test]
async fn ten_packet_run_holds_the_framing_invariants() {
    let mock = MockReceiver::start(MockOptions::default()).await;
    let mut engine = engine_with(&mock, fast_config()).await;

    engine
        .play(Box::new(SilenceSource::frames(10 * 352)))
        .await
        .unwrap();
    assert_eq!(engine.state(), PlaybackState::Streaming);

    engine.wait_stream_end().await;
    assert_eq!(engine.state(), PlaybackState::Idle);

    let audio = decode_audio(&drain_datagrams(&mock.audio, 300).await);
    assert_eq!(audio.len(), 10);

    let first = &audio[0];
    for (i, packet) in audio.iter().enumerate() {
        let i = i as u32;
        // seq +1 mod 2^16, timestamp +352 mod 2^32, constant SSRC
        assert_eq!(packet.sequence, first.sequence.wrapping_add(i as u16));
        assert_eq!(packet.timestamp, first.timestamp.wrapping_add(i * 352));
        assert_eq!(packet.ssrc, first.ssrc);
        assert_eq!(packet.marker, i == 0);
        assert_eq!(packet.payload_type, payload_type::AUDIO);
    }

    // exactly the start sync in a sub-second run, extension bit set,
    // pinned to the first packet's timestamp
    let syncs = sync_packets(&drain_datagrams(&mock.control, 200).await);
    assert_eq!(syncs.len(), 1);
    assert!(syncs[0].first);
    assert_eq!(syncs[0].now, first.timestamp);
    assert_eq!(
        syncs[0].now_minus_latency,
        first.timestamp.wrapping_sub(11_025)
    );

    // the stream ended, so the engine tore the session down
    assert_eq!(mock.methods().last().map(String::as_str), Some("TEARDOWN"));
}

#[tokio::test]
async fn sync_cadence_is_one_per_interval_plus_the_start_sync() {
    let mock = MockReceiver::start(MockOptions::default()).await;
    // a sync every 3 packets' worth of frames
    let config = AirTunesConfig::builder()
        .timesync_interval_frames(3 * 352)
        .build();
    let mut engine = engine_with(&mock, config).await;

    engine
        .play(Box::new(SilenceSource::frames(10 * 352)))
        .await
        .unwrap();
    engine.wait_stream_end().await;

    // start sync + one before packets 4, 7 and 10
    let syncs = sync_packets(&drain_datagrams(&mock.control, 300).await);
    assert_eq!(syncs.len(), 4);
    assert!(syncs[0].first);
    assert!(syncs[1..].iter().all(|s| !s.first));

    // ordinary syncs stamp the previous emission time
    for pair in syncs.windows(2) {
        assert!(pair[1].time_last_sync >= pair[0].time_last_sync);
    }
}

#[tokio::test]
async fn short_pause_resumes_without_teardown() {
    let mock = MockReceiver::start(MockOptions::default()).await;
    let mut engine = engine_with(&mock, fast_config()).await;

    engine
        .play(Box::new(SilenceSource::seconds(10)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;

    engine.pause().await.unwrap();
    assert_eq!(engine.state(), PlaybackState::Paused);

    let before = decode_audio(&drain_datagrams(&mock.audio, 200).await);
    assert!(!before.is_empty());
    let last = before.last().unwrap();

    // the FLUSH quotes the last transmitted packet
    let flush = mock.last_request("FLUSH").unwrap();
    assert_eq!(
        flush.header("rtp-info").unwrap(),
        format!("seq={};rtptime={}", last.sequence, last.timestamp)
    );

    // resume inside the window: no TEARDOWN
    tokio::time::sleep(Duration::from_millis(150)).await;
    let _ = drain_datagrams(&mock.control, 100).await;
    engine.resume().await.unwrap();
    assert_eq!(engine.state(), PlaybackState::Streaming);
    assert!(!mock.methods().iter().any(|m| m == "TEARDOWN"));

    // sync first, with the reset flag
    let sync = SyncPacket::decode(&recv_datagram(&mock.control, 1000).await.unwrap()).unwrap();
    assert!(sync.first);

    // seq continues monotonically and the first packet is re-marked
    let resumed = AudioPacket::decode(&recv_datagram(&mock.audio, 1000).await.unwrap()).unwrap();
    assert_eq!(resumed.sequence, last.sequence.wrapping_add(1));
    assert_eq!(resumed.timestamp, last.timestamp.wrapping_add(352));
    assert!(resumed.marker);
    assert_eq!(resumed.ssrc, last.ssrc);

    engine.stop().await;
    assert_eq!(engine.state(), PlaybackState::Idle);
}

#[tokio::test]
async fn long_pause_tears_down_and_resume_reconnects_fresh() {
    let mock = MockReceiver::start(MockOptions::default()).await;
    let mut engine = engine_with(&mock, fast_config()).await;

    engine
        .play(Box::new(SilenceSource::seconds(10)))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(60)).await;

    let before = decode_audio(&drain_datagrams(&mock.audio, 100).await);
    let old_ssrc = before.last().unwrap().ssrc;

    engine.pause().await.unwrap();
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(engine.state(), PlaybackState::TornDown);
    assert!(mock.methods().iter().any(|m| m == "TEARDOWN"));

    engine.resume().await.unwrap();
    assert_eq!(engine.state(), PlaybackState::Streaming);

    // the handshake replayed from ANNOUNCE, skipping OPTIONS
    let methods = mock.methods();
    assert_eq!(methods.iter().filter(|m| *m == "OPTIONS").count(), 1);
    assert_eq!(methods.iter().filter(|m| *m == "ANNOUNCE").count(), 2);
    assert_eq!(methods.iter().filter(|m| *m == "RECORD").count(), 2);

    // a new stream identity: fresh SSRC, marker set again
    let resumed = AudioPacket::decode(&recv_datagram(&mock.audio, 1000).await.unwrap()).unwrap();
    assert_ne!(resumed.ssrc, old_ssrc);
    assert!(resumed.marker);

    engine.stop().await;
}

#[tokio::test]
async fn fan_out_sends_identical_datagrams_to_every_receiver() {
    let first = MockReceiver::start(MockOptions::default()).await;
    let second = MockReceiver::start(MockOptions::default()).await;

    let mut engine = AirTunes::new(fast_config());
    engine.add_device(RaopDevice::new("One", first.addr));
    engine.add_device(RaopDevice::new("Two", second.addr));

    engine
        .play(Box::new(SilenceSource::frames(3 * 352)))
        .await
        .unwrap();
    assert_eq!(engine.session_count().await, 2);
    engine.wait_stream_end().await;

    let to_first = drain_datagrams(&first.audio, 300).await;
    let to_second = drain_datagrams(&second.audio, 300).await;

    assert_eq!(to_first.len(), 3);
    // unencrypted sessions share one clock, so the fan-out datagrams
    // are byte-identical apart from their destination
    assert_eq!(to_first, to_second);
}

#[tokio::test]
async fn a_dead_receiver_does_not_stop_the_group() {
    let alive = MockReceiver::start(MockOptions::default()).await;

    let probe = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = probe.local_addr().unwrap();
    drop(probe);

    let mut engine = AirTunes::new(fast_config());
    engine.add_device(RaopDevice::new("Dead", dead));
    engine.add_device(RaopDevice::new("Alive", alive.addr));

    engine
        .play(Box::new(SilenceSource::frames(2 * 352)))
        .await
        .unwrap();
    assert_eq!(engine.session_count().await, 1);

    engine.wait_stream_end().await;
    assert_eq!(decode_audio(&drain_datagrams(&alive.audio, 300).await).len(), 2);
}

#[tokio::test]
async fn play_without_receivers_is_group_empty() {
    let mut engine = AirTunes::new(fast_config());
    let err = engine
        .play(Box::new(SilenceSource::frames(352)))
        .await
        .unwrap_err();
    assert!(matches!(err, AirTunesError::GroupEmpty));
    assert_eq!(engine.state(), PlaybackState::Idle);
}

#[tokio::test]
async fn pause_is_only_valid_while_streaming() {
    let mut engine = AirTunes::new(fast_config());
    let err = engine.pause().await.unwrap_err();
    assert!(matches!(err, AirTunesError::InvalidState { .. }));
}

#[tokio::test]
async fn volume_changes_reach_every_session() {
    let mock = MockReceiver::start(MockOptions::default()).await;
    let mut engine = engine_with(&mock, fast_config()).await;

    engine
        .play(Box::new(SilenceSource::seconds(10)))
        .await
        .unwrap();

    engine.set_volume(crate::Volume::MUTE).await.unwrap();
    let volume = mock.last_request("SET_PARAMETER").unwrap();
    assert_eq!(volume.body, b"volume: -144.000000\r\n");

    engine.stop().await;
}
