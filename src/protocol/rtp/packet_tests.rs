use bytes::Bytes;

use super::*;
use crate::clock::NtpTime;

#[test]
fn audio_packet_roundtrip() {
    let packet = AudioPacket {
        sequence: 0xBEEF,
        timestamp: 0x0102_0304,
        ssrc: 0xDEAD_BEEF,
        marker: false,
        payload_type: payload_type::AUDIO,
        payload: Bytes::from_static(b"alac-bytes"),
    };

    let wire = packet.encode();
    assert_eq!(AudioPacket::decode(&wire).unwrap(), packet);
    assert_eq!(AudioPacket::decode(&wire).unwrap().encode(), wire);
}

#[test]
fn audio_packet_header_bytes() {
    let packet = AudioPacket {
        sequence: 0x0001,
        timestamp: 2,
        ssrc: 3,
        marker: true,
        payload_type: payload_type::AUDIO,
        payload: Bytes::new(),
    };

    let wire = packet.encode();
    assert_eq!(wire.len(), AudioPacket::HEADER_SIZE);
    assert_eq!(wire[0], 0x80);
    // marker bit set on the first packet of a stream
    assert_eq!(wire[1], 0xE0);
    assert_eq!(&wire[2..4], &[0x00, 0x01]);
    assert_eq!(&wire[4..8], &[0, 0, 0, 2]);
    assert_eq!(&wire[8..12], &[0, 0, 0, 3]);
}

#[test]
fn unmarked_audio_packet_keeps_plain_payload_type() {
    let packet = AudioPacket {
        sequence: 0,
        timestamp: 0,
        ssrc: 0,
        marker: false,
        payload_type: payload_type::AUDIO,
        payload: Bytes::new(),
    };
    assert_eq!(packet.encode()[1], 0x60);
}

#[test]
fn raw_l16_packet_uses_payload_type_0x0a() {
    let packet = AudioPacket {
        sequence: 9,
        timestamp: 10,
        ssrc: 11,
        marker: true,
        payload_type: payload_type::AUDIO_RAW,
        payload: Bytes::from_static(&[1, 2, 3, 4]),
    };

    let wire = packet.encode();
    assert_eq!(wire[1], 0x8A);
    assert_eq!(AudioPacket::decode(&wire).unwrap(), packet);
}

#[test]
fn audio_decode_rejects_short_and_foreign_datagrams() {
    assert!(matches!(
        AudioPacket::decode(&[0x80, 0x60, 0, 0]),
        Err(RtpDecodeError::BufferTooSmall { .. })
    ));

    let sync = SyncPacket {
        first: true,
        now_minus_latency: 0,
        time_last_sync: NtpTime::default(),
        now: 0,
    };
    assert!(matches!(
        AudioPacket::decode(&sync.encode()),
        Err(RtpDecodeError::UnexpectedPayloadType { .. })
    ));
}

#[test]
fn sync_packet_roundtrip() {
    let packet = SyncPacket {
        first: true,
        now_minus_latency: 44_100 - 11_025,
        time_last_sync: NtpTime {
            seconds: 0x83AA_7E80,
            fraction: 42,
        },
        now: 44_100,
    };

    let wire = packet.encode();
    assert_eq!(wire.len(), SyncPacket::SIZE);
    assert_eq!(SyncPacket::decode(&wire).unwrap(), packet);
    assert_eq!(SyncPacket::decode(&wire).unwrap().encode(), wire);
}

#[test]
fn sync_packet_wire_layout() {
    let packet = SyncPacket {
        first: true,
        now_minus_latency: 0x0000_1111,
        time_last_sync: NtpTime {
            seconds: 0x2222_3333,
            fraction: 0x4444_5555,
        },
        now: 0x6666_7777,
    };

    let wire = packet.encode();
    // extension bit marks a first-after-connect-or-flush sync
    assert_eq!(wire[0], 0x90);
    assert_eq!(wire[1], 0xD4);
    // the sequence field is literally 7
    assert_eq!(&wire[2..4], &[0x00, 0x07]);
    assert_eq!(&wire[4..8], &[0x00, 0x00, 0x11, 0x11]);
    assert_eq!(&wire[8..12], &[0x22, 0x22, 0x33, 0x33]);
    assert_eq!(&wire[12..16], &[0x44, 0x44, 0x55, 0x55]);
    assert_eq!(&wire[16..20], &[0x66, 0x66, 0x77, 0x77]);

    let ordinary = SyncPacket { first: false, ..packet };
    assert_eq!(ordinary.encode()[0], 0x80);
}

#[test]
fn timing_packet_roundtrip_both_kinds() {
    for kind in [TimingKind::Request, TimingKind::Response] {
        let packet = TimingPacket {
            kind,
            reference_time: NtpTime::from_u64(0x0000_0001_0000_0000),
            received_time: NtpTime::from_u64(0x0000_0002_0000_0001),
            send_time: NtpTime::from_u64(0x0000_0003_0000_0002),
        };

        let wire = packet.encode();
        assert_eq!(wire.len(), TimingPacket::SIZE);
        assert_eq!(TimingPacket::decode(&wire).unwrap(), packet);
        assert_eq!(TimingPacket::decode(&wire).unwrap().encode(), wire);
    }
}

#[test]
fn timing_response_echoes_request_send_time() {
    let request = TimingPacket {
        kind: TimingKind::Request,
        reference_time: NtpTime::default(),
        received_time: NtpTime::default(),
        send_time: NtpTime::from_u64(0x0000_0001_0000_0000),
    };

    let received = NtpTime::from_u64(0x0000_0009_0000_0000);
    let sent = NtpTime::from_u64(0x0000_0009_0000_1000);
    let response = TimingPacket::response_to(&request, received, sent);

    assert_eq!(response.kind, TimingKind::Response);
    assert_eq!(response.reference_time, request.send_time);
    assert!(response.received_time <= response.send_time);

    let wire = response.encode();
    assert_eq!(wire[1] & 0x7F, payload_type::TIMING_RESPONSE);
    assert_eq!(wire[1] & 0x80, 0x80);
}

#[test]
fn decode_request_rejects_responses() {
    let response = TimingPacket {
        kind: TimingKind::Response,
        reference_time: NtpTime::default(),
        received_time: NtpTime::default(),
        send_time: NtpTime::default(),
    };
    assert!(TimingPacket::decode_request(&response.encode()).is_err());

    let request = TimingPacket {
        kind: TimingKind::Request,
        ..response
    };
    assert!(TimingPacket::decode_request(&request.encode()).is_ok());
}

#[test]
fn resend_request_roundtrip() {
    let request = ResendRequest {
        missed_seq: 0xFFFE,
        count: 4,
    };

    let wire = request.encode();
    assert_eq!(wire.len(), ResendRequest::SIZE);
    assert_eq!(wire[1] & 0x7F, payload_type::RESEND_REQUEST);
    assert_eq!(ResendRequest::decode(&wire).unwrap(), request);

    let seqs: Vec<u16> = request.sequences().collect();
    assert_eq!(seqs, vec![0xFFFE, 0xFFFF, 0x0000, 0x0001]);
}

#[test]
fn resend_decode_validates_payload_type() {
    let mut wire = ResendRequest {
        missed_seq: 1,
        count: 1,
    }
    .encode();
    wire[1] = 0xD4;
    assert!(matches!(
        ResendRequest::decode(&wire),
        Err(RtpDecodeError::UnexpectedPayloadType { .. })
    ));
    assert!(matches!(
        ResendRequest::decode(&wire[..4]),
        Err(RtpDecodeError::BufferTooSmall { .. })
    ));
}
