//! SDP body for the ANNOUNCE request

use std::net::IpAddr;

/// The AppleLossless `fmtp` parameter list: 352 frames per packet,
/// 16-bit, stereo, 44.1 kHz, standard Rice parameters.
pub const ALAC_FMTP: &str = "352 0 16 40 10 14 2 255 0 0 44100";

/// Build the `application/sdp` ANNOUNCE body.
///
/// The `rsaaeskey`/`aesiv` attributes are present only when key material
/// is supplied, i.e. when the receiver expects encrypted audio.
#[must_use]
pub fn announce_body(
    session_id: u32,
    local_ip: IpAddr,
    receiver_ip: IpAddr,
    keys: Option<(&str, &str)>,
) -> String {
    let mut body = format!(
        "v=0\r\n\
         o=iTunes {session_id} 0 IN IP4 {local_ip}\r\n\
         s=iTunes\r\n\
         c=IN IP4 {receiver_ip}\r\n\
         t=0 0\r\n\
         m=audio 0 RTP/AVP 96\r\n\
         a=rtpmap:96 AppleLossless\r\n\
         a=fmtp:96 {ALAC_FMTP}\r\n"
    );

    if let Some((rsaaeskey, aesiv)) = keys {
        body.push_str(&format!("a=rsaaeskey:{rsaaeskey}\r\na=aesiv:{aesiv}\r\n"));
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCAL: IpAddr = IpAddr::V4(std::net::Ipv4Addr::new(10, 0, 0, 2));
    const RECEIVER: IpAddr = IpAddr::V4(std::net::Ipv4Addr::new(10, 0, 0, 40));

    #[test]
    fn clear_body_has_no_key_attributes() {
        let body = announce_body(1234, LOCAL, RECEIVER, None);
        assert!(body.starts_with("v=0\r\n"));
        assert!(body.contains("o=iTunes 1234 0 IN IP4 10.0.0.2\r\n"));
        assert!(body.contains("c=IN IP4 10.0.0.40\r\n"));
        assert!(body.contains("a=rtpmap:96 AppleLossless\r\n"));
        assert!(body.contains("a=fmtp:96 352 0 16 40 10 14 2 255 0 0 44100\r\n"));
        assert!(!body.contains("rsaaeskey"));
        assert!(!body.contains("aesiv"));
    }

    #[test]
    fn encrypted_body_carries_wrapped_key_and_iv() {
        let body = announce_body(1, LOCAL, RECEIVER, Some(("S0VZ", "SVY")));
        assert!(body.contains("a=rsaaeskey:S0VZ\r\n"));
        assert!(body.contains("a=aesiv:SVY\r\n"));
    }
}
