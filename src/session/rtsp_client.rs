//! The per-receiver RTSP client: one TCP connection, blocking
//! request/response with a per-request timeout, Digest retry on 401

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use base64::engine::general_purpose::STANDARD_NO_PAD as BASE64;
use base64::Engine as _;
use rand::{Rng, RngCore};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use crate::error::{AirTunesError, Result};
use crate::protocol::rtsp::auth::DigestChallenge;
use crate::protocol::rtsp::{
    names, Method, ResponseParser, RtspRequest, RtspRequestBuilder, RtspResponse, StatusCode,
};

use super::udp::ServerPorts;

fn random_hex(bytes: usize) -> String {
    let mut buf = vec![0u8; bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{b:02X}")).collect()
}

/// RTSP control connection to one receiver
#[derive(Debug)]
pub struct RtspClient {
    peer: SocketAddr,
    stream: Option<TcpStream>,
    parser: ResponseParser,
    cseq: u32,
    /// 64-digit hex id identifying this sender instance
    client_instance: String,
    dacp_id: String,
    active_remote: String,
    /// 32-bit random forming the URI path; distinct from the SSRC and
    /// from the server's `Session` header
    session_id: u32,
    uri: String,
    session_header: Option<String>,
    user_agent: String,
    request_timeout: Duration,
    password: Option<String>,
    lowercase_password: bool,
    digest: Option<DigestChallenge>,
}

impl RtspClient {
    /// Create a client for the receiver at `peer`, announcing ourselves
    /// as `local_ip`
    #[must_use]
    pub fn new(
        peer: SocketAddr,
        local_ip: IpAddr,
        user_agent: String,
        request_timeout: Duration,
        password: Option<String>,
    ) -> Self {
        let mut rng = rand::thread_rng();
        let session_id: u32 = rng.gen();

        Self {
            peer,
            stream: None,
            parser: ResponseParser::new(),
            cseq: 0,
            client_instance: random_hex(32),
            dacp_id: random_hex(8),
            active_remote: rng.gen::<u32>().to_string(),
            session_id,
            uri: format!("rtsp://{local_ip}/{session_id}"),
            session_header: None,
            user_agent,
            request_timeout,
            password,
            lowercase_password: false,
            digest: None,
        }
    }

    /// The request URI used for everything but OPTIONS
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The random 32-bit id in the URI path
    #[must_use]
    pub fn session_id(&self) -> u32 {
        self.session_id
    }

    /// Whether the TCP connection is currently open
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Apply the capability probe's password quirk
    pub fn set_lowercase_password(&mut self, lowercase: bool) {
        self.lowercase_password = lowercase;
    }

    /// Open (or reopen) the TCP connection
    ///
    /// # Errors
    ///
    /// Returns [`AirTunesError::Timeout`] or
    /// [`AirTunesError::TransportDown`].
    pub async fn connect(&mut self) -> Result<()> {
        let stream = timeout(self.request_timeout, TcpStream::connect(self.peer))
            .await
            .map_err(|_| AirTunesError::Timeout)?
            .map_err(|e| AirTunesError::TransportDown(format!("connect {}: {e}", self.peer)))?;

        debug!(peer = %self.peer, uri = %self.uri, "RTSP connected");
        self.parser.reset();
        self.stream = Some(stream);
        Ok(())
    }

    fn begin(&mut self, method: Method, uri: &str) -> RtspRequestBuilder {
        self.cseq += 1;
        let mut builder = RtspRequest::builder(method, uri)
            .cseq(self.cseq)
            .header(names::USER_AGENT, self.user_agent.clone())
            .header(names::CLIENT_INSTANCE, self.client_instance.clone())
            .header(names::DACP_ID, self.dacp_id.clone())
            .header(names::ACTIVE_REMOTE, self.active_remote.clone());

        if let Some(session) = &self.session_header {
            builder = builder.header(names::SESSION, session.clone());
        }

        builder
    }

    async fn roundtrip(&mut self, request: &RtspRequest) -> Result<RtspResponse> {
        let stream = self.stream.as_mut().ok_or_else(|| {
            AirTunesError::TransportDown(format!("{} not connected", self.peer))
        })?;

        stream
            .write_all(&request.encode())
            .await
            .map_err(|e| AirTunesError::TransportDown(format!("write: {e}")))?;

        let mut buf = [0u8; 4096];
        loop {
            if let Some(response) =
                self.parser.poll().map_err(|e| AirTunesError::RtspProtocol {
                    message: e.to_string(),
                    status_code: None,
                })?
            {
                debug!(
                    method = request.method.as_str(),
                    status = response.status.as_u16(),
                    "RTSP exchange"
                );
                return Ok(response);
            }

            let read = stream.read(&mut buf);
            let n = timeout(self.request_timeout, read)
                .await
                .map_err(|_| AirTunesError::Timeout)?
                .map_err(|e| AirTunesError::TransportDown(format!("read: {e}")))?;
            if n == 0 {
                return Err(AirTunesError::TransportDown("connection closed".into()));
            }

            self.parser
                .feed(&buf[..n])
                .map_err(|e| AirTunesError::RtspProtocol {
                    message: e.to_string(),
                    status_code: None,
                })?;
        }
    }

    /// Issue a request, transparently retrying once with Digest
    /// credentials on a 401.
    ///
    /// # Errors
    ///
    /// [`AirTunesError::AuthRequired`] when no password is configured or
    /// the receiver rejects the credentials twice;
    /// [`AirTunesError::RtspProtocol`] for any other non-2xx status.
    pub async fn request(&mut self, mut request: RtspRequest) -> Result<RtspResponse> {
        if let (Some(digest), Some(password)) = (&self.digest, &self.password) {
            request.headers.insert(
                names::AUTHORIZATION,
                digest.authorization(
                    password,
                    request.method,
                    &request.uri,
                    self.lowercase_password,
                ),
            );
        }

        let mut response = self.roundtrip(&request).await?;

        if response.status == StatusCode::UNAUTHORIZED {
            let Some(password) = self.password.clone() else {
                return Err(AirTunesError::AuthRequired {
                    device: self.peer.to_string(),
                    message: "receiver requires a password".into(),
                });
            };

            let challenge = response
                .header(names::WWW_AUTHENTICATE)
                .and_then(DigestChallenge::parse)
                .ok_or_else(|| AirTunesError::RtspProtocol {
                    message: "401 without a Digest challenge".into(),
                    status_code: Some(401),
                })?;

            // A 401 can arrive before the capability probe has run; the
            // Server header on the response itself reveals the
            // lowercase-password quirk in time for the retry.
            if response.headers.contains(names::SERVER) {
                self.lowercase_password = true;
            }

            request.headers.insert(
                names::AUTHORIZATION,
                challenge.authorization(
                    &password,
                    request.method,
                    &request.uri,
                    self.lowercase_password,
                ),
            );
            self.digest = Some(challenge);

            response = self.roundtrip(&request).await?;
            if response.status == StatusCode::UNAUTHORIZED {
                return Err(AirTunesError::AuthRequired {
                    device: self.peer.to_string(),
                    message: "receiver rejected the password".into(),
                });
            }
        }

        if response.is_success() {
            return Ok(response);
        }

        let code = response.status.as_u16();
        let message = if response.status == StatusCode::NOT_ENOUGH_BANDWIDTH {
            format!(
                "{} refused: receiver busy (not enough bandwidth)",
                request.method.as_str()
            )
        } else {
            format!(
                "{} failed: {} {}",
                request.method.as_str(),
                code,
                response.reason
            )
        };
        Err(AirTunesError::RtspProtocol {
            message,
            status_code: Some(code),
        })
    }

    /// `OPTIONS *` with a fresh 16-byte `Apple-Challenge`
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn options(&mut self) -> Result<RtspResponse> {
        let mut challenge = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut challenge);

        let request = self
            .begin(Method::Options, "*")
            .header(names::APPLE_CHALLENGE, BASE64.encode(challenge))
            .build();
        self.request(request).await
    }

    /// ANNOUNCE with the SDP stream description
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn announce(&mut self, sdp: String) -> Result<RtspResponse> {
        let uri = self.uri.clone();
        let request = self
            .begin(Method::Announce, &uri)
            .content_type("application/sdp")
            .body(sdp.into_bytes())
            .build();
        self.request(request).await
    }

    /// SETUP, returning the receiver's port triple and jack status
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request); additionally
    /// [`AirTunesError::RtspProtocol`] when the `Transport` answer is
    /// unusable.
    pub async fn setup(
        &mut self,
        control_port: u16,
        timing_port: u16,
    ) -> Result<(ServerPorts, Option<String>)> {
        let transport = format!(
            "RTP/AVP/UDP;unicast;interleaved=0-1;mode=record;control_port={control_port};timing_port={timing_port}"
        );
        let uri = self.uri.clone();
        let request = self
            .begin(Method::Setup, &uri)
            .header(names::TRANSPORT, transport)
            .build();

        let response = self.request(request).await?;

        if let Some(session) = response.session() {
            self.session_header = Some(session.to_string());
        }

        let ports = response
            .header(names::TRANSPORT)
            .ok_or_else(|| AirTunesError::RtspProtocol {
                message: "SETUP response without Transport".into(),
                status_code: None,
            })
            .and_then(ServerPorts::parse)?;

        let jack = response
            .header(names::AUDIO_JACK_STATUS)
            .map(ToString::to_string);

        Ok((ports, jack))
    }

    /// RECORD, anchoring the stream at `seq`/`rtptime`
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn record(&mut self, seq: u16, rtptime: u32) -> Result<RtspResponse> {
        let uri = self.uri.clone();
        let request = self
            .begin(Method::Record, &uri)
            .header(names::RANGE, "ntp=0-")
            .header(names::RTP_INFO, format!("seq={seq};rtptime={rtptime}"))
            .build();
        self.request(request).await
    }

    /// `SET_PARAMETER` with an arbitrary typed body
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn set_parameter(
        &mut self,
        content_type: &str,
        body: Vec<u8>,
        rtp_info: Option<String>,
    ) -> Result<RtspResponse> {
        let uri = self.uri.clone();
        let mut builder = self
            .begin(Method::SetParameter, &uri)
            .content_type(content_type)
            .body(body);
        if let Some(info) = rtp_info {
            builder = builder.header(names::RTP_INFO, info);
        }
        self.request(builder.build()).await
    }

    /// Rogue-Amoeba `X_RA_SET_ALBUM_ART` with raw image bytes
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn set_album_art(
        &mut self,
        mime: &str,
        image: Vec<u8>,
        rtptime: u32,
    ) -> Result<RtspResponse> {
        let uri = self.uri.clone();
        let request = self
            .begin(Method::XRaSetAlbumArt, &uri)
            .content_type(mime)
            .header(names::RTP_INFO, format!("rtptime={rtptime}"))
            .body(image)
            .build();
        self.request(request).await
    }

    /// FLUSH, quoting the last transmitted packet
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn flush(&mut self, last_seq: u16, last_rtptime: u32) -> Result<RtspResponse> {
        let uri = self.uri.clone();
        let request = self
            .begin(Method::Flush, &uri)
            .header(
                names::RTP_INFO,
                format!("seq={last_seq};rtptime={last_rtptime}"),
            )
            .build();
        self.request(request).await
    }

    /// TEARDOWN and close the connection
    ///
    /// # Errors
    ///
    /// See [`request`](Self::request).
    pub async fn teardown(&mut self) -> Result<()> {
        let uri = self.uri.clone();
        let request = self.begin(Method::Teardown, &uri).build();
        let result = self.request(request).await;

        self.stream = None;
        self.session_header = None;
        self.parser.reset();

        result.map(|_| ())
    }
}
