//! A scripted AirTunes receiver: accepts the RTSP handshake, hands out
//! real UDP ports and records every request it sees.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use md5::{Digest, Md5};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tokio::task::JoinHandle;

/// Behavior switches for the scripted receiver
#[derive(Debug, Clone)]
pub struct MockOptions {
    /// Answer OPTIONS with an `Apple-Response` header
    pub apple_response: bool,
    /// Answer OPTIONS with a `Server` header
    pub server_header: bool,
    /// `Audio-Latency` value for the RECORD response
    pub audio_latency: Option<String>,
    /// `Audio-Jack-Status` value for the SETUP response
    pub jack_status: Option<String>,
    /// Demand Digest authentication with this password
    pub password: Option<String>,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            apple_response: false,
            server_header: true,
            audio_latency: None,
            jack_status: Some("connected; type=analog".into()),
            password: None,
        }
    }
}

/// One recorded RTSP request
#[derive(Debug, Clone)]
pub struct RequestRecord {
    /// Request method as on the wire
    pub method: String,
    /// Request URI
    pub uri: String,
    /// Headers, lowercased names
    pub headers: HashMap<String, String>,
    /// Request body
    pub body: Vec<u8>,
}

impl RequestRecord {
    /// Header lookup by lowercased name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}

/// The scripted receiver
pub struct MockReceiver {
    /// RTSP endpoint to hand to `RaopDevice`
    pub addr: SocketAddr,
    /// Socket packets arrive on (our "server_port")
    pub audio: Arc<UdpSocket>,
    /// Socket sync and resent packets arrive on (our "control_port")
    pub control: Arc<UdpSocket>,
    /// Socket we would probe timing from
    pub timing: Arc<UdpSocket>,
    requests: Arc<Mutex<Vec<RequestRecord>>>,
    accept_task: JoinHandle<()>,
}

impl MockReceiver {
    /// Start listening on loopback
    pub async fn start(options: MockOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let audio = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let control = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());
        let timing = Arc::new(UdpSocket::bind("127.0.0.1:0").await.unwrap());

        let ports = (
            audio.local_addr().unwrap().port(),
            control.local_addr().unwrap().port(),
            timing.local_addr().unwrap().port(),
        );

        let requests: Arc<Mutex<Vec<RequestRecord>>> = Arc::new(Mutex::new(Vec::new()));
        let requests_for_task = requests.clone();
        let accept_task = tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let options = options.clone();
                let requests = requests_for_task.clone();
                tokio::spawn(serve_connection(stream, options, ports, requests));
            }
        });

        Self {
            addr,
            audio,
            control,
            timing,
            requests,
            accept_task,
        }
    }

    /// Everything received so far
    pub fn requests(&self) -> Vec<RequestRecord> {
        self.requests.lock().unwrap().clone()
    }

    /// Just the method names, in arrival order
    pub fn methods(&self) -> Vec<String> {
        self.requests().iter().map(|r| r.method.clone()).collect()
    }

    /// The most recent request with the given method
    pub fn last_request(&self, method: &str) -> Option<RequestRecord> {
        self.requests()
            .into_iter()
            .rev()
            .find(|r| r.method == method)
    }

    /// Client port advertised in the SETUP Transport header
    pub fn client_port(&self, key: &str) -> Option<u16> {
        let setup = self.last_request("SETUP")?;
        let transport = setup.header("transport")?;
        transport.split(';').find_map(|part| {
            let (k, v) = part.trim().split_once('=')?;
            if k == key {
                v.parse::<u16>().ok()
            } else {
                None
            }
        })
    }
}

impl Drop for MockReceiver {
    fn drop(&mut self) {
        self.accept_task.abort();
    }
}

async fn serve_connection(
    mut stream: TcpStream,
    options: MockOptions,
    ports: (u16, u16, u16),
    requests: Arc<Mutex<Vec<RequestRecord>>>,
) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    loop {
        let request = loop {
            if let Some(request) = try_parse_request(&mut buf) {
                break request;
            }
            let Ok(n) = stream.read(&mut chunk).await else {
                return;
            };
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
        };

        requests.lock().unwrap().push(request.clone());
        let response = respond_to(&request, &options, ports);
        if stream.write_all(response.as_bytes()).await.is_err() {
            return;
        }
    }
}

fn try_parse_request(buf: &mut Vec<u8>) -> Option<RequestRecord> {
    let header_end = buf.windows(4).position(|w| w == b"\r\n\r\n")?;

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let request_line = lines.next()?;
    let mut parts = request_line.split(' ');
    let method = parts.next()?.to_string();
    let uri = parts.next()?.to_string();

    let mut headers = HashMap::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_lowercase(), value.trim().to_string());
        }
    }

    let content_length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let total = header_end + 4 + content_length;
    if buf.len() < total {
        return None;
    }

    let body = buf[header_end + 4..total].to_vec();
    buf.drain(..total);

    Some(RequestRecord {
        method,
        uri,
        headers,
        body,
    })
}

const MOCK_REALM: &str = "raop";
const MOCK_NONCE: &str = "8f2c1d40aa6b";

fn md5_hex(input: &str) -> String {
    Md5::digest(input.as_bytes())
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Verify the client's Digest `Authorization` exactly per RFC 2617,
/// expecting the lowercased password (the mock always sets `Server`, so
/// a correct client lowercases).
fn digest_is_valid(record: &RequestRecord, password: &str) -> bool {
    let Some(auth) = record.header("authorization") else {
        return false;
    };
    let field = |name: &str| -> Option<String> {
        let start = auth.find(&format!("{name}=\""))? + name.len() + 2;
        let rest = &auth[start..];
        Some(rest[..rest.find('"')?].to_string())
    };

    let (Some(username), Some(uri), Some(response)) =
        (field("username"), field("uri"), field("response"))
    else {
        return false;
    };

    let ha1 = md5_hex(&format!("{username}:{MOCK_REALM}:{}", password.to_lowercase()));
    let ha2 = md5_hex(&format!("{}:{uri}", record.method));
    response == md5_hex(&format!("{ha1}:{MOCK_NONCE}:{ha2}"))
}

fn respond_to(
    request: &RequestRecord,
    options: &MockOptions,
    (audio_port, control_port, timing_port): (u16, u16, u16),
) -> String {
    let cseq = request.header("cseq").unwrap_or("0").to_string();
    let mut headers: Vec<String> = vec![format!("CSeq: {cseq}")];

    if let Some(password) = &options.password {
        if !digest_is_valid(request, password) {
            headers.push(format!(
                "WWW-Authenticate: Digest realm=\"{MOCK_REALM}\", nonce=\"{MOCK_NONCE}\""
            ));
            if options.server_header {
                headers.push("Server: AirTunes/105.1".to_string());
            }
            return build_response(401, "Unauthorized", &headers);
        }
    }

    match request.method.as_str() {
        "OPTIONS" => {
            if options.apple_response {
                headers.push("Apple-Response: bW9jay1zaWduYXR1cmU".to_string());
            }
            if options.server_header {
                headers.push("Server: AirTunes/105.1".to_string());
            }
        }
        "SETUP" => {
            headers.push("Session: 1A2B3C4D".to_string());
            headers.push(format!(
                "Transport: RTP/AVP/UDP;unicast;mode=record;server_port={audio_port};control_port={control_port};timing_port={timing_port}"
            ));
            if let Some(jack) = &options.jack_status {
                headers.push(format!("Audio-Jack-Status: {jack}"));
            }
        }
        "RECORD" => {
            if let Some(latency) = &options.audio_latency {
                headers.push(format!("Audio-Latency: {latency}"));
            }
        }
        _ => {}
    }

    build_response(200, "OK", &headers)
}

fn build_response(code: u16, reason: &str, headers: &[String]) -> String {
    let mut out = format!("RTSP/1.0 {code} {reason}\r\n");
    for header in headers {
        out.push_str(header);
        out.push_str("\r\n");
    }
    out.push_str("\r\n");
    out
}
