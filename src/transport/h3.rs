//! HTTP/3 transport via quiche.
//!
//! Selected when the fingerprint is a JA4R string with the `q` transport
//! prefix. quiche owns its TLS stack, so fingerprint application is
//! best-effort: ALPN `h3`, the TLS 1.3 version window, and GREASE are set;
//! the cipher and extension sequence stay with quiche.

use std::net::{SocketAddr, ToSocketAddrs};
use std::time::{Duration, Instant};

use bytes::{Bytes, BytesMut};
use quiche::h3::NameValue;
use tokio::net::UdpSocket;
use tokio::time::timeout;
use url::Url;

use crate::error::{Error, Result};
use crate::fingerprint::h2::{PseudoHeader, DEFAULT_PHEADER_ORDER};
use crate::fingerprint::spec::BrowserClass;
use crate::fingerprint::{ja4r, Fingerprint};
use crate::response::Response;

const MAX_DATAGRAM_SIZE: usize = 1350;
const IDLE_TIMEOUT_MS: u64 = 30_000;
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(30);

/// One-round-trip HTTP/3 transport. Connections are not cached; each
/// request re-dials.
pub struct H3Transport {
    fingerprint: Fingerprint,
    user_agent: String,
}

impl H3Transport {
    pub fn new(fingerprint: Fingerprint, user_agent: String) -> Self {
        Self {
            fingerprint,
            user_agent,
        }
    }

    fn configure(&self) -> Result<quiche::Config> {
        let mut config = quiche::Config::new(quiche::PROTOCOL_VERSION)
            .map_err(|e| Error::quic(format!("failed to create config: {e}")))?;

        config
            .set_application_protos(quiche::h3::APPLICATION_PROTOCOL)
            .map_err(|e| Error::quic(format!("failed to set ALPN: {e}")))?;
        config.verify_peer(false);
        config.set_max_idle_timeout(IDLE_TIMEOUT_MS);
        config.set_max_recv_udp_payload_size(65535);
        config.set_max_send_udp_payload_size(MAX_DATAGRAM_SIZE);
        config.set_initial_max_data(10_000_000);
        config.set_initial_max_stream_data_bidi_local(1_000_000);
        config.set_initial_max_stream_data_bidi_remote(1_000_000);
        config.set_initial_max_stream_data_uni(1_000_000);
        config.set_initial_max_streams_bidi(100);
        config.set_initial_max_streams_uni(100);
        config.set_disable_active_migration(true);

        // quiche wraps its own BoringSSL; the assembled extension sequence
        // cannot be injected. GREASE tracks the browser class, the rest of
        // the ClientHello stays quiche's own.
        if !self.fingerprint.is_empty() {
            let parsed = ja4r::parse(self.fingerprint.value(), &self.user_agent)?;
            if parsed.transport != ja4r::Transport::Quic {
                tracing::warn!("TCP fingerprint handed to the HTTP/3 transport");
            }
            let browser = BrowserClass::from_user_agent(&self.user_agent);
            config.grease(browser.is_chrome());
            tracing::debug!(
                "HTTP/3 fingerprint applied best-effort (ALPN h3, TLS 1.3, grease={})",
                browser.is_chrome()
            );
        }

        Ok(config)
    }

    /// Dial UDP, complete the QUIC + HTTP/3 handshakes, and perform one
    /// round trip.
    pub async fn send_request(
        &self,
        method: &str,
        url: &Url,
        headers: &[(String, String)],
        body: Option<&Bytes>,
        pheader_order: Option<&[PseudoHeader]>,
    ) -> Result<Response> {
        let host = url
            .host_str()
            .ok_or_else(|| Error::protocol("URL missing host"))?;
        let port = url.port().unwrap_or(443);

        let peer: SocketAddr = format!("{host}:{port}")
            .to_socket_addrs()
            .map_err(|e| Error::dial(format!("resolve {host}:{port}: {e}")))?
            .next()
            .ok_or_else(|| Error::dial(format!("no address for {host}:{port}")))?;

        let socket = UdpSocket::bind(match peer {
            SocketAddr::V4(_) => "0.0.0.0:0",
            SocketAddr::V6(_) => "[::]:0",
        })
        .await
        .map_err(|e| Error::dial(format!("UDP bind: {e}")))?;
        let local = socket.local_addr()?;

        let mut scid_bytes = [0u8; quiche::MAX_CONN_ID_LEN];
        getrandom::getrandom(&mut scid_bytes)
            .map_err(|e| Error::quic(format!("connection ID generation: {e}")))?;
        let scid = quiche::ConnectionId::from_ref(&scid_bytes);

        let mut config = self.configure()?;
        let mut conn = quiche::connect(Some(host), &scid, local, peer, &mut config)
            .map_err(|e| Error::quic(format!("failed to create connection: {e}")))?;

        let mut out = [0u8; MAX_DATAGRAM_SIZE];
        let mut buf = [0u8; 65535];

        // Drive the QUIC handshake.
        let start = Instant::now();
        flush_egress(&mut conn, &socket, &mut out).await?;
        while !conn.is_established() {
            if start.elapsed() > HANDSHAKE_TIMEOUT {
                return Err(Error::handshake("QUIC handshake timed out"));
            }
            if conn.is_closed() {
                return Err(Error::handshake("QUIC connection closed during handshake"));
            }
            recv_ingress(&mut conn, &socket, &mut buf, local).await?;
            flush_egress(&mut conn, &socket, &mut out).await?;
        }

        let h3_config = quiche::h3::Config::new()
            .map_err(|e| Error::quic(format!("failed to create HTTP/3 config: {e}")))?;
        let mut h3_conn = quiche::h3::Connection::with_transport(&mut conn, &h3_config)
            .map_err(|e| Error::quic(format!("failed to create HTTP/3 connection: {e}")))?;

        let h3_headers = self.build_headers(method, url, headers, body, pheader_order);
        let has_body = body.map(|b| !b.is_empty()).unwrap_or(false);
        let stream_id = h3_conn
            .send_request(&mut conn, &h3_headers, !has_body)
            .map_err(|e| Error::quic(format!("failed to send request: {e}")))?;
        if let Some(body) = body {
            if !body.is_empty() {
                h3_conn
                    .send_body(&mut conn, stream_id, body, true)
                    .map_err(|e| Error::quic(format!("failed to send body: {e}")))?;
            }
        }
        flush_egress(&mut conn, &socket, &mut out).await?;

        // Collect the response.
        let mut status = 0u16;
        let mut response_headers: Vec<(String, String)> = Vec::new();
        let mut response_body = BytesMut::new();

        'outer: loop {
            if conn.is_closed() {
                return Err(Error::protocol("QUIC connection closed before response"));
            }
            recv_ingress(&mut conn, &socket, &mut buf, local).await?;

            loop {
                match h3_conn.poll(&mut conn) {
                    Ok((sid, quiche::h3::Event::Headers { list, .. })) if sid == stream_id => {
                        for header in &list {
                            let name = String::from_utf8_lossy(header.name()).into_owned();
                            let value = String::from_utf8_lossy(header.value()).into_owned();
                            if name == ":status" {
                                status = value.parse().unwrap_or(0);
                            } else if !name.starts_with(':') {
                                response_headers.push((name, value));
                            }
                        }
                    }
                    Ok((sid, quiche::h3::Event::Data)) if sid == stream_id => {
                        while let Ok(read) = h3_conn.recv_body(&mut conn, stream_id, &mut buf) {
                            response_body.extend_from_slice(&buf[..read]);
                        }
                    }
                    Ok((sid, quiche::h3::Event::Finished)) if sid == stream_id => {
                        break 'outer;
                    }
                    Ok(_) => {}
                    Err(quiche::h3::Error::Done) => break,
                    Err(e) => return Err(Error::quic(format!("HTTP/3 poll: {e}"))),
                }
            }

            flush_egress(&mut conn, &socket, &mut out).await?;
        }

        if status == 0 {
            return Err(Error::protocol("HTTP/3 response missing :status"));
        }

        let _ = conn.close(true, 0x100, b"done");
        flush_egress(&mut conn, &socket, &mut out).await?;

        Ok(Response::new(
            status,
            response_headers,
            response_body.freeze(),
            "HTTP/3",
        ))
    }

    fn build_headers(
        &self,
        method: &str,
        url: &Url,
        headers: &[(String, String)],
        body: Option<&Bytes>,
        pheader_order: Option<&[PseudoHeader]>,
    ) -> Vec<quiche::h3::Header> {
        let authority = match url.port() {
            Some(port) => format!("{}:{}", url.host_str().unwrap_or_default(), port),
            None => url.host_str().unwrap_or_default().to_string(),
        };
        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path = format!("{path}?{query}");
        }

        let order = pheader_order.unwrap_or(&DEFAULT_PHEADER_ORDER);
        let mut out = Vec::with_capacity(headers.len() + 5);
        for pseudo in order {
            let (name, value): (&[u8], Vec<u8>) = match pseudo {
                PseudoHeader::Method => (b":method", method.as_bytes().to_vec()),
                PseudoHeader::Authority => (b":authority", authority.as_bytes().to_vec()),
                PseudoHeader::Scheme => (b":scheme", b"https".to_vec()),
                PseudoHeader::Path => (b":path", path.as_bytes().to_vec()),
            };
            out.push(quiche::h3::Header::new(name, &value));
        }

        for (name, value) in headers {
            if name.starts_with(':') {
                continue;
            }
            out.push(quiche::h3::Header::new(
                name.to_lowercase().as_bytes(),
                value.as_bytes(),
            ));
        }

        if has_no_header(headers, "content-length") {
            if let Some(body) = body {
                if !body.is_empty() {
                    out.push(quiche::h3::Header::new(
                        b"content-length",
                        body.len().to_string().as_bytes(),
                    ));
                }
            }
        }

        out
    }
}

fn has_no_header(headers: &[(String, String)], name: &str) -> bool {
    !headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
}

async fn flush_egress(
    conn: &mut quiche::Connection,
    socket: &UdpSocket,
    out: &mut [u8],
) -> Result<()> {
    loop {
        let (write, send_info) = match conn.send(out) {
            Ok(v) => v,
            Err(quiche::Error::Done) => return Ok(()),
            Err(e) => return Err(Error::quic(format!("send failed: {e}"))),
        };
        socket
            .send_to(&out[..write], send_info.to)
            .await
            .map_err(|e| Error::quic(format!("UDP send: {e}")))?;
    }
}

async fn recv_ingress(
    conn: &mut quiche::Connection,
    socket: &UdpSocket,
    buf: &mut [u8],
    local: SocketAddr,
) -> Result<()> {
    let deadline = conn
        .timeout()
        .unwrap_or(Duration::from_millis(100))
        .min(Duration::from_millis(100));

    match timeout(deadline, socket.recv_from(buf)).await {
        Ok(Ok((len, from))) => {
            let info = quiche::RecvInfo { to: local, from };
            conn.recv(&mut buf[..len], info)
                .map_err(|e| Error::quic(format!("recv failed: {e}")))?;
        }
        Ok(Err(e)) => return Err(Error::quic(format!("UDP recv: {e}"))),
        Err(_) => {
            // Timer fired; let quiche handle loss/idle processing.
            conn.on_timeout();
        }
    }
    Ok(())
}
