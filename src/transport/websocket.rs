//! WebSocket upgrade over a fingerprinted TLS connection.
//!
//! WebSocket cannot ride HTTP/2, so the ALPN extension is rewritten to
//! `http/1.1` after the fingerprint is parsed, and a handshake that
//! negotiates anything else is rejected. Framing is tungstenite's, driven
//! over the already-established stream.

use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{client_async, WebSocketStream};
use url::Url;

use crate::error::{Error, Result};
use crate::headers::apply_header_order;
use crate::options::Options;
use crate::response::Response;
use crate::transport::{connector, dialer};
use crate::transport::connector::MaybeTlsStream;

pub use tokio_tungstenite::tungstenite::Message;

/// WebSocket client carrying the fingerprint configuration of an
/// [`Options`] (typically populated by a browser profile).
pub struct WebSocketClient {
    options: Options,
}

impl WebSocketClient {
    pub fn new(options: Options) -> Self {
        Self { options }
    }

    /// Connect and complete the upgrade handshake. Accepts `ws`, `wss`,
    /// `http` and `https` URLs.
    pub async fn connect(
        &self,
        url: &str,
    ) -> Result<(WebSocketStream<MaybeTlsStream>, Response)> {
        let mut parsed = Url::parse(url)?;
        let ws_scheme = match parsed.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(Error::protocol(format!(
                    "unsupported WebSocket scheme '{other}'"
                )))
            }
        };
        parsed
            .set_scheme(ws_scheme)
            .map_err(|_| Error::protocol("failed to normalize WebSocket scheme"))?;

        let host = parsed
            .host_str()
            .ok_or_else(|| Error::protocol("WebSocket URL missing host"))?
            .to_string();
        let secure = ws_scheme == "wss";
        let port = parsed.port().unwrap_or(if secure { 443 } else { 80 });

        let tcp = dialer::dial(&host, port, self.options.proxy.as_deref()).await?;

        let stream = if secure {
            let mut spec = self
                .options
                .fingerprint
                .to_spec(&self.options.user_agent, self.options.tls_extensions.as_ref())?;
            if let Some(spec) = spec.as_mut() {
                spec.force_alpn(&["http/1.1"]);
            }

            let tls =
                connector::handshake(tcp, &host, spec.as_ref(), Some(&["http/1.1"])).await?;

            // An upgrade over anything but HTTP/1.1 cannot work.
            match tls.ssl().selected_alpn_protocol() {
                None | Some(b"http/1.1") => {}
                Some(other) => {
                    return Err(Error::protocol(format!(
                        "TLS negotiated '{}' but WebSocket requires http/1.1",
                        String::from_utf8_lossy(other)
                    )))
                }
            }
            MaybeTlsStream::Tls(tls)
        } else {
            MaybeTlsStream::Plain(tcp)
        };

        // Upgrade request: profile headers in their configured order, the
        // profile's user agent forced.
        let mut request = parsed
            .as_str()
            .into_client_request()
            .map_err(|e| Error::protocol(format!("invalid WebSocket request: {e}")))?;
        let ordered = apply_header_order(
            &self.options.headers,
            self.options.header_order.as_deref(),
        );
        for (name, value) in &ordered {
            let name = http::header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::protocol(format!("invalid header name '{name}': {e}")))?;
            let value = http::header::HeaderValue::from_str(value)
                .map_err(|e| Error::protocol(format!("invalid header value: {e}")))?;
            request.headers_mut().insert(name, value);
        }
        if !self.options.user_agent.is_empty() {
            request.headers_mut().insert(
                http::header::USER_AGENT,
                http::header::HeaderValue::from_str(&self.options.user_agent)
                    .map_err(|e| Error::protocol(format!("invalid user agent: {e}")))?,
            );
        }

        let (socket, upgrade_response) = client_async(request, stream)
            .await
            .map_err(|e| Error::protocol(format!("WebSocket handshake failed: {e}")))?;

        let headers = upgrade_response
            .headers()
            .iter()
            .map(|(n, v)| {
                (
                    n.as_str().to_string(),
                    String::from_utf8_lossy(v.as_bytes()).into_owned(),
                )
            })
            .collect();
        let response = Response::new(
            upgrade_response.status().as_u16(),
            headers,
            bytes::Bytes::new(),
            "HTTP/1.1",
        );

        Ok((socket, response))
    }
}
