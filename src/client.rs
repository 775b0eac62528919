//! Round-tripper engine: per-host transport cache, ALPN dispatch, and the
//! caller-facing [`Client`].

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Mutex;
use tokio::time::timeout;
use url::Url;

use crate::error::{Error, Result};
use crate::fingerprint::h2::H2Settings;
use crate::headers::{apply_header_order, OrderedHeaders};
use crate::options::{cookie_header, Options};
use crate::response::Response;
use crate::transport::connector::{self, Alpn, MaybeTlsStream};
use crate::transport::h1::H1Connection;
use crate::transport::h2::{H2Connection, H2Transport};
use crate::transport::h3::H3Transport;
use crate::transport::dialer;

const MAX_REDIRECTS: u32 = 10;

/// A live transport for one `host:port`.
enum CachedTransport {
    /// HTTP/1.1 over TLS; connections are single-use, the stash covers the
    /// dial that negotiated the protocol.
    H1,
    H2(H2Transport),
    H3(Arc<H3Transport>),
}

/// Transport cache plus the stash of just-handshaken connections. Both maps
/// share one lock; stashed connections are consumed exactly once.
#[derive(Default)]
struct TransportCache {
    transports: HashMap<String, CachedTransport>,
    stashed: HashMap<String, MaybeTlsStream>,
}

/// Fingerprint-preserving HTTP client.
///
/// Cheap to clone; clones share the transport cache. Safe for concurrent
/// callers.
#[derive(Clone, Default)]
pub struct Client {
    cache: Arc<Mutex<TransportCache>>,
}

impl Client {
    pub fn new() -> Self {
        Self::default()
    }

    /// Perform a single request. `method` and `url` override whatever the
    /// options carry.
    pub async fn send(&self, url: &str, mut options: Options, method: &str) -> Result<Response> {
        options.url = url.to_string();
        options.method = method.to_uppercase();

        let deadline = options.timeout_seconds;
        let fut = self.send_with_redirects(options);
        if deadline > 0 {
            timeout(Duration::from_secs(deadline), fut)
                .await
                .map_err(|_| Error::Timeout)?
        } else {
            fut.await
        }
    }

    async fn send_with_redirects(&self, options: Options) -> Result<Response> {
        let mut url = Url::parse(&options.url)?;
        let mut method = options.method.clone();
        let mut body = if options.body.is_empty() {
            None
        } else {
            Some(Bytes::from(options.body.clone()))
        };

        let mut redirects = 0u32;
        loop {
            let response = self
                .round_trip(&url, &method, body.as_ref(), &options)
                .await?;

            if !response.is_redirect() || options.disable_redirect {
                return Ok(response);
            }
            let Some(location) = response.redirect_url() else {
                return Ok(response);
            };
            redirects += 1;
            if redirects > MAX_REDIRECTS {
                return Err(Error::protocol(format!(
                    "stopped after {MAX_REDIRECTS} redirects"
                )));
            }

            let next = url.join(location)?;
            tracing::debug!(%next, status = response.status, "following redirect");

            // Browsers rewrite the method on 301/302/303 responses.
            if matches!(response.status, 301 | 302 | 303) && method != "GET" && method != "HEAD" {
                method = "GET".to_string();
                body = None;
            }
            url = next;
        }
    }

    async fn round_trip(
        &self,
        url: &Url,
        method: &str,
        body: Option<&Bytes>,
        options: &Options,
    ) -> Result<Response> {
        let host = url
            .host_str()
            .ok_or_else(|| Error::protocol("URL missing host"))?
            .to_string();

        match url.scheme() {
            "http" => {
                // Plain TCP, no fingerprint surface to preserve.
                let port = url.port().unwrap_or(80);
                let tcp = dialer::dial(&host, port, options.proxy.as_deref()).await?;
                let headers = self.request_headers(options);
                let mut conn = H1Connection::new(MaybeTlsStream::Plain(tcp));
                conn.send_request(method, url, &headers, body).await
            }
            "https" => self.round_trip_tls(url, &host, method, body, options).await,
            other => Err(Error::protocol(format!("invalid URL scheme '{other}'"))),
        }
    }

    async fn round_trip_tls(
        &self,
        url: &Url,
        host: &str,
        method: &str,
        body: Option<&Bytes>,
        options: &Options,
    ) -> Result<Response> {
        let port = url.port().unwrap_or(443);
        let addr = format!("{host}:{port}");

        // QUIC fingerprints bypass TCP entirely.
        if options.fingerprint.is_quic() {
            let transport = {
                let mut cache = self.cache.lock().await;
                match cache.transports.get(&addr) {
                    Some(CachedTransport::H3(t)) => Arc::clone(t),
                    _ => {
                        let transport = Arc::new(H3Transport::new(
                            options.fingerprint.clone(),
                            options.user_agent.clone(),
                        ));
                        cache
                            .transports
                            .insert(addr.clone(), CachedTransport::H3(Arc::clone(&transport)));
                        transport
                    }
                }
            };
            let headers = self.request_headers(options);
            let (_, string_pheaders) = options.resolved_h2_settings()?;
            let pheaders = string_pheaders.or_else(|| options.pheader_order.clone());
            return transport
                .send_request(method, url, &headers, body, pheaders.as_deref())
                .await;
        }

        let (h2_settings, string_pheaders) = options.resolved_h2_settings()?;
        // A pseudo-header order inside the settings string overrides any
        // previously configured one.
        let pheaders = string_pheaders.or_else(|| options.pheader_order.clone());

        // Fast path: transport already cached.
        let cached = {
            let mut cache = self.cache.lock().await;
            match cache.transports.get(&addr) {
                Some(CachedTransport::H2(t)) => Some(Hit::H2(t.clone())),
                Some(CachedTransport::H1) => Some(Hit::H1(cache.stashed.remove(&addr))),
                Some(CachedTransport::H3(_)) | None => None,
            }
        };

        let headers = self.request_headers(options);

        match cached {
            Some(Hit::H2(transport)) => {
                match transport.send_request(method, url, &headers, body).await {
                    Ok(response) => return Ok(response),
                    Err(e) => {
                        // Dead pooled connection; evict and dial fresh.
                        tracing::debug!(%addr, "cached HTTP/2 transport failed: {e}");
                        let mut cache = self.cache.lock().await;
                        cache.transports.remove(&addr);
                    }
                }
            }
            Some(Hit::H1(stashed)) => {
                let stream = match stashed {
                    Some(stream) => stream,
                    None => self.establish(host, port, options, None).await?,
                };
                let mut conn = H1Connection::new(stream);
                return conn.send_request(method, url, &headers, body).await;
            }
            None => {}
        }

        // Slow path: dial, handshake, dispatch on the negotiated ALPN.
        let stream = self.establish(host, port, options, None).await?;
        match stream.alpn() {
            Alpn::H2 => {
                tracing::debug!(%addr, "negotiated h2, creating HTTP/2 transport");
                let conn = H2Connection::handshake(
                    stream,
                    h2_settings.unwrap_or_else(default_h2_settings),
                    pheaders,
                )
                .await?;
                let transport = H2Transport::new(conn);
                {
                    let mut cache = self.cache.lock().await;
                    cache
                        .transports
                        .insert(addr.clone(), CachedTransport::H2(transport.clone()));
                }
                transport.send_request(method, url, &headers, body).await
            }
            Alpn::Http1 | Alpn::None => {
                tracing::debug!(%addr, "negotiated http/1.1");
                // Stash the connection that negotiated the protocol; the
                // next round trip to this address consumes it. A concurrent
                // caller may win that race, in which case we redial.
                {
                    let mut cache = self.cache.lock().await;
                    cache.transports.insert(addr.clone(), CachedTransport::H1);
                    cache.stashed.insert(addr.clone(), stream);
                }
                let stashed = {
                    let mut cache = self.cache.lock().await;
                    cache.stashed.remove(&addr)
                };
                let stream = match stashed {
                    Some(stream) => stream,
                    None => self.establish(host, port, options, None).await?,
                };
                let mut conn = H1Connection::new(stream);
                conn.send_request(method, url, &headers, body).await
            }
            Alpn::Other(proto) => Err(Error::protocol(format!(
                "server negotiated unsupported protocol '{proto}'"
            ))),
        }
    }

    /// Dial and complete a TLS handshake, assembling a fresh ClientHello
    /// spec per dial (the synthetic PSK must not repeat).
    async fn establish(
        &self,
        host: &str,
        port: u16,
        options: &Options,
        alpn_override: Option<&[&str]>,
    ) -> Result<MaybeTlsStream> {
        let tcp = dialer::dial(host, port, options.proxy.as_deref()).await?;
        let spec = options
            .fingerprint
            .to_spec(&options.user_agent, options.tls_extensions.as_ref())?;
        let tls = connector::handshake(tcp, host, spec.as_ref(), alpn_override).await?;
        Ok(MaybeTlsStream::Tls(tls))
    }

    /// Final request headers: caller headers, cookies folded into a
    /// `Cookie` header, user agent forced, emission order applied.
    fn request_headers(&self, options: &Options) -> Vec<(String, String)> {
        let mut headers: OrderedHeaders = options.headers.clone();
        if let Some(cookie) = cookie_header(&options.cookies) {
            match headers.get("cookie") {
                Some(existing) => {
                    let merged = format!("{existing}; {cookie}");
                    headers.set("Cookie", merged);
                }
                None => headers.set("Cookie", cookie),
            }
        }
        if !options.user_agent.is_empty() {
            headers.set("User-Agent", options.user_agent.clone());
        }
        apply_header_order(&headers, options.header_order.as_deref())
    }
}

enum Hit {
    H2(H2Transport),
    H1(Option<MaybeTlsStream>),
}

/// Neutral HTTP/2 prelude used when the caller supplies no settings:
/// push disabled, generous windows, entries in ID order.
fn default_h2_settings() -> H2Settings {
    use crate::fingerprint::h2::H2Setting;
    let mut settings = H2Settings {
        connection_flow: 1 << 30,
        ..Default::default()
    };
    settings.settings.insert(H2Setting::EnablePush, 0);
    settings
        .settings
        .insert(H2Setting::InitialWindowSize, 4_194_304);
    settings
        .settings
        .insert(H2Setting::MaxHeaderListSize, 10_485_760);
    settings.settings_order = vec![
        H2Setting::EnablePush,
        H2Setting::InitialWindowSize,
        H2Setting::MaxHeaderListSize,
    ];
    settings
}

/// Convenience free function mirroring `Client::send` for one-shot use.
pub async fn send(url: &str, options: Options, method: &str) -> Result<Response> {
    Client::new().send(url, options, method).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Cookie;

    #[test]
    fn request_headers_fold_cookies_and_force_user_agent() {
        let client = Client::new();
        let mut options = Options::new();
        options.headers.set("Accept", "*/*");
        options.headers.set("User-Agent", "caller-ua");
        options.cookies = vec![Cookie::new("session", "abc")];
        options.user_agent = "profile-ua".to_string();

        let headers = client.request_headers(&options);
        let cookie = headers.iter().find(|(n, _)| n == "Cookie").unwrap();
        assert_eq!(cookie.1, "session=abc");
        let ua = headers.iter().find(|(n, _)| n == "User-Agent").unwrap();
        assert_eq!(ua.1, "profile-ua");
    }

    #[test]
    fn request_headers_follow_configured_order() {
        let client = Client::new();
        let mut options = Options::new();
        options.headers.set("Accept", "*/*");
        options.headers.set("X-Custom", "1");
        options.user_agent = "ua".to_string();
        options.header_order = Some(vec![
            "user-agent".to_string(),
            "x-custom".to_string(),
            "accept".to_string(),
        ]);

        let headers = client.request_headers(&options);
        let names: Vec<&str> = headers.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["User-Agent", "X-Custom", "Accept"]);
    }
}
