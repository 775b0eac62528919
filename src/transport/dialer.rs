//! TCP dialing, directly or through an HTTP CONNECT proxy.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use url::Url;

use crate::error::{Error, Result};

/// Dial `host:port`, tunneling through `proxy` when one is configured.
pub async fn dial(host: &str, port: u16, proxy: Option<&str>) -> Result<TcpStream> {
    match proxy {
        Some(proxy_url) => dial_via_connect(host, port, proxy_url).await,
        None => TcpStream::connect((host, port))
            .await
            .map_err(|e| Error::dial(format!("{host}:{port}: {e}"))),
    }
}

/// Establish a CONNECT tunnel through an HTTP proxy.
async fn dial_via_connect(host: &str, port: u16, proxy_url: &str) -> Result<TcpStream> {
    let url = Url::parse(proxy_url)?;
    if url.scheme() != "http" {
        return Err(Error::dial(format!(
            "unsupported proxy scheme '{}'",
            url.scheme()
        )));
    }
    let proxy_host = url
        .host_str()
        .ok_or_else(|| Error::dial("proxy URL missing host"))?;
    let proxy_port = url.port().unwrap_or(8080);

    let mut stream = TcpStream::connect((proxy_host, proxy_port))
        .await
        .map_err(|e| Error::dial(format!("proxy {proxy_host}:{proxy_port}: {e}")))?;

    let mut request = format!(
        "CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\n"
    );
    if !url.username().is_empty() {
        let credentials = format!("{}:{}", url.username(), url.password().unwrap_or(""));
        request.push_str(&format!(
            "Proxy-Authorization: Basic {}\r\n",
            BASE64.encode(credentials.as_bytes())
        ));
    }
    request.push_str("\r\n");

    stream.write_all(request.as_bytes()).await?;

    // Read the proxy's response head.
    let mut buf = Vec::with_capacity(256);
    let mut byte = [0u8; 1];
    while !buf.ends_with(b"\r\n\r\n") {
        if buf.len() > 8192 {
            return Err(Error::dial("proxy CONNECT response too large"));
        }
        let n = stream.read(&mut byte).await?;
        if n == 0 {
            return Err(Error::dial("proxy closed connection during CONNECT"));
        }
        buf.push(byte[0]);
    }

    let head = String::from_utf8_lossy(&buf);
    let status_line = head.lines().next().unwrap_or("");
    let status_ok = status_line
        .split_whitespace()
        .nth(1)
        .map(|code| code.starts_with('2'))
        .unwrap_or(false);
    if !status_ok {
        return Err(Error::dial(format!("proxy refused CONNECT: {status_line}")));
    }

    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_socks_proxy_urls() {
        let err = dial("example.com", 443, Some("socks5://127.0.0.1:1080"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Dial(_)));
    }
}
