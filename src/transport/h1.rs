//! HTTP/1.1 pipeline.
//!
//! Requests are serialized by hand so the caller's header order reaches the
//! wire verbatim; responses are parsed with httparse.

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use url::Url;

use crate::error::{Error, Result};
use crate::response::Response;
use crate::transport::connector::MaybeTlsStream;

const MAX_HEAD_SIZE: usize = 64 * 1024;
const MAX_HEADER_COUNT: usize = 100;

/// A single HTTP/1.1 connection.
pub struct H1Connection {
    stream: MaybeTlsStream,
}

impl H1Connection {
    pub fn new(stream: MaybeTlsStream) -> Self {
        Self { stream }
    }

    /// Send one request and read the response.
    pub async fn send_request(
        &mut self,
        method: &str,
        url: &Url,
        headers: &[(String, String)],
        body: Option<&Bytes>,
    ) -> Result<Response> {
        let request = build_request(method, url, headers, body);
        self.stream.write_all(&request).await?;
        if let Some(body) = body {
            self.stream.write_all(body).await?;
        }
        self.stream.flush().await?;
        self.read_response(method).await
    }

    async fn read_response(&mut self, method: &str) -> Result<Response> {
        let mut head = Vec::with_capacity(4096);
        let mut chunk = [0u8; 4096];

        // Read until the end of the response head.
        let head_end = loop {
            if let Some(pos) = find_head_end(&head) {
                break pos;
            }
            if head.len() > MAX_HEAD_SIZE {
                return Err(Error::protocol("response head too large"));
            }
            let n = self.stream.read(&mut chunk).await?;
            if n == 0 {
                return Err(Error::protocol("connection closed before response head"));
            }
            head.extend_from_slice(&chunk[..n]);
        };

        let mut header_storage = [httparse::EMPTY_HEADER; MAX_HEADER_COUNT];
        let mut parsed = httparse::Response::new(&mut header_storage);
        let status = match parsed.parse(&head[..head_end]) {
            Ok(httparse::Status::Complete(_)) => parsed
                .code
                .ok_or_else(|| Error::protocol("response missing status code"))?,
            Ok(httparse::Status::Partial) => {
                return Err(Error::protocol("incomplete response head"))
            }
            Err(e) => return Err(Error::protocol(format!("invalid response head: {e}"))),
        };

        let headers: Vec<(String, String)> = parsed
            .headers
            .iter()
            .map(|h| {
                (
                    h.name.to_string(),
                    String::from_utf8_lossy(h.value).into_owned(),
                )
            })
            .collect();

        let mut body = head[head_end..].to_vec();

        // HEAD and 1xx/204/304 responses carry no body.
        let bodyless =
            method.eq_ignore_ascii_case("HEAD") || status < 200 || status == 204 || status == 304;

        if !bodyless {
            let transfer_encoding = find_header(&headers, "transfer-encoding");
            if transfer_encoding
                .map(|v| v.to_lowercase().contains("chunked"))
                .unwrap_or(false)
            {
                body = self.read_chunked(body).await?;
            } else if let Some(length) = find_header(&headers, "content-length") {
                let length: usize = length
                    .trim()
                    .parse()
                    .map_err(|_| Error::protocol("invalid Content-Length"))?;
                while body.len() < length {
                    let n = self.stream.read(&mut chunk).await?;
                    if n == 0 {
                        return Err(Error::protocol("connection closed mid-body"));
                    }
                    body.extend_from_slice(&chunk[..n]);
                }
                body.truncate(length);
            } else {
                // No framing: read to EOF.
                loop {
                    let n = self.stream.read(&mut chunk).await?;
                    if n == 0 {
                        break;
                    }
                    body.extend_from_slice(&chunk[..n]);
                }
            }
        } else {
            body.clear();
        }

        Ok(Response::new(status, headers, Bytes::from(body), "HTTP/1.1"))
    }

    /// Decode a chunked body, starting from bytes already buffered past the
    /// head.
    async fn read_chunked(&mut self, mut buffered: Vec<u8>) -> Result<Vec<u8>> {
        let mut decoded = Vec::new();
        let mut chunk = [0u8; 4096];

        loop {
            // Ensure a full size line is buffered.
            let line_end = loop {
                if let Some(pos) = buffered.windows(2).position(|w| w == b"\r\n") {
                    break pos;
                }
                let n = self.stream.read(&mut chunk).await?;
                if n == 0 {
                    return Err(Error::protocol("connection closed mid-chunk"));
                }
                buffered.extend_from_slice(&chunk[..n]);
            };

            let size_line = String::from_utf8_lossy(&buffered[..line_end]).into_owned();
            let size_str = size_line.split(';').next().unwrap_or("").trim();
            let size = usize::from_str_radix(size_str, 16)
                .map_err(|_| Error::protocol(format!("invalid chunk size '{size_str}'")))?;
            buffered.drain(..line_end + 2);

            // Chunk data plus trailing CRLF.
            while buffered.len() < size + 2 {
                let n = self.stream.read(&mut chunk).await?;
                if n == 0 {
                    return Err(Error::protocol("connection closed mid-chunk"));
                }
                buffered.extend_from_slice(&chunk[..n]);
            }

            if size == 0 {
                return Ok(decoded);
            }
            decoded.extend_from_slice(&buffered[..size]);
            buffered.drain(..size + 2);
        }
    }
}

fn build_request(
    method: &str,
    url: &Url,
    headers: &[(String, String)],
    body: Option<&Bytes>,
) -> Vec<u8> {
    let mut request = Vec::with_capacity(1024);

    request.extend_from_slice(method.as_bytes());
    request.push(b' ');
    request.extend_from_slice(url.path().as_bytes());
    if let Some(query) = url.query() {
        request.push(b'?');
        request.extend_from_slice(query.as_bytes());
    }
    request.extend_from_slice(b" HTTP/1.1\r\n");

    // Host leads unless the caller's ordering already places it.
    let caller_has_host = headers.iter().any(|(n, _)| n.eq_ignore_ascii_case("host"));
    if !caller_has_host {
        request.extend_from_slice(b"Host: ");
        request.extend_from_slice(host_header_value(url).as_bytes());
        request.extend_from_slice(b"\r\n");
    }

    let caller_has_length = headers
        .iter()
        .any(|(n, _)| n.eq_ignore_ascii_case("content-length"));

    for (name, value) in headers {
        request.extend_from_slice(name.as_bytes());
        request.extend_from_slice(b": ");
        request.extend_from_slice(value.as_bytes());
        request.extend_from_slice(b"\r\n");
    }

    if let Some(body) = body {
        if !caller_has_length {
            request.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
        }
    }

    request.extend_from_slice(b"\r\n");
    request
}

fn host_header_value(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

fn find_head_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4)
        .position(|w| w == b"\r\n\r\n")
        .map(|pos| pos + 4)
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_preserves_caller_header_order() {
        let url = Url::parse("https://example.com/page?q=1").unwrap();
        let headers = vec![
            ("Host".to_string(), "example.com".to_string()),
            ("User-Agent".to_string(), "ua".to_string()),
            ("Accept".to_string(), "*/*".to_string()),
        ];
        let request = build_request("GET", &url, &headers, None);
        let text = String::from_utf8(request).unwrap();

        assert!(text.starts_with("GET /page?q=1 HTTP/1.1\r\n"));
        let host_pos = text.find("Host:").unwrap();
        let ua_pos = text.find("User-Agent:").unwrap();
        let accept_pos = text.find("Accept:").unwrap();
        assert!(host_pos < ua_pos && ua_pos < accept_pos);
        // Host appears exactly once.
        assert_eq!(text.matches("Host:").count(), 1);
    }

    #[test]
    fn content_length_is_added_for_bodies() {
        let url = Url::parse("https://example.com/submit").unwrap();
        let body = Bytes::from_static(b"payload");
        let request = build_request("POST", &url, &[], Some(&body));
        let text = String::from_utf8(request).unwrap();
        assert!(text.contains("Content-Length: 7\r\n"));
    }

    #[test]
    fn default_port_is_omitted_from_host() {
        let url = Url::parse("https://example.com/").unwrap();
        assert_eq!(host_header_value(&url), "example.com");
        let url = Url::parse("https://example.com:8443/").unwrap();
        assert_eq!(host_header_value(&url), "example.com:8443");
    }
}
