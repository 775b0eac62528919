//! HTTP response with on-demand body decompression.

use std::io::Read;

use bytes::Bytes;

use crate::error::{Error, Result};

/// Response returned to the caller. Headers keep their arrival order; the
/// body is returned untouched, with decompression available on demand.
#[derive(Debug)]
pub struct Response {
    pub status: u16,
    /// Headers in arrival order. Duplicate names are kept as separate
    /// entries (`Set-Cookie` in particular).
    pub headers: Vec<(String, String)>,
    body: Bytes,
    http_version: String,
}

impl Response {
    pub fn new(
        status: u16,
        headers: Vec<(String, String)>,
        body: Bytes,
        http_version: impl Into<String>,
    ) -> Self {
        Self {
            status,
            headers,
            body,
            http_version: http_version.into(),
        }
    }

    pub fn http_version(&self) -> &str {
        &self.http_version
    }

    pub fn body(&self) -> &Bytes {
        &self.body
    }

    pub fn into_body(self) -> Bytes {
        self.body
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    pub fn redirect_url(&self) -> Option<&str> {
        self.header("location")
    }

    /// First header value matching `name`, case-insensitive.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// All header values matching `name`, case-insensitive.
    pub fn header_all(&self, name: &str) -> Vec<&str> {
        self.headers
            .iter()
            .filter(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
            .collect()
    }

    pub fn content_encoding(&self) -> Option<&str> {
        self.header("content-encoding")
    }

    /// Decode the body per Content-Encoding (gzip, deflate, br, zstd),
    /// falling back to magic-byte sniffing when the header is absent.
    pub fn decoded_body(&self) -> Result<Bytes> {
        match self
            .content_encoding()
            .map(|s| s.to_lowercase())
            .as_deref()
        {
            Some("gzip") | Some("x-gzip") => decode_gzip(&self.body),
            Some("deflate") => decode_deflate(&self.body),
            Some("br") => decode_brotli(&self.body),
            Some("zstd") => decode_zstd(&self.body),
            _ => {
                if self.body.len() >= 4
                    && self.body[..4] == [0x28, 0xb5, 0x2f, 0xfd]
                {
                    return decode_zstd(&self.body);
                }
                if self.body.len() >= 2 && self.body[..2] == [0x1f, 0x8b] {
                    return decode_gzip(&self.body);
                }
                Ok(self.body.clone())
            }
        }
    }

    /// Decoded body as UTF-8 text.
    pub fn text(&self) -> Result<String> {
        let decoded = self.decoded_body()?;
        String::from_utf8(decoded.to_vec())
            .map_err(|e| Error::Decompression(format!("UTF-8 decode error: {e}")))
    }

    /// Decoded body deserialized as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        let text = self.text()?;
        serde_json::from_str(&text).map_err(Error::from)
    }
}

fn decode_gzip(data: &[u8]) -> Result<Bytes> {
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut decoded = Vec::new();
    decoder
        .read_to_end(&mut decoded)
        .map_err(|e| Error::Decompression(format!("gzip: {e}")))?;
    Ok(Bytes::from(decoded))
}

fn decode_deflate(data: &[u8]) -> Result<Bytes> {
    // Servers disagree on whether "deflate" means zlib-wrapped or raw.
    let mut decoded = Vec::new();
    if flate2::read::ZlibDecoder::new(data)
        .read_to_end(&mut decoded)
        .is_ok()
    {
        return Ok(Bytes::from(decoded));
    }
    decoded.clear();
    flate2::read::DeflateDecoder::new(data)
        .read_to_end(&mut decoded)
        .map_err(|e| Error::Decompression(format!("deflate: {e}")))?;
    Ok(Bytes::from(decoded))
}

fn decode_brotli(data: &[u8]) -> Result<Bytes> {
    let mut decoder = brotli::Decompressor::new(data, 4096);
    let mut decoded = Vec::new();
    decoder
        .read_to_end(&mut decoded)
        .map_err(|e| Error::Decompression(format!("brotli: {e}")))?;
    Ok(Bytes::from(decoded))
}

fn decode_zstd(data: &[u8]) -> Result<Bytes> {
    zstd::stream::decode_all(data)
        .map(Bytes::from)
        .map_err(|e| Error::Decompression(format!("zstd: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder =
            flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn gzip_body_is_decoded() {
        let response = Response::new(
            200,
            vec![("Content-Encoding".into(), "gzip".into())],
            Bytes::from(gzip(b"hello world")),
            "HTTP/1.1",
        );
        assert_eq!(response.text().unwrap(), "hello world");
    }

    #[test]
    fn gzip_is_sniffed_without_header() {
        let response = Response::new(200, vec![], Bytes::from(gzip(b"sniffed")), "HTTP/1.1");
        assert_eq!(response.text().unwrap(), "sniffed");
    }

    #[test]
    fn identity_body_passes_through() {
        let response = Response::new(200, vec![], Bytes::from_static(b"plain"), "HTTP/2");
        assert_eq!(response.decoded_body().unwrap(), Bytes::from_static(b"plain"));
    }

    #[test]
    fn duplicate_headers_are_all_reachable() {
        let response = Response::new(
            200,
            vec![
                ("Set-Cookie".into(), "a=1".into()),
                ("Set-Cookie".into(), "b=2".into()),
            ],
            Bytes::new(),
            "HTTP/1.1",
        );
        assert_eq!(response.header_all("set-cookie"), vec!["a=1", "b=2"]);
    }
}
