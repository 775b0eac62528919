//! HTTP/2 frame codec (RFC 9113).
//!
//! Encoding is wire-order-exact: the SETTINGS encoder takes pre-ordered
//! entries and emits them verbatim, since the SETTINGS order is part of the
//! Akamai fingerprint.

use bytes::{BufMut, Bytes, BytesMut};

/// Client connection preface.
pub const PREFACE: &[u8] = b"PRI * HTTP/2.0\r\n\r\nSM\r\n\r\n";

/// Fixed frame-header length.
pub const FRAME_HEADER_LEN: usize = 9;

/// Default SETTINGS_MAX_FRAME_SIZE.
pub const DEFAULT_MAX_FRAME_SIZE: u32 = 16_384;

pub const FRAME_DATA: u8 = 0x0;
pub const FRAME_HEADERS: u8 = 0x1;
pub const FRAME_PRIORITY: u8 = 0x2;
pub const FRAME_RST_STREAM: u8 = 0x3;
pub const FRAME_SETTINGS: u8 = 0x4;
pub const FRAME_PUSH_PROMISE: u8 = 0x5;
pub const FRAME_PING: u8 = 0x6;
pub const FRAME_GOAWAY: u8 = 0x7;
pub const FRAME_WINDOW_UPDATE: u8 = 0x8;
pub const FRAME_CONTINUATION: u8 = 0x9;

pub const FLAG_END_STREAM: u8 = 0x1;
pub const FLAG_ACK: u8 = 0x1;
pub const FLAG_END_HEADERS: u8 = 0x4;
pub const FLAG_PADDED: u8 = 0x8;
pub const FLAG_PRIORITY: u8 = 0x20;

/// Parsed 9-byte frame header.
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    pub length: u32,
    pub kind: u8,
    pub flags: u8,
    pub stream_id: u32,
}

impl FrameHeader {
    pub fn parse(buf: &[u8]) -> Option<Self> {
        if buf.len() < FRAME_HEADER_LEN {
            return None;
        }
        Some(Self {
            length: (u32::from(buf[0]) << 16) | (u32::from(buf[1]) << 8) | u32::from(buf[2]),
            kind: buf[3],
            flags: buf[4],
            stream_id: u32::from_be_bytes([buf[5] & 0x7f, buf[6], buf[7], buf[8]]),
        })
    }

    pub fn has_flag(&self, flag: u8) -> bool {
        self.flags & flag != 0
    }
}

fn put_frame_header(out: &mut BytesMut, length: usize, kind: u8, flags: u8, stream_id: u32) {
    out.put_u8((length >> 16) as u8);
    out.put_u8((length >> 8) as u8);
    out.put_u8(length as u8);
    out.put_u8(kind);
    out.put_u8(flags);
    out.put_u32(stream_id & 0x7fff_ffff);
}

/// SETTINGS frame from pre-ordered `(id, value)` entries.
pub fn settings(entries: &[(u16, u32)]) -> Bytes {
    let mut out = BytesMut::with_capacity(FRAME_HEADER_LEN + entries.len() * 6);
    put_frame_header(&mut out, entries.len() * 6, FRAME_SETTINGS, 0, 0);
    for &(id, value) in entries {
        out.put_u16(id);
        out.put_u32(value);
    }
    out.freeze()
}

/// SETTINGS acknowledgement.
pub fn settings_ack() -> Bytes {
    let mut out = BytesMut::with_capacity(FRAME_HEADER_LEN);
    put_frame_header(&mut out, 0, FRAME_SETTINGS, FLAG_ACK, 0);
    out.freeze()
}

/// WINDOW_UPDATE with the given delta.
pub fn window_update(stream_id: u32, delta: u32) -> Bytes {
    let mut out = BytesMut::with_capacity(FRAME_HEADER_LEN + 4);
    put_frame_header(&mut out, 4, FRAME_WINDOW_UPDATE, 0, stream_id);
    out.put_u32(delta & 0x7fff_ffff);
    out.freeze()
}

/// Standalone PRIORITY frame. `weight` is the wire byte (human weight - 1).
pub fn priority(stream_id: u32, stream_dep: u32, exclusive: bool, weight: u8) -> Bytes {
    let mut out = BytesMut::with_capacity(FRAME_HEADER_LEN + 5);
    put_frame_header(&mut out, 5, FRAME_PRIORITY, 0, stream_id);
    let dep = if exclusive {
        stream_dep | 0x8000_0000
    } else {
        stream_dep & 0x7fff_ffff
    };
    out.put_u32(dep);
    out.put_u8(weight);
    out.freeze()
}

/// HEADERS frame carrying a header block fragment, with optional inline
/// priority (dep, exclusive, wire weight).
pub fn headers(
    stream_id: u32,
    fragment: &[u8],
    inline_priority: Option<(u32, bool, u8)>,
    end_stream: bool,
    end_headers: bool,
) -> Bytes {
    let mut flags = 0u8;
    if end_stream {
        flags |= FLAG_END_STREAM;
    }
    if end_headers {
        flags |= FLAG_END_HEADERS;
    }
    let priority_len = if inline_priority.is_some() { 5 } else { 0 };
    if inline_priority.is_some() {
        flags |= FLAG_PRIORITY;
    }

    let mut out = BytesMut::with_capacity(FRAME_HEADER_LEN + priority_len + fragment.len());
    put_frame_header(
        &mut out,
        priority_len + fragment.len(),
        FRAME_HEADERS,
        flags,
        stream_id,
    );
    if let Some((dep, exclusive, weight)) = inline_priority {
        let dep = if exclusive { dep | 0x8000_0000 } else { dep & 0x7fff_ffff };
        out.put_u32(dep);
        out.put_u8(weight);
    }
    out.put_slice(fragment);
    out.freeze()
}

/// CONTINUATION frame for oversized header blocks.
pub fn continuation(stream_id: u32, fragment: &[u8], end_headers: bool) -> Bytes {
    let mut out = BytesMut::with_capacity(FRAME_HEADER_LEN + fragment.len());
    put_frame_header(
        &mut out,
        fragment.len(),
        FRAME_CONTINUATION,
        if end_headers { FLAG_END_HEADERS } else { 0 },
        stream_id,
    );
    out.put_slice(fragment);
    out.freeze()
}

/// DATA frame.
pub fn data(stream_id: u32, chunk: &[u8], end_stream: bool) -> Bytes {
    let mut out = BytesMut::with_capacity(FRAME_HEADER_LEN + chunk.len());
    put_frame_header(
        &mut out,
        chunk.len(),
        FRAME_DATA,
        if end_stream { FLAG_END_STREAM } else { 0 },
        stream_id,
    );
    out.put_slice(chunk);
    out.freeze()
}

/// RST_STREAM with an error code.
pub fn rst_stream(stream_id: u32, error_code: u32) -> Bytes {
    let mut out = BytesMut::with_capacity(FRAME_HEADER_LEN + 4);
    put_frame_header(&mut out, 4, FRAME_RST_STREAM, 0, stream_id);
    out.put_u32(error_code);
    out.freeze()
}

/// PING acknowledgement echoing the peer's payload.
pub fn ping_ack(payload: &[u8; 8]) -> Bytes {
    let mut out = BytesMut::with_capacity(FRAME_HEADER_LEN + 8);
    put_frame_header(&mut out, 8, FRAME_PING, FLAG_ACK, 0);
    out.put_slice(payload);
    out.freeze()
}

/// GOAWAY frame.
pub fn goaway(last_stream_id: u32, error_code: u32) -> Bytes {
    let mut out = BytesMut::with_capacity(FRAME_HEADER_LEN + 8);
    put_frame_header(&mut out, 8, FRAME_GOAWAY, 0, 0);
    out.put_u32(last_stream_id & 0x7fff_ffff);
    out.put_u32(error_code);
    out.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_entries_keep_their_order() {
        let frame = settings(&[(1, 65536), (2, 0), (4, 6291456), (6, 262144)]);
        let header = FrameHeader::parse(&frame).unwrap();
        assert_eq!(header.kind, FRAME_SETTINGS);
        assert_eq!(header.length, 24);
        assert_eq!(header.stream_id, 0);

        // First entry is HEADER_TABLE_SIZE, second ENABLE_PUSH: order is
        // exactly what was passed in.
        let payload = &frame[FRAME_HEADER_LEN..];
        assert_eq!(&payload[0..2], &[0, 1]);
        assert_eq!(&payload[6..8], &[0, 2]);
        assert_eq!(&payload[12..14], &[0, 4]);
        assert_eq!(&payload[18..20], &[0, 6]);
    }

    #[test]
    fn window_update_encodes_delta() {
        let frame = window_update(0, 15_663_105);
        let header = FrameHeader::parse(&frame).unwrap();
        assert_eq!(header.kind, FRAME_WINDOW_UPDATE);
        let delta = u32::from_be_bytes(frame[FRAME_HEADER_LEN..].try_into().unwrap());
        assert_eq!(delta, 15_663_105);
    }

    #[test]
    fn headers_with_exclusive_priority_sets_high_bit() {
        let frame = headers(1, b"\x82", Some((0, true, 255)), true, true);
        let header = FrameHeader::parse(&frame).unwrap();
        assert!(header.has_flag(FLAG_PRIORITY));
        assert!(header.has_flag(FLAG_END_STREAM));
        assert!(header.has_flag(FLAG_END_HEADERS));

        let dep = u32::from_be_bytes(frame[FRAME_HEADER_LEN..FRAME_HEADER_LEN + 4].try_into().unwrap());
        assert_eq!(dep, 0x8000_0000);
        assert_eq!(frame[FRAME_HEADER_LEN + 4], 255);
    }

    #[test]
    fn frame_header_roundtrip() {
        let frame = data(7, b"abc", false);
        let header = FrameHeader::parse(&frame).unwrap();
        assert_eq!(header.kind, FRAME_DATA);
        assert_eq!(header.length, 3);
        assert_eq!(header.stream_id, 7);
        assert!(!header.has_flag(FLAG_END_STREAM));
    }
}
