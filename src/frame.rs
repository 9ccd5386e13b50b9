//! RESP framing: decoding inbound requests from a byte stream and
//! encoding typed replies back onto the wire.
//!
//! Inbound frames are constrained by the protocol to a single shape —
//! an Array of Bulk Strings — so decoding is specialized to that shape
//! rather than routed through a general recursive frame type. Outbound
//! replies use the full variety of RESP2 types.

use bytes::{Buf, Bytes, BytesMut};
use std::convert::TryInto;
use std::fmt;
use std::io::Cursor;

/// A reply value the server can send back to a client.
#[derive(Clone, Debug)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(u64),
    Bulk(Bytes),
    Null,
    Array(Vec<Frame>),
    NullArray,
}

impl Frame {
    pub(crate) fn array() -> Frame {
        Frame::Array(vec![])
    }

    pub(crate) fn push_bulk(&mut self, bytes: Bytes) {
        match self {
            Frame::Array(vec) => vec.push(Frame::Bulk(bytes)),
            _ => panic!("not an array frame"),
        }
    }

    /// Serializes this frame onto `dst` in RESP2 wire format.
    pub(crate) fn encode(&self, dst: &mut Vec<u8>) {
        match self {
            Frame::Simple(s) => {
                dst.push(b'+');
                dst.extend_from_slice(s.as_bytes());
                dst.extend_from_slice(b"\r\n");
            }
            Frame::Error(s) => {
                dst.push(b'-');
                dst.extend_from_slice(s.as_bytes());
                dst.extend_from_slice(b"\r\n");
            }
            Frame::Integer(n) => {
                dst.push(b':');
                dst.extend_from_slice(n.to_string().as_bytes());
                dst.extend_from_slice(b"\r\n");
            }
            Frame::Bulk(bytes) => {
                dst.push(b'$');
                dst.extend_from_slice(bytes.len().to_string().as_bytes());
                dst.extend_from_slice(b"\r\n");
                dst.extend_from_slice(bytes);
                dst.extend_from_slice(b"\r\n");
            }
            Frame::Null => dst.extend_from_slice(b"$-1\r\n"),
            Frame::NullArray => dst.extend_from_slice(b"*-1\r\n"),
            Frame::Array(items) => {
                dst.push(b'*');
                dst.extend_from_slice(items.len().to_string().as_bytes());
                dst.extend_from_slice(b"\r\n");
                for item in items {
                    item.encode(dst);
                }
            }
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Frame::Simple(response) => response.fmt(fmt),
            Frame::Error(msg) => write!(fmt, "error: {}", msg),
            Frame::Integer(num) => num.fmt(fmt),
            Frame::Bulk(msg) => match std::str::from_utf8(msg) {
                Ok(string) => string.fmt(fmt),
                Err(_) => write!(fmt, "{:?}", msg),
            },
            Frame::Null | Frame::NullArray => "(nil)".fmt(fmt),
            Frame::Array(parts) => {
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        write!(fmt, " ")?;
                    }
                    part.fmt(fmt)?;
                }
                Ok(())
            }
        }
    }
}

/// A single decoded request: the command name plus its arguments, each
/// preserved byte-exact.
pub type Request = Vec<Bytes>;

/// A framing-level protocol violation. The connection is closed when
/// this is encountered; it is never surfaced to a client as a reply.
#[derive(Debug)]
pub struct ProtocolError(pub String);

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "protocol error; {}", self.0)
    }
}

impl std::error::Error for ProtocolError {}

enum Scan {
    Incomplete,
    Protocol(String),
}

/// Attempts to decode one complete request from the front of `buf`.
///
/// Returns `Ok(None)` when the buffer does not yet hold a complete
/// frame — the caller should read more bytes from the socket and try
/// again. On success, the consumed bytes are advanced out of `buf`.
pub(crate) fn parse_request(buf: &mut BytesMut) -> Result<Option<Request>, ProtocolError> {
    let mut cursor = Cursor::new(&buf[..]);

    match scan_request(&mut cursor) {
        Ok(items) => {
            let consumed = cursor.position() as usize;
            let parsed = buf.split_to(consumed);
            Ok(Some(decode_items(&parsed[..], items)))
        }
        Err(Scan::Incomplete) => Ok(None),
        Err(Scan::Protocol(msg)) => Err(ProtocolError(msg)),
    }
}

/// The byte ranges (relative to the scanned buffer) of each bulk
/// string argument, produced by `scan_request` and materialized by
/// `decode_items` once the frame is known to be complete.
type ItemRange = (usize, usize);

fn scan_request(src: &mut Cursor<&[u8]>) -> Result<Vec<ItemRange>, Scan> {
    match get_u8(src)? {
        b'*' => {}
        actual => {
            return Err(Scan::Protocol(format!(
                "invalid frame type byte '{}', expected '*'",
                actual as char
            )))
        }
    }

    let len = get_decimal(src)?;
    let mut items = Vec::with_capacity(len as usize);

    for _ in 0..len {
        match get_u8(src)? {
            b'$' => {}
            actual => {
                return Err(Scan::Protocol(format!(
                    "invalid frame type byte '{}', expected '$'",
                    actual as char
                )))
            }
        }

        let len = get_decimal(src)?;
        let len: usize = len
            .try_into()
            .map_err(|_| Scan::Protocol("bulk string length out of range".into()))?;

        let start = src.position() as usize;
        let end = start + len;
        if src.get_ref().len() < end + 2 {
            return Err(Scan::Incomplete);
        }
        if &src.get_ref()[end..end + 2] != b"\r\n" {
            return Err(Scan::Protocol("missing CRLF after bulk string".into()));
        }

        src.set_position((end + 2) as u64);
        items.push((start, end));
    }

    Ok(items)
}

fn decode_items(buf: &[u8], items: Vec<ItemRange>) -> Request {
    items
        .into_iter()
        .map(|(start, end)| Bytes::copy_from_slice(&buf[start..end]))
        .collect()
}

fn get_u8(src: &mut Cursor<&[u8]>) -> Result<u8, Scan> {
    if !src.has_remaining() {
        return Err(Scan::Incomplete);
    }
    Ok(src.get_u8())
}

fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Scan> {
    let start = src.position() as usize;
    let buf = src.get_ref();
    if buf.len() < start + 1 {
        return Err(Scan::Incomplete);
    }
    let end = buf.len() - 1;

    let mut found = None;
    for i in start..end {
        if buf[i] == b'\r' && buf[i + 1] == b'\n' {
            found = Some(i);
            break;
        }
    }

    match found {
        Some(i) => {
            src.set_position((i + 2) as u64);
            Ok(&src.get_ref()[start..i])
        }
        None => Err(Scan::Incomplete),
    }
}

fn get_decimal(src: &mut Cursor<&[u8]>) -> Result<u64, Scan> {
    use atoi::atoi;

    let line = get_line(src)?;
    atoi::<u64>(line).ok_or_else(|| Scan::Protocol("invalid length in frame".into()))
}

/// Attempts to decode one complete reply [`Frame`] from the front of
/// `buf`. Used only by the client: replies use the full RESP2 variety,
/// unlike requests, which are always an array of bulk strings.
pub(crate) fn parse_reply(buf: &mut BytesMut) -> Result<Option<Frame>, ProtocolError> {
    let mut cursor = Cursor::new(&buf[..]);

    match get_reply(&mut cursor) {
        Ok(frame) => {
            let consumed = cursor.position() as usize;
            buf.split_to(consumed);
            Ok(Some(frame))
        }
        Err(Scan::Incomplete) => Ok(None),
        Err(Scan::Protocol(msg)) => Err(ProtocolError(msg)),
    }
}

fn get_reply(src: &mut Cursor<&[u8]>) -> Result<Frame, Scan> {
    match get_u8(src)? {
        b'+' => {
            let line = get_line(src)?;
            Ok(Frame::Simple(String::from_utf8_lossy(line).into_owned()))
        }
        b'-' => {
            let line = get_line(src)?;
            Ok(Frame::Error(String::from_utf8_lossy(line).into_owned()))
        }
        b':' => Ok(Frame::Integer(get_decimal(src)?)),
        b'$' => {
            let line = get_line(src)?;
            let len: i64 = atoi::atoi(line)
                .ok_or_else(|| Scan::Protocol("invalid bulk string length".into()))?;
            if len == -1 {
                return Ok(Frame::Null);
            }
            let len = len as usize;
            let start = src.position() as usize;
            let end = start + len;
            if src.get_ref().len() < end + 2 {
                return Err(Scan::Incomplete);
            }
            let data = Bytes::copy_from_slice(&src.get_ref()[start..end]);
            src.set_position((end + 2) as u64);
            Ok(Frame::Bulk(data))
        }
        b'*' => {
            let line = get_line(src)?;
            let len: i64 = atoi::atoi(line)
                .ok_or_else(|| Scan::Protocol("invalid array length".into()))?;
            if len == -1 {
                return Ok(Frame::NullArray);
            }
            let mut items = Vec::with_capacity(len as usize);
            for _ in 0..len {
                items.push(get_reply(src)?);
            }
            Ok(Frame::Array(items))
        }
        actual => Err(Scan::Protocol(format!(
            "invalid reply type byte '{}'",
            actual as char
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(bytes: &[u8]) -> BytesMut {
        BytesMut::from(bytes)
    }

    #[test]
    fn decodes_simple_request() {
        let mut buf = req(b"*2\r\n$4\r\nPING\r\n$3\r\nfoo\r\n");
        let r = parse_request(&mut buf).unwrap().unwrap();
        assert_eq!(r, vec![Bytes::from("PING"), Bytes::from("foo")]);
        assert!(buf.is_empty());
    }

    #[test]
    fn incomplete_frame_is_not_an_error() {
        let mut buf = req(b"*2\r\n$4\r\nPING\r\n$3\r\nfo");
        let r = parse_request(&mut buf).unwrap();
        assert!(r.is_none());
    }

    #[test]
    fn binary_safe_bulk_body() {
        let mut buf = req(b"*1\r\n$4\r\na\r\nb\r\n");
        let r = parse_request(&mut buf).unwrap().unwrap();
        assert_eq!(r, vec![Bytes::from_static(b"a\r\nb")]);
    }

    #[test]
    fn two_requests_in_one_read() {
        let mut buf = req(b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPING\r\n");
        let first = parse_request(&mut buf).unwrap().unwrap();
        assert_eq!(first, vec![Bytes::from("PING")]);
        let second = parse_request(&mut buf).unwrap().unwrap();
        assert_eq!(second, vec![Bytes::from("PING")]);
        assert!(buf.is_empty());
    }

    #[test]
    fn rejects_bad_leading_byte() {
        let mut buf = req(b"+PING\r\n");
        assert!(parse_request(&mut buf).is_err());
    }

    #[test]
    fn rejects_missing_crlf() {
        let mut buf = req(b"*1\r\n$3\r\nfooXX");
        assert!(parse_request(&mut buf).is_err());
    }
}
