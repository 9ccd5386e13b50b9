use crate::frame::Request;

use bytes::Bytes;
use std::fmt;
use std::vec;

/// Command argument parsing utility.
///
/// A request is a vector of byte-string tokens. `Parse` wraps that
/// vector and offers a cursor-style API; each command's
/// `parse_frames` uses it to pull out its own fields in order.
pub(crate) struct Parse {
    parts: vec::IntoIter<Bytes>,
}

/// An error encountered while parsing a request's arguments.
///
/// `EndOfStream` means a required argument was missing — callers turn
/// this into a `WrongArity` reply rather than closing the connection.
/// Every other variant is a malformed argument and becomes an
/// `InvalidArgument` reply; both keep the connection open, unlike a
/// framing-level `ProtocolError`.
#[derive(Debug)]
pub(crate) enum ParseError {
    EndOfStream,
    Other(String),
}

impl Parse {
    /// Creates a new `Parse` over an already-decoded request. The
    /// command name occupies the first slot, same as every other
    /// argument.
    pub(crate) fn new(request: Request) -> Parse {
        Parse {
            parts: request.into_iter(),
        }
    }

    fn next(&mut self) -> Result<Bytes, ParseError> {
        self.parts.next().ok_or(ParseError::EndOfStream)
    }

    /// Returns the next entry as a UTF-8 string.
    pub(crate) fn next_string(&mut self) -> Result<String, ParseError> {
        let bytes = self.next()?;
        String::from_utf8(bytes.to_vec()).map_err(|_| ParseError::Other("invalid string".into()))
    }

    /// Returns the next entry as raw bytes, preserved byte-exact.
    pub(crate) fn next_bytes(&mut self) -> Result<Bytes, ParseError> {
        self.next()
    }

    /// Returns the next entry parsed as a signed decimal integer.
    pub(crate) fn next_int(&mut self) -> Result<i64, ParseError> {
        let bytes = self.next()?;
        atoi::atoi::<i64>(&bytes)
            .ok_or_else(|| ParseError::Other("value is not an integer or out of range".into()))
    }

    /// Confirms no unconsumed arguments remain.
    pub(crate) fn finish(&mut self) -> Result<(), ParseError> {
        if self.parts.next().is_none() {
            Ok(())
        } else {
            Err(ParseError::Other("too many arguments".into()))
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::EndOfStream => "protocol error; unexpected end of stream".fmt(f),
            ParseError::Other(msg) => msg.fmt(f),
        }
    }
}

impl std::error::Error for ParseError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_of(args: &[&str]) -> Parse {
        Parse::new(args.iter().map(|s| Bytes::from(s.to_string())).collect())
    }

    #[test]
    fn reads_strings_in_order() {
        let mut p = parse_of(&["set", "k", "v"]);
        assert_eq!(p.next_string().unwrap(), "set");
        assert_eq!(p.next_string().unwrap(), "k");
        assert_eq!(p.next_string().unwrap(), "v");
        assert!(p.finish().is_ok());
    }

    #[test]
    fn missing_argument_is_end_of_stream() {
        let mut p = parse_of(&["get"]);
        p.next_string().unwrap();
        assert!(matches!(p.next_string(), Err(ParseError::EndOfStream)));
    }

    #[test]
    fn trailing_argument_fails_finish() {
        let mut p = parse_of(&["ping", "extra"]);
        p.next_string().unwrap();
        assert!(p.finish().is_err());
    }

    #[test]
    fn next_int_rejects_non_numeric() {
        let mut p = parse_of(&["notanumber"]);
        assert!(matches!(p.next_int(), Err(ParseError::Other(_))));
    }
}
