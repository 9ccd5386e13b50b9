use crate::cmd::arity_or_invalid;
use crate::db::CommandError;
use crate::parse::{Parse, ParseError};
use crate::{Connection, Db, Frame};

use bytes::Bytes;
use std::time::Duration;
use tracing::debug;

/// `SET key value` / `SET key value PX milliseconds`.
///
/// This server only accepts the millisecond-precision `PX` tail; `EX`
/// and the other Redis `SET` options are out of scope.
pub struct Set {
    key: String,
    value: Bytes,
    expire: Option<Duration>,
}

impl Set {
    pub fn new(key: impl ToString, value: Bytes, expire: Option<Duration>) -> Set {
        Set {
            key: key.to_string(),
            value,
            expire,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn value(&self) -> &Bytes {
        &self.value
    }

    pub fn expire(&self) -> Option<Duration> {
        self.expire
    }

    pub(crate) fn parse_frames(parse: &mut Parse) -> Result<Set, CommandError> {
        let key = parse.next_string().map_err(|e| arity_or_invalid("set", e))?;
        let value = parse.next_bytes().map_err(|e| arity_or_invalid("set", e))?;

        let mut expire = None;

        match parse.next_string() {
            Ok(opt) if opt.eq_ignore_ascii_case("px") => {
                let ms = parse.next_int().map_err(|e| arity_or_invalid("set", e))?;
                if ms < 0 {
                    return Err(CommandError::InvalidArgument(
                        "invalid expire time in 'set' command".to_string(),
                    ));
                }
                expire = Some(Duration::from_millis(ms as u64));
            }
            Ok(other) => {
                return Err(CommandError::InvalidArgument(format!(
                    "unsupported option '{}' for 'set'",
                    other
                )))
            }
            Err(ParseError::EndOfStream) => {}
            Err(e) => return Err(arity_or_invalid("set", e)),
        }

        Ok(Set { key, value, expire })
    }

    pub(crate) async fn apply(self, db: &Db, dst: &mut Connection) -> crate::Result<()> {
        db.set_string(self.key, self.value, self.expire);

        let response = Frame::Simple("OK".to_string());
        debug!(?response);
        dst.write_frame(&response).await?;
        Ok(())
    }

    /// Encodes this command as a request frame, for the CLI client.
    pub(crate) fn into_frame(self) -> Frame {
        let mut frame = Frame::array();
        frame.push_bulk(Bytes::from("set"));
        frame.push_bulk(Bytes::from(self.key.into_bytes()));
        frame.push_bulk(self.value);
        if let Some(ms) = self.expire {
            frame.push_bulk(Bytes::from("px"));
            frame.push_bulk(Bytes::from(ms.as_millis().to_string()));
        }
        frame
    }
}
