use crate::cmd::arity_or_invalid;
use crate::db::CommandError;
use crate::parse::Parse;
use crate::{Connection, Db, Frame};

use tracing::debug;

/// `GET key` returns the key's string value, or a null bulk string if
/// it is absent. A key holding a non-string value is a type error —
/// `GET` only ever deals in strings.
pub struct Get {
    key: String,
}

impl Get {
    pub fn new(key: impl ToString) -> Get {
        Get {
            key: key.to_string(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub(crate) fn parse_frames(parse: &mut Parse) -> Result<Get, CommandError> {
        let key = parse.next_string().map_err(|e| arity_or_invalid("get", e))?;
        Ok(Get { key })
    }

    pub(crate) async fn apply(self, db: &Db, dst: &mut Connection) -> crate::Result<()> {
        let response = match db.get_string_checked(&self.key) {
            Ok(Some(value)) => Frame::Bulk(value),
            Ok(None) => Frame::Null,
            Err(err) => err.into_frame(),
        };

        debug!(?response);
        dst.write_frame(&response).await?;
        Ok(())
    }

    /// Encodes this command as a request frame, for the CLI client.
    pub(crate) fn into_frame(self) -> Frame {
        let mut frame = Frame::array();
        frame.push_bulk(bytes::Bytes::from("get"));
        frame.push_bulk(bytes::Bytes::from(self.key.into_bytes()));
        frame
    }
}
