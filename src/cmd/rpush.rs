use crate::cmd::arity_or_invalid;
use crate::db::CommandError;
use crate::parse::{Parse, ParseError};
use crate::{Connection, Db, Frame};

use bytes::Bytes;
use tracing::debug;

/// `RPUSH key value [value ...]` appends each value, in order, and
/// hands off to any waiting `BLPOP` callers in the same atomic step.
pub struct Rpush {
    key: String,
    values: Vec<Bytes>,
}

impl Rpush {
    pub(crate) fn parse_frames(parse: &mut Parse) -> Result<Rpush, CommandError> {
        let key = parse
            .next_string()
            .map_err(|e| arity_or_invalid("rpush", e))?;

        let mut values = vec![parse
            .next_bytes()
            .map_err(|e| arity_or_invalid("rpush", e))?];

        loop {
            match parse.next_bytes() {
                Ok(v) => values.push(v),
                Err(ParseError::EndOfStream) => break,
                Err(e) => return Err(arity_or_invalid("rpush", e)),
            }
        }

        Ok(Rpush { key, values })
    }

    pub(crate) async fn apply(self, db: &Db, dst: &mut Connection) -> crate::Result<()> {
        let response = match db.rpush(&self.key, self.values) {
            Ok(len) => Frame::Integer(len as u64),
            Err(err) => err.into_frame(),
        };
        debug!(?response);
        dst.write_frame(&response).await?;
        Ok(())
    }
}
