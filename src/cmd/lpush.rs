use crate::cmd::arity_or_invalid;
use crate::db::CommandError;
use crate::parse::{Parse, ParseError};
use crate::{Connection, Db, Frame};

use bytes::Bytes;
use tracing::debug;

/// `LPUSH key value [value ...]` prepends each value at the head, in
/// the order given, so the first argument ends up deepest and the
/// last argument ends up at position 0.
pub struct Lpush {
    key: String,
    values: Vec<Bytes>,
}

impl Lpush {
    pub(crate) fn parse_frames(parse: &mut Parse) -> Result<Lpush, CommandError> {
        let key = parse
            .next_string()
            .map_err(|e| arity_or_invalid("lpush", e))?;

        let mut values = vec![parse
            .next_bytes()
            .map_err(|e| arity_or_invalid("lpush", e))?];

        loop {
            match parse.next_bytes() {
                Ok(v) => values.push(v),
                Err(ParseError::EndOfStream) => break,
                Err(e) => return Err(arity_or_invalid("lpush", e)),
            }
        }

        Ok(Lpush { key, values })
    }

    pub(crate) async fn apply(self, db: &Db, dst: &mut Connection) -> crate::Result<()> {
        let response = match db.lpush(&self.key, self.values) {
            Ok(len) => Frame::Integer(len as u64),
            Err(err) => err.into_frame(),
        };
        debug!(?response);
        dst.write_frame(&response).await?;
        Ok(())
    }
}
