use crate::cmd::arity_or_invalid;
use crate::db::{CommandError, LpopReply};
use crate::parse::{Parse, ParseError};
use crate::{Connection, Db, Frame};

use tracing::debug;

/// `LPOP key` pops and returns the head element, or a null bulk
/// string if the list is empty or absent. `LPOP key count` instead
/// pops up to `count` elements and always replies with an array (empty
/// if there was nothing to pop).
pub struct Lpop {
    key: String,
    count: Option<i64>,
}

impl Lpop {
    pub(crate) fn parse_frames(parse: &mut Parse) -> Result<Lpop, CommandError> {
        let key = parse
            .next_string()
            .map_err(|e| arity_or_invalid("lpop", e))?;

        let count = match parse.next_int() {
            Ok(n) => Some(n),
            Err(ParseError::EndOfStream) => None,
            Err(e) => return Err(arity_or_invalid("lpop", e)),
        };

        Ok(Lpop { key, count })
    }

    pub(crate) async fn apply(self, db: &Db, dst: &mut Connection) -> crate::Result<()> {
        let response = match db.lpop(&self.key, self.count) {
            Ok(LpopReply::Single(Some(v))) => Frame::Bulk(v),
            Ok(LpopReply::Single(None)) => Frame::Null,
            Ok(LpopReply::Counted(items)) => {
                let mut frame = Frame::array();
                for item in items {
                    frame.push_bulk(item);
                }
                frame
            }
            Err(err) => err.into_frame(),
        };
        debug!(?response);
        dst.write_frame(&response).await?;
        Ok(())
    }
}
