use crate::cmd::arity_or_invalid;
use crate::db::CommandError;
use crate::parse::Parse;
use crate::{Connection, Db, Frame};

use tracing::debug;

/// `LRANGE key start stop` — negative indices count from the tail, as
/// in Redis; an empty or out-of-range window replies with an empty
/// array rather than an error.
pub struct Lrange {
    key: String,
    start: i64,
    stop: i64,
}

impl Lrange {
    pub(crate) fn parse_frames(parse: &mut Parse) -> Result<Lrange, CommandError> {
        let key = parse
            .next_string()
            .map_err(|e| arity_or_invalid("lrange", e))?;
        let start = parse
            .next_int()
            .map_err(|e| arity_or_invalid("lrange", e))?;
        let stop = parse
            .next_int()
            .map_err(|e| arity_or_invalid("lrange", e))?;
        Ok(Lrange { key, start, stop })
    }

    pub(crate) async fn apply(self, db: &Db, dst: &mut Connection) -> crate::Result<()> {
        let response = match db.lrange(&self.key, self.start, self.stop) {
            Ok(items) => {
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
