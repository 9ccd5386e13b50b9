use crate::cmd::arity_or_invalid;
use crate::db::CommandError;
use crate::parse::Parse;
use crate::{Connection, Db, Frame};

use tracing::debug;

/// `LLEN key` returns the list's length, or `0` if the key is absent.
pub struct Llen {
    key: String,
}

impl Llen {
    pub(crate) fn parse_frames(parse: &mut Parse) -> Result<Llen, CommandError> {
        let key = parse
            .next_string()
            .map_err(|e| arity_or_invalid("llen", e))?;
        Ok(Llen { key })
    }

    pub(crate) async fn apply(self, db: &Db, dst: &mut Connection) -> crate::Result<()> {
        let response = match db.llen(&self.key) {
            Ok(len) => Frame::Integer(len as u64),
            Err(err) => err.into_frame(),
        };
        debug!(?response);
        dst.write_frame(&response).await?;
        Ok(())
    }
}
