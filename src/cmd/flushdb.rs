use crate::db::CommandError;
use crate::parse::Parse;
use crate::{Connection, Db, Frame};

use tracing::debug;

/// `FLUSHDB` drops every key and wakes every suspended `BLPOP` waiter
/// with a null reply.
pub struct Flushdb;

impl Flushdb {
    pub(crate) fn parse_frames(_parse: &mut Parse) -> Result<Flushdb, CommandError> {
        Ok(Flushdb)
    }

    pub(crate) async fn apply(self, db: &Db, dst: &mut Connection) -> crate::Result<()> {
        db.flush_all();

        let response = Frame::Simple("OK".to_string());
        debug!(?response);
        dst.write_frame(&response).await?;
        Ok(())
    }
}
