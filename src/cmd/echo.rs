use crate::cmd::arity_or_invalid;
use crate::db::CommandError;
use crate::parse::Parse;
use crate::{Connection, Frame};

use bytes::Bytes;
use tracing::debug;

/// `ECHO message` replies with `message`, unchanged.
pub struct Echo {
    message: Bytes,
}

impl Echo {
    pub(crate) fn parse_frames(parse: &mut Parse) -> Result<Echo, CommandError> {
        let message = parse.next_bytes().map_err(|e| arity_or_invalid("echo", e))?;
        Ok(Echo { message })
    }

    pub(crate) async fn apply(self, dst: &mut Connection) -> crate::Result<()> {
        let response = Frame::Bulk(self.message);
        debug!(?response);
        dst.write_frame(&response).await?;
        Ok(())
    }
}
