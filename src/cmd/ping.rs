use crate::db::CommandError;
use crate::parse::Parse;
use crate::{Connection, Frame};

use tracing::debug;

/// `PING` takes no arguments and always replies `PONG`.
pub struct Ping;

impl Ping {
    pub(crate) fn parse_frames(_parse: &mut Parse) -> Result<Ping, CommandError> {
        Ok(Ping)
    }

    pub(crate) async fn apply(self, dst: &mut Connection) -> crate::Result<()> {
        let response = Frame::Simple("PONG".to_string());
        debug!(?response);
        dst.write_frame(&response).await?;
        Ok(())
    }
}
