use crate::cmd::arity_or_invalid;
use crate::db::CommandError;
use crate::parse::Parse;
use crate::{Connection, Db, Frame};

use tracing::debug;

/// `TYPE key` replies with the resolved type name, or `none` if the
/// key is absent or expired.
pub struct Type {
    key: String,
}

impl Type {
    pub(crate) fn parse_frames(parse: &mut Parse) -> Result<Type, CommandError> {
        let key = parse
            .next_string()
            .map_err(|e| arity_or_invalid("type", e))?;
        Ok(Type { key })
    }

    pub(crate) async fn apply(self, db: &Db, dst: &mut Connection) -> crate::Result<()> {
        let response = Frame::Simple(db.type_of(&self.key).to_string());
        debug!(?response);
        dst.write_frame(&response).await?;
        Ok(())
    }
}
