use crate::cmd::arity_or_invalid;
use crate::db::CommandError;
use crate::parse::{Parse, ParseError};
use crate::{Connection, Db, Frame};

use bytes::Bytes;
use tracing::debug;

/// `XADD key id field value [field value ...]` appends an entry to a
/// stream, validating and possibly auto-assigning `id` per the
/// grammar documented on [`Db::xadd`].
pub struct Xadd {
    key: String,
    id: String,
    fields: Vec<(Bytes, Bytes)>,
}

impl Xadd {
    pub(crate) fn parse_frames(parse: &mut Parse) -> Result<Xadd, CommandError> {
        let key = parse
            .next_string()
            .map_err(|e| arity_or_invalid("xadd", e))?;
        let id = parse
            .next_string()
            .map_err(|e| arity_or_invalid("xadd", e))?;

        let mut fields = Vec::new();
        loop {
            let field = match parse.next_bytes() {
                Ok(f) => f,
                Err(ParseError::EndOfStream) => break,
                Err(e) => return Err(arity_or_invalid("xadd", e)),
            };
            let value = parse.next_bytes().map_err(|e| arity_or_invalid("xadd", e))?;
            fields.push((field, value));
        }

        if fields.is_empty() {
            return Err(CommandError::WrongArity("xadd".to_string()));
        }

        Ok(Xadd { key, id, fields })
    }

    pub(crate) async fn apply(self, db: &Db, dst: &mut Connection) -> crate::Result<()> {
        let response = match db.xadd(&self.key, &self.id, self.fields) {
            Ok(id) => Frame::Bulk(Bytes::from(id)),
            Err(err) => err.into_frame(),
        };
        debug!(?response);
        dst.write_frame(&response).await?;
        Ok(())
    }
}
