use crate::cmd::arity_or_invalid;
use crate::db::CommandError;
use crate::parse::ParseError;
use crate::parse::Parse;
use crate::{Connection, Frame};

use tracing::debug;

/// `COMMAND` and `COMMAND DOCS` both reply with an empty array; this
/// server doesn't expose command introspection beyond acknowledging
/// the request shape clients probe with on connect.
pub struct CommandDocs;

impl CommandDocs {
    pub(crate) fn parse_frames(parse: &mut Parse) -> Result<CommandDocs, CommandError> {
        match parse.next_string() {
            Ok(sub) if sub.eq_ignore_ascii_case("docs") => Ok(CommandDocs),
            Ok(other) => Err(CommandError::InvalidArgument(format!(
                "unknown subcommand '{}'",
                other
            ))),
            Err(ParseError::EndOfStream) => Ok(CommandDocs),
            Err(e) => Err(arity_or_invalid("command", e)),
        }
    }

    pub(crate) async fn apply(self, dst: &mut Connection) -> crate::Result<()> {
        let response = Frame::array();
        debug!(?response);
        dst.write_frame(&response).await?;
        Ok(())
    }
}
