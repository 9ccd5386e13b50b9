use crate::db::CommandError;
use crate::Connection;

use tracing::debug;

/// Represents an invalid request: either a command name the server
/// doesn't recognize, or a recognized command whose arguments failed
/// to parse. Either way the reply is a single error frame and the
/// connection stays open.
pub struct Unknown {
    name: String,
    error: CommandError,
}

impl Unknown {
    /// Builds the reply for a genuinely unrecognized command name.
    pub(crate) fn new(name: String) -> Unknown {
        Unknown {
            error: CommandError::UnknownCommand(name.clone()),
            name,
        }
    }

    /// Builds the reply for a recognized command whose own parsing
    /// failed (wrong arity, a bad integer, ...). `name` is carried for
    /// logging; the reply itself is `error`.
    pub(crate) fn from_error(name: String, error: CommandError) -> Unknown {
        Unknown { name, error }
    }

    pub(crate) fn get_name(&self) -> &str {
        &self.name
    }

    pub(crate) async fn apply(self, dst: &mut Connection) -> crate::Result<()> {
        let response = self.error.into_frame();
        debug!(?response);
        dst.write_frame(&response).await?;
        Ok(())
    }
}
