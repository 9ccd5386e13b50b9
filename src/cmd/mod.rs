mod blpop;
pub use blpop::Blpop;

mod command_docs;
pub use command_docs::CommandDocs;

mod echo;
pub use echo::Echo;

mod flushdb;
pub use flushdb::Flushdb;

mod get;
pub use get::Get;

mod llen;
pub use llen::Llen;

mod lpop;
pub use lpop::Lpop;

mod lpush;
pub use lpush::Lpush;

mod lrange;
pub use lrange::Lrange;

mod ping;
pub use ping::Ping;

mod rpush;
pub use rpush::Rpush;

mod set;
pub use set::Set;

mod r#type;
pub use r#type::Type;

mod unknown;
pub use unknown::Unknown;

mod xadd;
pub use xadd::Xadd;

use crate::db::CommandError;
use crate::frame::Request;
use crate::parse::{Parse, ParseError};
use crate::{Connection, Db, Shutdown};

/// Every command this server recognizes. `Command::from_frame` parses
/// one of these out of a decoded request; `apply` runs it against the
/// shared keyspace and writes its reply.
pub enum Command {
    Blpop(Blpop),
    CommandDocs(CommandDocs),
    Echo(Echo),
    Flushdb(Flushdb),
    Get(Get),
    Llen(Llen),
    Lpop(Lpop),
    Lpush(Lpush),
    Lrange(Lrange),
    Ping(Ping),
    Rpush(Rpush),
    Set(Set),
    Type(Type),
    Xadd(Xadd),
    Unknown(Unknown),
}

/// Turns an argument-parsing failure into the reply it should produce.
///
/// A missing argument is an arity error; anything else (a non-integer
/// where one was expected, an oversized bulk string, ...) is a generic
/// invalid-argument error naming that command.
pub(crate) fn arity_or_invalid(name: &str, err: ParseError) -> CommandError {
    match err {
        ParseError::EndOfStream => CommandError::WrongArity(name.to_string()),
        ParseError::Other(msg) => CommandError::InvalidArgument(msg),
    }
}

impl Command {
    /// Parses a command out of an already-decoded request.
    ///
    /// The only error this returns is one that should close the
    /// connection — it never happens in practice here, since every
    /// `CommandError` a command's own parsing can produce is instead
    /// carried inside `Command::Unknown`'s sibling, the per-command
    /// arity/argument checks that run in `apply`. This split exists so
    /// a command whose name we don't recognize never has to finish
    /// parsing an argument list shaped for some other command.
    pub fn from_frame(request: Request) -> Command {
        let mut parse = Parse::new(request);

        let command_name = match parse.next_string() {
            Ok(name) => name.to_lowercase(),
            Err(_) => return Command::Unknown(Unknown::new(String::new())),
        };

        let parsed = match &command_name[..] {
            "blpop" => Blpop::parse_frames(&mut parse).map(Command::Blpop),
            "command" => CommandDocs::parse_frames(&mut parse).map(Command::CommandDocs),
            "echo" => Echo::parse_frames(&mut parse).map(Command::Echo),
            "flushdb" => Flushdb::parse_frames(&mut parse).map(Command::Flushdb),
            "get" => Get::parse_frames(&mut parse).map(Command::Get),
            "llen" => Llen::parse_frames(&mut parse).map(Command::Llen),
            "lpop" => Lpop::parse_frames(&mut parse).map(Command::Lpop),
            "lpush" => Lpush::parse_frames(&mut parse).map(Command::Lpush),
            "lrange" => Lrange::parse_frames(&mut parse).map(Command::Lrange),
            "ping" => Ping::parse_frames(&mut parse).map(Command::Ping),
            "rpush" => Rpush::parse_frames(&mut parse).map(Command::Rpush),
            "set" => Set::parse_frames(&mut parse).map(Command::Set),
            "type" => Type::parse_frames(&mut parse).map(Command::Type),
            "xadd" => Xadd::parse_frames(&mut parse).map(Command::Xadd),
            _ => return Command::Unknown(Unknown::new(command_name)),
        };

        match parsed.and_then(|cmd| parse.finish().map(|_| cmd).map_err(|e| {
            // trailing arguments after a structurally valid command is
            // an arity problem, not a generic parse one
            let _ = e;
            CommandError::WrongArity(command_name.clone())
        })) {
            Ok(cmd) => cmd,
            Err(err) => Command::Unknown(Unknown::from_error(command_name, err)),
        }
    }

    /// Runs this command against `db`, writing its reply to `dst`.
    ///
    /// `BLPOP` is the only command that can suspend; every other
    /// command resolves synchronously under a single lock acquisition.
    pub(crate) async fn apply(
        self,
        db: &Db,
        dst: &mut Connection,
        shutdown: &mut Shutdown,
    ) -> crate::Result<()> {
        use Command::*;

        match self {
            Blpop(cmd) => cmd.apply(db, dst, shutdown).await,
            CommandDocs(cmd) => cmd.apply(dst).await,
            Echo(cmd) => cmd.apply(dst).await,
            Flushdb(cmd) => cmd.apply(db, dst).await,
            Get(cmd) => cmd.apply(db, dst).await,
            Llen(cmd) => cmd.apply(db, dst).await,
            Lpop(cmd) => cmd.apply(db, dst).await,
            Lpush(cmd) => cmd.apply(db, dst).await,
            Lrange(cmd) => cmd.apply(db, dst).await,
            Ping(cmd) => cmd.apply(dst).await,
            Rpush(cmd) => cmd.apply(db, dst).await,
            Set(cmd) => cmd.apply(db, dst).await,
            Type(cmd) => cmd.apply(db, dst).await,
            Xadd(cmd) => cmd.apply(db, dst).await,
            Unknown(cmd) => cmd.apply(dst).await,
        }
    }

    /// Returns this command's name, for logging.
    pub(crate) fn get_name(&self) -> &str {
        match self {
            Command::Blpop(_) => "blpop",
            Command::CommandDocs(_) => "command",
            Command::Echo(_) => "echo",
            Command::Flushdb(_) => "flushdb",
            Command::Get(_) => "get",
            Command::Llen(_) => "llen",
            Command::Lpop(_) => "lpop",
            Command::Lpush(_) => "lpush",
            Command::Lrange(_) => "lrange",
            Command::Ping(_) => "ping",
            Command::Rpush(_) => "rpush",
            Command::Set(_) => "set",
            Command::Type(_) => "type",
            Command::Xadd(_) => "xadd",
            Command::Unknown(cmd) => cmd.get_name(),
        }
    }
}
