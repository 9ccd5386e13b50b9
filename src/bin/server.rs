//! tiny-redis server.
//!
//! Parses the command line and hands the listener off to
//! `tiny_redis::server::run`.

use tiny_redis::{server, DEFAULT_PORT};

use structopt::StructOpt;
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
pub async fn main() -> tiny_redis::Result<()> {
    tracing_subscriber::fmt::try_init()?;

    let cli = Cli::from_args();
    let port = cli.port.as_deref().unwrap_or(DEFAULT_PORT);

    let listener = TcpListener::bind(&format!("127.0.0.1:{}", port)).await?;

    server::run(listener, signal::ctrl_c()).await
}

#[derive(StructOpt)]
#[structopt(
    name = "tiny-redis-server",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "A minimal Redis-compatible server"
)]
struct Cli {
    #[structopt(name = "port", long = "--port")]
    port: Option<String>,
}
