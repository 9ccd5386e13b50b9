//! A minimal client for manual testing against the server, used by
//! the `tiny-redis-cli` binary.
//!
//! `Client` wraps a single `TcpStream` — no pooling, no retries.

use crate::cmd::{Get, Set};
use crate::{Connection, Frame};

use bytes::Bytes;
use std::time::Duration;
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

/// A connection to a server, established via [`connect`].
pub struct Client {
    connection: Connection,
}

/// Connects to a server at `addr`.
///
/// # Example
///
/// ```no_run
/// use tiny_redis::client;
///
/// #[tokio::main]
/// async fn main() {
///     let client = client::connect("localhost:6379").await.unwrap();
/// #   drop(client);
/// }
/// ```
pub async fn connect<T: ToSocketAddrs>(addr: T) -> crate::Result<Client> {
    let socket = TcpStream::connect(addr).await?;
    let connection = Connection::new(socket);
    Ok(Client { connection })
}

impl Client {
    /// Sends `PING` and waits for `PONG`.
    pub async fn ping(&mut self) -> crate::Result<()> {
        let mut frame = Frame::array();
        frame.push_bulk(Bytes::from("ping"));
        self.connection.write_frame(&frame).await?;

        match self.read_response().await? {
            Frame::Simple(_) => Ok(()),
            frame => Err(format!("unexpected reply to PING: {}", frame).into()),
        }
    }

    /// Gets the value of `key`, or `None` if it is absent.
    pub async fn get(&mut self, key: &str) -> crate::Result<Option<Bytes>> {
        let frame = Get::new(key).into_frame();
        debug!(request = ?frame);
        self.connection.write_frame(&frame).await?;

        match self.read_response().await? {
            Frame::Bulk(value) => Ok(Some(value)),
            Frame::Null => Ok(None),
            frame => Err(format!("unexpected reply to GET: {}", frame).into()),
        }
    }

    /// Sets `key` to `value`, with no expiration.
    pub async fn set(&mut self, key: &str, value: Bytes) -> crate::Result<()> {
        self.set_cmd(Set::new(key, value, None)).await
    }

    /// Sets `key` to `value`, expiring it after `expires`.
    pub async fn set_expires(
        &mut self,
        key: &str,
        value: Bytes,
        expires: Duration,
    ) -> crate::Result<()> {
        self.set_cmd(Set::new(key, value, Some(expires))).await
    }

    async fn set_cmd(&mut self, cmd: Set) -> crate::Result<()> {
        let frame = cmd.into_frame();
        debug!(request = ?frame);
        self.connection.write_frame(&frame).await?;

        match self.read_response().await? {
            Frame::Simple(_) => Ok(()),
            frame => Err(format!("unexpected reply to SET: {}", frame).into()),
        }
    }

    /// Reads one reply frame, turning a stray disconnect or a `-ERR`
    /// reply into a crate-level `Err`.
    async fn read_response(&mut self) -> crate::Result<Frame> {
        match self.connection.read_reply().await? {
            Some(Frame::Error(msg)) => Err(msg.into()),
            Some(frame) => Ok(frame),
            None => {
                let err = "connection reset by server".to_string();
                Err(err.into())
            }
        }
    }
}
