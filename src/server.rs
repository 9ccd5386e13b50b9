//! The TCP accept loop and per-connection handler.
//!
//! Each accepted connection gets its own task: it reads requests,
//! dispatches each to the shared [`Db`], and writes the reply, until
//! the peer disconnects or the server is asked to shut down.

use crate::{Command, Connection, Db, Shutdown};

use std::future::Future;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, Semaphore};
use tokio::time::{self, Duration};
use tracing::{debug, error, info, instrument};

/// Listener state, created inside `run`. Accepts connections and
/// spawns a `Handler` task per connection.
struct Listener {
    /// Shared keyspace handle. An `Arc` wrapper internally, so cloning
    /// it for each connection is cheap.
    db: Db,

    listener: TcpListener,

    /// Caps concurrent connections. A permit must be acquired before
    /// accepting; the handler returns it on drop.
    limit_connections: Arc<Semaphore>,

    /// Broadcasts the shutdown signal to every live connection.
    notify_shutdown: broadcast::Sender<()>,

    /// Dropped once every handler task has finished, so `run` can wait
    /// on a clean shutdown.
    shutdown_complete_rx: mpsc::Receiver<()>,
    shutdown_complete_tx: mpsc::Sender<()>,
}

/// Per-connection state: reads requests off `connection`, dispatches
/// them against `db`, and writes replies back.
struct Handler {
    db: Db,

    connection: Connection,

    limit_connections: Arc<Semaphore>,

    shutdown: Shutdown,

    // Held only so its `Sender` half stays alive for as long as this
    // handler does; never read directly.
    _shutdown_complete: mpsc::Sender<()>,
}

/// Maximum number of concurrent connections this server accepts.
///
/// In a real deployment this would be configurable; here it is
/// hardcoded to a conservative value.
const MAX_CONNECTIONS: usize = 250;

/// Runs the server, accepting connections from `listener` until
/// `shutdown` resolves.
///
/// Pass `tokio::signal::ctrl_c()` as `shutdown` to stop on `Ctrl+C`.
pub async fn run(listener: TcpListener, shutdown: impl Future) -> crate::Result<()> {
    let (notify_shutdown, _) = broadcast::channel(1);
    let (shutdown_complete_tx, shutdown_complete_rx) = mpsc::channel(1);

    let mut server = Listener {
        listener,
        db: Db::new(),
        limit_connections: Arc::new(Semaphore::new(MAX_CONNECTIONS)),
        notify_shutdown,
        shutdown_complete_tx,
        shutdown_complete_rx,
    };

    tokio::select! {
        res = server.run() => {
            // Only fatal accept errors surface here; a single
            // connection's error never propagates past its own task.
            if let Err(err) = res {
                error!(cause = %err, "failed to accept");
            }
        }
        _ = shutdown => {
            info!("shutting down");
        }
    }

    let Listener {
        mut shutdown_complete_rx,
        shutdown_complete_tx,
        notify_shutdown,
        ..
    } = server;

    drop(notify_shutdown);
    drop(shutdown_complete_tx);

    let _ = shutdown_complete_rx.recv().await;

    Ok(())
}

impl Listener {
    /// Accepts inbound connections, spawning a handler task for each.
    async fn run(&mut self) -> crate::Result<()> {
        info!("accepting inbound connections");

        loop {
            self.limit_connections.acquire().await.unwrap().forget();

            let socket = self.accept().await?;

            let mut handler = Handler {
                db: self.db.clone(),
                connection: Connection::new(socket),
                limit_connections: self.limit_connections.clone(),
                shutdown: Shutdown::new(self.notify_shutdown.subscribe()),
                _shutdown_complete: self.shutdown_complete_tx.clone(),
            };

            tokio::spawn(async move {
                if let Err(err) = handler.run().await {
                    error!(cause = ?err, "connection error");
                }
            });
        }
    }

    /// Accepts one inbound connection, retrying transient errors with
    /// exponential backoff (1s, 2s, 4s, ... up to 64s) before giving
    /// up and propagating the error.
    async fn accept(&mut self) -> crate::Result<TcpStream> {
        let mut backoff = 1;

        loop {
            match self.listener.accept().await {
                Ok((socket, _)) => return Ok(socket),
                Err(err) => {
                    if backoff > 64 {
                        return Err(err.into());
                    }
                }
            }

            time::sleep(Duration::from_secs(backoff)).await;
            backoff *= 2;
        }
    }
}

impl Handler {
    /// Services one connection until it closes or the server shuts
    /// down. Pipelining isn't implemented: one request is read,
    /// dispatched, and replied to before the next is read.
    #[instrument(skip(self))]
    async fn run(&mut self) -> crate::Result<()> {
        while !self.shutdown.is_shutdown() {
            let maybe_request = tokio::select! {
                res = self.connection.read_request() => res?,
                _ = self.shutdown.recv() => {
                    return Ok(());
                }
            };

            let request = match maybe_request {
                Some(request) => request,
                None => return Ok(()),
            };

            let cmd = Command::from_frame(request);

            debug!(command = cmd.get_name());

            cmd.apply(&self.db, &mut self.connection, &mut self.shutdown)
                .await?;
        }

        Ok(())
    }
}

impl Drop for Handler {
    fn drop(&mut self) {
        // Returning the permit here (rather than at the end of `run`)
        // guarantees it happens even if the handler's task panics.
        self.limit_connections.add_permits(1);
    }
}
