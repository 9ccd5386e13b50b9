use crate::frame::{self, Frame, ProtocolError, Request};

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;

/// Sends and receives RESP frames over a remote peer.
///
/// When implementing a network protocol, a message on that protocol is
/// often composed of several smaller messages known as frames.
/// `Connection`'s job is to read and write frames on the underlying
/// `TcpStream`.
///
/// To read frames, `Connection` uses an internal buffer, which is
/// filled up until there are enough bytes to create a full frame. Once
/// this happens, `Connection` creates the frame and returns it to the
/// caller.
///
/// When sending frames, a frame is first encoded into the write
/// buffer, which is then written to the socket.
pub struct Connection {
    stream: BufWriter<TcpStream>,
    buffer: BytesMut,
}

impl Connection {
    pub fn new(socket: TcpStream) -> Connection {
        Connection {
            stream: BufWriter::new(socket),
            buffer: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Reads a single request from the underlying stream.
    ///
    /// The function waits until it has retrieved enough data to parse
    /// a complete frame. Any data remaining in the read buffer after
    /// the frame is parsed stays there for the next call.
    ///
    /// # Returns
    ///
    /// `Ok(None)` if the peer closed the connection cleanly (no bytes
    /// left in the buffer). A partial frame followed by an EOF is a
    /// [`ProtocolError`], not a clean close.
    pub async fn read_request(&mut self) -> Result<Option<Request>, ProtocolError> {
        loop {
            if let Some(request) = frame::parse_request(&mut self.buffer)? {
                return Ok(Some(request));
            }

            if 0 == self
                .stream
                .read_buf(&mut self.buffer)
                .await
                .map_err(|e| ProtocolError(e.to_string()))?
            {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(ProtocolError("connection reset by peer mid-frame".into()));
            }
        }
    }

    /// Reads a single reply frame from the underlying stream. Used by
    /// the client, which — unlike the server — must decode the full
    /// variety of RESP2 reply shapes rather than just bulk-string
    /// arrays.
    pub(crate) async fn read_reply(&mut self) -> Result<Option<Frame>, ProtocolError> {
        loop {
            if let Some(frame) = frame::parse_reply(&mut self.buffer)? {
                return Ok(Some(frame));
            }

            if 0 == self
                .stream
                .read_buf(&mut self.buffer)
                .await
                .map_err(|e| ProtocolError(e.to_string()))?
            {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                return Err(ProtocolError("connection reset by peer mid-frame".into()));
            }
        }
    }

    /// Tries to detect whether the peer has closed the socket without
    /// consuming any bytes that could still make up a pending request.
    ///
    /// Used only while a connection is suspended on `BLPOP`: the
    /// handler isn't reading frames at that point, but still needs to
    /// notice disconnects so it can cancel its waiter promptly.
    pub(crate) async fn peek_closed(&mut self) -> bool {
        let stream = self.stream.get_ref();
        if stream.readable().await.is_err() {
            return true;
        }
        let mut probe = [0u8; 1];
        matches!(stream.try_read(&mut probe), Ok(0))
    }

    /// Writes a single frame to the underlying stream.
    pub async fn write_frame(&mut self, frame: &Frame) -> std::io::Result<()> {
        let mut buf = Vec::new();
        frame.encode(&mut buf);
        self.stream.write_all(&buf).await?;
        self.stream.flush().await
    }
}
