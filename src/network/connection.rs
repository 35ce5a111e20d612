use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;

use crate::network::ValueFrame;
use crate::AppError;
use crate::AppResult;

/// Represents one framed connection to a peer.
///
/// This struct wraps the TCP stream in a `BufWriter` so each reply is
/// written and flushed as a whole frame. Both sides of the protocol use it:
/// the server wraps accepted sockets, the client opens one with
/// [`Connection::connect`]. Dropping the connection closes the socket.
#[derive(Debug)]
pub struct Connection {
    stream: BufWriter<TcpStream>,
    peer: SocketAddr,
}

impl Connection {
    pub fn new(socket: TcpStream, peer: SocketAddr) -> Connection {
        Connection {
            stream: BufWriter::new(socket),
            peer,
        }
    }

    /// Opens a client connection to `addr`.
    pub async fn connect(addr: SocketAddr) -> AppResult<Connection> {
        let socket = TcpStream::connect(addr).await?;
        Ok(Connection::new(socket, addr))
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Reads the next frame from the peer.
    ///
    /// The protocol performs exactly one read per frame and does not resume
    /// partial frames. If the peer has closed the connection at a frame
    /// boundary this returns `PeerClosed`; a read that yields fewer than
    /// [`ValueFrame::WIRE_LEN`] bytes ends the session with `ShortFrame`.
    pub async fn read_value(&mut self) -> AppResult<ValueFrame> {
        let mut buf = [0u8; ValueFrame::WIRE_LEN];
        let n = self.stream.read(&mut buf).await?;
        if n == 0 {
            return Err(AppError::PeerClosed);
        }
        if n < ValueFrame::WIRE_LEN {
            return Err(AppError::ShortFrame {
                got: n,
                expected: ValueFrame::WIRE_LEN,
            });
        }
        Ok(ValueFrame::from_wire(buf))
    }

    /// Writes one frame and flushes it to the peer.
    pub async fn send_value(&mut self, frame: ValueFrame) -> AppResult<()> {
        self.stream.write_all(&frame.to_wire()).await?;
        self.stream.flush().await?;
        Ok(())
    }
}
