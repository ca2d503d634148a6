use crate::{
    error::{Error, Result},
    ot::group::{self, ELEMENT_BYTES},
};
use bytes::Bytes;
use curve25519_dalek::RistrettoPoint;
use futures::{SinkExt, StreamExt};
use log::debug;
use serde::{Deserialize, Serialize};
use std::{
    net::SocketAddr,
    sync::mpsc::{Receiver, Sender},
    thread,
    time::Duration,
};
use tokio::{
    net::{TcpSocket, TcpStream},
    runtime::Runtime,
};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Number of connection attempts before [`TcpChannel::new`] gives up.
const CONNECT_RETRIES: usize = 100;
const RETRY_DELAY: Duration = Duration::from_millis(500);
/// Largest frame accepted by a [`TcpChannel`].
const MAX_FRAME_BYTES: usize = 1 << 30;

/// Identifies one end of a two-party link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Id {
    Party0,
    Party1,
}

/// [`Channel`] trait for blocking, message-framed communication with the peer.
///
/// A channel is a point-to-point link, so the peer is implied by the channel itself.
pub trait Channel {
    fn send(&mut self, bytes: Bytes) -> Result<()>;
    fn recv(&mut self) -> Result<Bytes>;

    fn send_bytes(&mut self, buf: &[u8]) -> Result<()> {
        self.send(Bytes::copy_from_slice(buf))
    }

    /// Receive one message and check that it is exactly `len` bytes long.
    fn recv_exact(&mut self, len: usize) -> Result<Bytes> {
        let bytes = self.recv()?;
        if bytes.len() != len {
            return Err(Error::UnexpectedLength {
                expected: len,
                actual: bytes.len(),
            });
        }
        Ok(bytes)
    }

    fn send_point(&mut self, pt: &RistrettoPoint) -> Result<()> {
        self.send_bytes(&group::serialize(pt))
    }

    fn recv_point(&mut self) -> Result<RistrettoPoint> {
        group::deserialize(&self.recv_exact(ELEMENT_BYTES)?)
    }
}

/// [`ThreadChannel`] for communication between threads.
#[derive(Debug)]
pub struct ThreadChannel {
    tx: Sender<Bytes>,
    rx: Receiver<Bytes>,
}

impl ThreadChannel {
    pub fn new(tx: Sender<Bytes>, rx: Receiver<Bytes>) -> Self {
        ThreadChannel { tx, rx }
    }
}

impl Channel for ThreadChannel {
    fn send(&mut self, bytes: Bytes) -> Result<()> {
        self.tx
            .send(bytes)
            .map_err(|_| Error::ChannelDisconnected)
    }

    fn recv(&mut self) -> Result<Bytes> {
        self.rx.recv().map_err(|_| Error::ChannelDisconnected)
    }
}

/// [`TcpChannel`] for communication via a TCP connection.
///
/// Frames are length-delimited. The socket is driven by a current-thread tokio runtime,
/// every call blocks until its frame has been written or read.
#[derive(Debug)]
pub struct TcpChannel {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
    rt: Runtime,
}

impl TcpChannel {
    /// Create a new [`TcpChannel`] for the party with `id`.
    /// [`Id::Party0`] listens on `addr`, [`Id::Party1`] connects to it.
    pub fn new(id: Id, addr: SocketAddr) -> Result<TcpChannel> {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let stream = match id {
            Id::Party0 => rt.block_on(async {
                let socket = if addr.is_ipv4() {
                    TcpSocket::new_v4()?
                } else {
                    TcpSocket::new_v6()?
                };
                socket.set_reuseaddr(true)?;
                socket.bind(addr)?;
                let listener = socket.listen(1)?;
                let (stream, peer) = listener.accept().await?;
                debug!("accepted connection from {peer}");
                Ok::<_, std::io::Error>(stream)
            })?,
            Id::Party1 => Self::connect(&rt, addr)?,
        };
        stream.set_nodelay(true)?;

        let codec = LengthDelimitedCodec::builder()
            .max_frame_length(MAX_FRAME_BYTES)
            .new_codec();
        Ok(TcpChannel {
            framed: Framed::new(stream, codec),
            rt,
        })
    }

    fn connect(rt: &Runtime, addr: SocketAddr) -> Result<TcpStream> {
        let mut attempt = 0;
        loop {
            match rt.block_on(TcpStream::connect(addr)) {
                Ok(stream) => return Ok(stream),
                Err(err) if attempt < CONNECT_RETRIES => {
                    debug!("connect to {addr} failed ({err}), retrying");
                    attempt += 1;
                    thread::sleep(RETRY_DELAY);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
}

impl Channel for TcpChannel {
    fn send(&mut self, bytes: Bytes) -> Result<()> {
        Ok(self.rt.block_on(self.framed.send(bytes))?)
    }

    fn recv(&mut self) -> Result<Bytes> {
        let frame = self
            .rt
            .block_on(self.framed.next())
            .ok_or(Error::ChannelDisconnected)??;
        Ok(frame.freeze())
    }
}
