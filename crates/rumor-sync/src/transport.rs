//! Transport abstraction for snapshot exchanges.
//!
//! An exchange needs one reliable bidirectional byte stream. [`Transport`]
//! opens such streams towards a peer; [`Acceptor`] yields the streams peers
//! open towards us. TCP is the production transport; the in-memory one backs
//! tests and simulations.

use async_trait::async_trait;
use rumor_core::NodeIdentity;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

/// Opens outbound channels.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait Transport: Send + Sync {
    /// The stream type of an open channel.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Open a channel to `peer`.
    async fn connect(&self, peer: &NodeIdentity) -> Result<Self::Stream>;
}

/// Yields inbound channels.
#[async_trait]
pub trait Acceptor: Send + Sync {
    /// The stream type of an accepted channel.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Wait for the next inbound channel.
    ///
    /// Returns the stream and a printable description of the remote end.
    async fn accept(&self) -> Result<(Self::Stream, String)>;
}

/// TCP transport.
pub mod tcp {
    use super::*;
    use std::io;
    use std::net::SocketAddr;
    use std::time::Duration;

    use tokio::net::{lookup_host, TcpListener, TcpSocket, TcpStream};

    use crate::error::SyncError;

    /// Outbound TCP connections with a connect timeout.
    #[derive(Debug, Clone)]
    pub struct TcpTransport {
        connect_timeout: Duration,
    }

    impl TcpTransport {
        /// Create a transport whose connection attempts give up after `connect_timeout`.
        pub fn new(connect_timeout: Duration) -> Self {
            Self { connect_timeout }
        }
    }

    #[async_trait]
    impl Transport for TcpTransport {
        type Stream = TcpStream;

        async fn connect(&self, peer: &NodeIdentity) -> Result<TcpStream> {
            let connect = TcpStream::connect((peer.host(), peer.port()));
            let stream = tokio::time::timeout(self.connect_timeout, connect)
                .await
                .map_err(|_| SyncError::Timeout(format!("connecting to {peer}")))?
                .map_err(|source| SyncError::Connect {
                    peer: peer.clone(),
                    source,
                })?;
            stream.set_nodelay(true)?;
            Ok(stream)
        }
    }

    /// A TCP listener with an explicit accept backlog.
    pub struct TcpAcceptor {
        listener: TcpListener,
    }

    impl TcpAcceptor {
        /// Bind to `addr` and listen with the given backlog.
        ///
        /// Once `backlog` connections are waiting to be accepted the operating
        /// system refuses further attempts.
        pub async fn bind(addr: &NodeIdentity, backlog: u32) -> io::Result<Self> {
            let resolved = lookup_host((addr.host(), addr.port()))
                .await?
                .next()
                .ok_or_else(|| {
                    io::Error::new(io::ErrorKind::AddrNotAvailable, format!("{addr} did not resolve"))
                })?;

            let socket = match resolved {
                SocketAddr::V4(_) => TcpSocket::new_v4()?,
                SocketAddr::V6(_) => TcpSocket::new_v6()?,
            };
            socket.set_reuseaddr(true)?;
            socket.bind(resolved)?;
            let listener = socket.listen(backlog)?;

            tracing::info!(addr = %resolved, backlog, "listening for gossip");
            Ok(Self { listener })
        }

        /// The address actually bound (resolves port 0).
        pub fn local_addr(&self) -> io::Result<SocketAddr> {
            self.listener.local_addr()
        }
    }

    #[async_trait]
    impl Acceptor for TcpAcceptor {
        type Stream = TcpStream;

        async fn accept(&self) -> Result<(TcpStream, String)> {
            let (stream, remote) = self.listener.accept().await?;
            stream.set_nodelay(true)?;
            Ok((stream, remote.to_string()))
        }
    }
}

/// A simple in-memory transport for testing.
///
/// Uses duplex pipes to simulate connections between nodes.
pub mod memory {
    use super::*;
    use std::collections::HashMap;
    use std::io;
    use std::sync::Arc;

    use tokio::io::DuplexStream;
    use tokio::sync::{mpsc, Mutex, RwLock};

    use crate::error::SyncError;

    /// Buffer size of each simulated connection, per direction.
    const PIPE_CAPACITY: usize = 64 * 1024;

    type Pending = (DuplexStream, String);

    /// Shared state for the memory transport network.
    pub struct MemoryNetwork {
        /// Accept queues for each bound node.
        listeners: RwLock<HashMap<NodeIdentity, mpsc::Sender<Pending>>>,
    }

    impl MemoryNetwork {
        /// Create a new memory network.
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// Bind `id` with an accept queue of `backlog` pending connections.
        ///
        /// Rebinding an identity replaces the previous acceptor.
        pub async fn bind(self: &Arc<Self>, id: NodeIdentity, backlog: usize) -> MemoryAcceptor {
            let (tx, rx) = mpsc::channel(backlog.max(1));
            self.listeners.write().await.insert(id, tx);
            MemoryAcceptor {
                receiver: Mutex::new(rx),
            }
        }

        /// Take `id` off the network; later connection attempts are refused.
        pub async fn unbind(&self, id: &NodeIdentity) {
            self.listeners.write().await.remove(id);
        }

        /// Create a transport for the node `local` that dials into this network.
        pub fn transport(self: &Arc<Self>, local: NodeIdentity) -> MemoryTransport {
            MemoryTransport {
                local,
                network: Arc::clone(self),
            }
        }
    }

    impl Default for MemoryNetwork {
        fn default() -> Self {
            Self {
                listeners: RwLock::new(HashMap::new()),
            }
        }
    }

    /// In-memory outbound transport.
    #[derive(Clone)]
    pub struct MemoryTransport {
        local: NodeIdentity,
        network: Arc<MemoryNetwork>,
    }

    #[async_trait]
    impl Transport for MemoryTransport {
        type Stream = DuplexStream;

        async fn connect(&self, peer: &NodeIdentity) -> Result<DuplexStream> {
            let refused = |why: &str| SyncError::Connect {
                peer: peer.clone(),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, why.to_string()),
            };

            let listeners = self.network.listeners.read().await;
            let sender = listeners.get(peer).ok_or_else(|| refused("not bound"))?;

            let (client, server) = tokio::io::duplex(PIPE_CAPACITY);
            sender
                .try_send((server, self.local.to_string()))
                .map_err(|e| match e {
                    mpsc::error::TrySendError::Full(_) => refused("backlog full"),
                    mpsc::error::TrySendError::Closed(_) => refused("acceptor dropped"),
                })?;

            Ok(client)
        }
    }

    /// In-memory inbound acceptor.
    pub struct MemoryAcceptor {
        receiver: Mutex<mpsc::Receiver<Pending>>,
    }

    #[async_trait]
    impl Acceptor for MemoryAcceptor {
        type Stream = DuplexStream;

        async fn accept(&self) -> Result<(DuplexStream, String)> {
            let mut rx = self.receiver.lock().await;
            rx.recv()
                .await
                .ok_or_else(|| SyncError::TransportError("memory acceptor closed".into()))
        }
    }
}
