//! The Node: a gossip scheduler and listener sharing one store.

use std::net::SocketAddr;
use std::sync::Arc;

use rumor_core::{Clock, NodeIdentity, ReplicatedState, SystemClock};
use rumor_store::{MemoryStore, Store};
use rumor_sync::tcp::{TcpAcceptor, TcpTransport};
use rumor_sync::GossipSession;
use tokio::sync::watch;

use crate::config::NodeConfig;
use crate::error::{NodeError, Result};
use crate::listener::Listener;
use crate::scheduler::GossipScheduler;

/// A bound, not yet running, gossip node.
///
/// Binding seeds the store with the local identity and every configured
/// neighbor, all stamped with the startup time, so neighbors get one full TTL
/// to answer before they can be evicted.
pub struct Node {
    local_addr: SocketAddr,
    handle: NodeHandle,
    scheduler: GossipScheduler<MemoryStore, TcpTransport>,
    listener: Listener<MemoryStore, TcpAcceptor>,
}

impl Node {
    /// Validate `config`, bind the listening socket and seed the store.
    pub async fn bind(config: NodeConfig) -> Result<Self> {
        Self::bind_with_clock(config, Arc::new(SystemClock)).await
    }

    /// Like [`bind`](Self::bind) with an explicit clock.
    pub async fn bind_with_clock(mut config: NodeConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        config.validate()?;

        let acceptor = TcpAcceptor::bind(&config.bind, config.backlog)
            .await
            .map_err(|source| NodeError::Bind {
                addr: config.bind.clone(),
                source,
            })?;
        let local_addr = acceptor.local_addr()?;

        let host = config
            .advertise_host
            .clone()
            .unwrap_or_else(|| config.bind.host().to_string());
        let local = NodeIdentity::new(host, local_addr.port());

        let store = Arc::new(MemoryStore::seeded(
            local.clone(),
            config.neighbors.iter().cloned(),
            clock.now(),
        ));
        let session = GossipSession::new(Arc::clone(&store), clock, config.sync_config());

        let scheduler = GossipScheduler::new(
            session.clone(),
            TcpTransport::new(config.io_timeout),
            config.interval,
        );
        let listener = Listener::new(session, acceptor, config.max_inflight);

        let (shutdown, _) = watch::channel(false);
        let handle = NodeHandle {
            local,
            store,
            shutdown: Arc::new(shutdown),
        };

        tracing::info!(
            local = %handle.local,
            %local_addr,
            neighbors = config.neighbors.len(),
            ttl_ms = rumor_core::duration_millis(config.ttl),
            "node bound"
        );

        Ok(Self {
            local_addr,
            handle,
            scheduler,
            listener,
        })
    }

    /// The identity this node gossips as.
    pub fn local_id(&self) -> &NodeIdentity {
        &self.handle.local
    }

    /// The socket address actually bound.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A handle for inspecting and stopping the node from other tasks.
    pub fn handle(&self) -> NodeHandle {
        self.handle.clone()
    }

    /// Consistent copy of the replicated state.
    pub async fn snapshot(&self) -> Result<ReplicatedState> {
        self.handle.snapshot().await
    }

    /// Current neighbors.
    pub async fn neighbors(&self) -> Result<Vec<NodeIdentity>> {
        self.handle.neighbors().await
    }

    /// Signal shutdown. [`run`](Self::run) returns once both loops stop.
    pub fn shutdown(&self) {
        self.handle.shutdown();
    }

    /// Drive the scheduler and the listener until shutdown.
    ///
    /// If either loop fails, the other is stopped too and the first error is
    /// returned.
    pub async fn run(self) -> Result<()> {
        let Node {
            handle,
            scheduler,
            listener,
            ..
        } = self;

        let listener_task = tokio::spawn(listener.run(handle.shutdown.subscribe()));
        let scheduled = scheduler.run(handle.shutdown.subscribe()).await;

        handle.shutdown();
        let listened = listener_task
            .await
            .map_err(|e| NodeError::Task(e.to_string()))?;

        scheduled?;
        listened?;
        tracing::info!(local = %handle.local, "node stopped");
        Ok(())
    }
}

/// Cloneable handle to a node.
#[derive(Clone)]
pub struct NodeHandle {
    local: NodeIdentity,
    store: Arc<MemoryStore>,
    shutdown: Arc<watch::Sender<bool>>,
}

impl NodeHandle {
    /// The identity this node gossips as.
    pub fn local_id(&self) -> &NodeIdentity {
        &self.local
    }

    /// The node's store.
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }

    /// Consistent copy of the replicated state.
    pub async fn snapshot(&self) -> Result<ReplicatedState> {
        Ok(self.store.snapshot().await?)
    }

    /// Current neighbors.
    pub async fn neighbors(&self) -> Result<Vec<NodeIdentity>> {
        Ok(self.store.neighbors().await?)
    }

    /// Signal shutdown. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}
