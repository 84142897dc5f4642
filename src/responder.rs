//! External target
//!
//! Accepts TCP connections, writes [`PONG`] to every authorized peer and closes
//! the connection. Peers outside the allowed CIDR are closed without a reply, so
//! a client reaching this target through the wrong source address observes EOF.
//!
//! ```text
//! Accepted ─┬─ authorized ───► write "pong\n" ─► Closed
//!           └─ unauthorized ─────────────────► Closed
//! ```

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use ipnetwork::IpNetwork;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, instrument, warn};

use crate::PONG;
use crate::config::ResponderConfig;

/// Pause after a failed accept, e.g. when out of file descriptors
pub const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// What happened to a single accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOutcome {
    Replied,
    Dropped,
}

/// Read-only CIDR filter shared by all connection tasks
#[derive(Debug, Clone, Copy, Default)]
pub struct PeerFilter {
    allowed: Option<IpNetwork>,
}

impl PeerFilter {
    pub fn new(allowed: Option<IpNetwork>) -> Self {
        Self { allowed }
    }

    pub fn is_authorized(&self, peer: IpAddr) -> bool {
        let Some(network) = self.allowed else {
            return true;
        };

        // dual-stack sockets report IPv4 peers as ::ffff:a.b.c.d
        let peer = match peer {
            IpAddr::V6(v6) => v6.to_ipv4_mapped().map_or(peer, IpAddr::V4),
            IpAddr::V4(_) => peer,
        };

        network.contains(peer)
    }
}

/// A bound external target, ready to serve
pub struct Responder {
    listener: TcpListener,
    filter: PeerFilter,
}

impl Responder {
    /// Bind the listener. Failing to bind is fatal for the caller.
    pub async fn bind(config: &ResponderConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(config.listen_addr).await?;

        Ok(Self {
            listener,
            filter: PeerFilter::new(config.allowed_cidr),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever, handing each one to its own task.
    pub async fn run(self) {
        match self.listener.local_addr() {
            Ok(addr) => info!(
                listen_addr = %addr,
                allowed_cidr = ?self.filter.allowed,
                "listening for connections"
            ),
            Err(e) => warn!("unable to determine listen address: {e}"),
        }

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    backoff_after_accept_error(&e).await;
                    continue;
                }
            };

            let filter = self.filter;
            tokio::spawn(async move {
                handle_connection(stream, peer, filter).await;
            });
        }
    }
}

async fn backoff_after_accept_error(e: &io::Error) {
    error!("failed to accept connection: {e}");
    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
}

/// Reply to (or silently drop) a single accepted connection.
#[instrument(skip(stream, filter), fields(remote_addr = %peer))]
pub async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    filter: PeerFilter,
) -> ConnectionOutcome {
    if !filter.is_authorized(peer.ip()) {
        debug!("peer outside allowed CIDR, closing without reply");
        return ConnectionOutcome::Dropped;
    }

    if let Err(e) = stream.write_all(PONG).await {
        error!("failed to write reply: {e}");
        return ConnectionOutcome::Dropped;
    }

    if let Err(e) = stream.shutdown().await {
        debug!("failed to shut down connection: {e}");
    }

    ConnectionOutcome::Replied
}
