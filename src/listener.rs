use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::{Arc, Mutex};

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use crate::{Error, Result, net};

/// A TCP listener bound to a loopback IPv4 address on an OS-assigned port.
///
/// Used for local control channels: the encoder (or anything else on the host)
/// connects to [`LoopbackListener::uri`].
#[derive(Debug)]
pub struct LoopbackListener {
    local_addr: SocketAddr,
    path: String,
    // Taken on close; in-flight accepts hold their own clone until they wake up.
    server: Mutex<Option<Arc<TcpListener>>>,
    closed: watch::Sender<bool>,
}

impl LoopbackListener {
    /// Binds a new listener; `path` is appended verbatim to the URI.
    pub async fn bind(path: impl Into<String>) -> Result<Self> {
        let ip = net::loopback_ipv4().unwrap_or_else(|err| {
            tracing::warn!(%err, "falling back to 127.0.0.1");
            Ipv4Addr::LOCALHOST
        });

        let server = TcpListener::bind(SocketAddrV4::new(ip, 0))
            .await
            .map_err(Error::Bind)?;
        let local_addr = server.local_addr().map_err(Error::Bind)?;
        let (closed, _) = watch::channel(false);

        tracing::debug!(%local_addr, "loopback listener bound");

        Ok(Self {
            local_addr,
            path: path.into(),
            server: Mutex::new(Some(Arc::new(server))),
            closed,
        })
    }

    /// `tcp://<ip>:<port><path>`, using the port the OS actually assigned.
    pub fn uri(&self) -> String {
        format!("tcp://{}{}", self.local_addr, self.path)
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Waits for the next inbound connection.
    ///
    /// Fails with [`Error::ListenerClosed`] if the listener is closed before or
    /// while waiting.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr)> {
        let server = self
            .server
            .lock()
            .unwrap()
            .clone()
            .ok_or(Error::ListenerClosed)?;
        let mut closed = self.closed.subscribe();

        tokio::select! {
            biased;
            _ = async { closed.wait_for(|closed| *closed).await.is_ok() } => Err(Error::ListenerClosed),
            res = server.accept() => res.map_err(Error::Accept),
        }
    }

    /// Stops accepting and releases the socket. Safe to call more than once.
    ///
    /// Closing cannot fail: the socket is dropped, not shut down, so there is no
    /// error to report.
    pub fn close(&self) {
        if self.server.lock().unwrap().take().is_some() {
            tracing::debug!(local_addr = %self.local_addr, "loopback listener closed");
        }
        self.closed.send_replace(true);
    }
}
