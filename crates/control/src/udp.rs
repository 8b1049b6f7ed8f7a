//! UDP command source
//!
//! One JSON command per datagram. The listener stops on the shutdown signal
//! and releases the socket when `run` returns.

use std::net::SocketAddr;

use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::dispatcher::ControlDispatcher;
use crate::error::{ControlError, Result};
use crate::stats::ControlSnapshot;

/// UDP listener feeding a `ControlDispatcher`
#[derive(Debug)]
pub struct UdpCommandListener {
    socket: UdpSocket,
    dispatcher: ControlDispatcher,
    max_datagram_size: usize,
}

impl UdpCommandListener {
    /// Bind the control socket
    pub async fn bind(
        addr: &str,
        dispatcher: ControlDispatcher,
        max_datagram_size: usize,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(addr)
            .await
            .map_err(|source| ControlError::Bind {
                addr: addr.to_string(),
                source,
            })?;
        Ok(Self {
            socket,
            dispatcher,
            max_datagram_size: max_datagram_size.max(1),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Receive until shutdown is signalled (or its sender dropped)
    #[instrument(name = "udp_command_listener", skip(self, shutdown), fields(addr = ?self.socket.local_addr().ok()))]
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> ControlSnapshot {
        let mut buf = vec![0u8; self.max_datagram_size];
        info!("control listener started");

        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok((len, peer)) => {
                        debug!(%peer, len, "control datagram");
                        if let Err(e) = self.dispatcher.dispatch_datagram(&buf[..len]) {
                            debug!(%peer, kind = e.kind(), "datagram rejected");
                        }
                    }
                    Err(e) => warn!(error = %e, "control socket receive failed"),
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        let snapshot = self.dispatcher.snapshot();
        info!(
            received = snapshot.received,
            forwarded = snapshot.forwarded,
            malformed = snapshot.malformed,
            dropped = snapshot.dropped,
            "control listener stopped"
        );
        snapshot
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<ControlSnapshot> {
        tokio::spawn(self.run(shutdown))
    }
}
