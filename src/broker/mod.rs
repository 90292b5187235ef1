//! Rendezvous broker: the only shared infrastructure between the two roles.
//!
//! It maps session identifiers to the initiator's reachable address and
//! nothing else; payloads never pass through it. Registrations live in
//! memory and die with the process; a session survives exactly as long as
//! the dialog that created it.

pub mod handlers;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;

#[derive(Clone, Debug)]
pub struct RegisteredPeer {
    pub addr: String,
}

#[derive(Clone, Default)]
pub struct BrokerState {
    sessions: Arc<DashMap<String, RegisteredPeer>>,
}

impl BrokerState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve `id` for one peer. Returns false when the identifier is
    /// already taken, so the caller regenerates rather than hijacks.
    pub fn try_register(&self, id: &str, addr: String) -> bool {
        match self.sessions.entry(id.to_string()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(RegisteredPeer { addr });
                true
            }
        }
    }

    pub fn lookup(&self, id: &str) -> Option<RegisteredPeer> {
        self.sessions.get(id).map(|peer| peer.clone())
    }

    pub fn release(&self, id: &str) {
        self.sessions.remove(id);
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }
}

/// Bind and serve in the background. Returns the bound address (port 0 is
/// resolved) so callers and tests can point clients at it.
pub async fn serve(listen: SocketAddr) -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener = tokio::net::TcpListener::bind(listen).await?;
    let local = listener.local_addr()?;
    let app = routes::router(BrokerState::new());

    tracing::info!(addr = %local, "rendezvous broker listening");
    let handle = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!(error = %err, "rendezvous broker exited");
        }
    });

    Ok((local, handle))
}
