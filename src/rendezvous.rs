//! Client side of the rendezvous: registration for the initiator, direct
//! dialing for the responder.
//!
//! Registration and connection are split on purpose: the desktop registers
//! and shows its QR code before any phone exists. The broker hands out one
//! address per session identifier and then gets out of the way: after the
//! lookup, everything flows over the direct socket.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::anyhow;
use reqwest::StatusCode;
use tokio::net::{TcpListener, TcpStream};

use crate::broker::handlers::PeerAddress;
use crate::common::config::PairConfig;
use crate::common::errors::PairError;
use crate::invite::{Invite, PairMode};
use crate::pairing::PairingChannel;
use crate::session::SessionId;

#[derive(Clone)]
pub struct RendezvousClient {
    http: reqwest::Client,
    config: Arc<PairConfig>,
}

impl RendezvousClient {
    pub fn new(config: PairConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &PairConfig {
        &self.config
    }

    fn session_url(&self, id: &SessionId) -> String {
        format!(
            "{}/sessions/{}",
            self.config.broker_url.trim_end_matches('/'),
            id
        )
    }

    /// Reserve `session_id` at the broker and start listening for the peer.
    pub async fn register(&self, session_id: SessionId) -> Result<Registration, PairError> {
        let listener = TcpListener::bind((self.config.bind_host.as_str(), 0))
            .await
            .map_err(|err| PairError::Internal(err.into()))?;
        let port = listener
            .local_addr()
            .map_err(|err| PairError::Internal(err.into()))?
            .port();
        let advertised = format!("{}:{}", self.config.advertise_host, port);

        let response = self
            .http
            .post(self.session_url(&session_id))
            .json(&PeerAddress {
                addr: advertised.clone(),
            })
            .send()
            .await
            .map_err(|err| PairError::BrokerUnreachable(err.into()))?;

        match response.status() {
            StatusCode::CONFLICT => Err(PairError::RegistrationConflict),
            status if status.is_success() => {
                tracing::debug!(session = %session_id, addr = %advertised, "registered with broker");
                Ok(Registration {
                    session_id,
                    listener,
                    client: self.clone(),
                    released: AtomicBool::new(false),
                })
            }
            status => Err(PairError::BrokerUnreachable(anyhow!(
                "broker answered {status} to registration"
            ))),
        }
    }

    /// Register under a freshly generated identifier, regenerating on the
    /// (unlikely) collision instead of failing the whole session.
    pub async fn register_fresh(&self) -> Result<Registration, PairError> {
        const ATTEMPTS: usize = 3;
        for _ in 0..ATTEMPTS {
            match self.register(SessionId::generate()).await {
                Err(PairError::RegistrationConflict) => {
                    tracing::warn!("generated session identifier collided, drawing another");
                }
                outcome => return outcome,
            }
        }
        Err(PairError::RegistrationConflict)
    }

    /// Resolve a session at the broker and dial the peer directly.
    ///
    /// Stale invitations fail closed: an unknown identifier or a dead
    /// listener is `PeerNotFound`, an unresponsive one is `ConnectTimeout`.
    /// Neither hangs past the configured timeout.
    pub async fn connect_to(&self, remote: &SessionId) -> Result<PairingChannel, PairError> {
        let response = self
            .http
            .get(self.session_url(remote))
            .send()
            .await
            .map_err(|err| PairError::BrokerUnreachable(err.into()))?;

        let peer: PeerAddress = match response.status() {
            StatusCode::NOT_FOUND => return Err(PairError::PeerNotFound),
            status if status.is_success() => response
                .json()
                .await
                .map_err(|err| PairError::BrokerUnreachable(err.into()))?,
            status => {
                return Err(PairError::BrokerUnreachable(anyhow!(
                    "broker answered {status} to lookup"
                )))
            }
        };

        let dial = TcpStream::connect(peer.addr.as_str());
        let stream = match tokio::time::timeout(self.config.connect_timeout(), dial).await {
            Err(_) => return Err(PairError::ConnectTimeout),
            Ok(Err(err)) => {
                tracing::debug!(addr = %peer.addr, error = %err, "direct dial failed");
                return Err(PairError::PeerNotFound);
            }
            Ok(Ok(stream)) => stream,
        };
        let _ = stream.set_nodelay(true);

        tracing::debug!(session = %remote, addr = %peer.addr, "connected to peer");
        Ok(PairingChannel::from_stream(
            stream,
            self.config.max_frame_bytes,
        ))
    }
}

/// A live broker reservation plus the listener peers dial into.
///
/// Dropping it releases the broker entry, so a session cannot outlive the
/// dialog that owns it.
pub struct Registration {
    session_id: SessionId,
    listener: TcpListener,
    client: RendezvousClient,
    released: AtomicBool,
}

impl Registration {
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn invite(&self, mode: PairMode) -> Invite {
        Invite::new(mode, self.session_id.clone())
    }

    /// Wait for the next peer to dial in. Each call accepts one connection;
    /// calling again after a disconnect pairs the next scan of the same code.
    pub async fn incoming(&self) -> Result<PairingChannel, PairError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(|err| PairError::Internal(err.into()))?;
        tracing::debug!(session = %self.session_id, peer = %peer, "peer connected");
        let _ = stream.set_nodelay(true);
        Ok(PairingChannel::from_stream(
            stream,
            self.client.config.max_frame_bytes,
        ))
    }

    /// Explicitly remove the broker entry. Safe to call more than once.
    pub async fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        let url = self.client.session_url(&self.session_id);
        if let Err(err) = self.client.http.delete(&url).send().await {
            tracing::debug!(error = %err, "failed to release broker registration");
        }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }
        // fire-and-forget: Drop cannot await the broker round-trip
        let url = self.client.session_url(&self.session_id);
        let http = self.client.http.clone();
        if let Ok(runtime) = tokio::runtime::Handle::try_current() {
            runtime.spawn(async move {
                let _ = http.delete(&url).send().await;
            });
        }
    }
}
