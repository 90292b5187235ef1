use tokio::sync::watch;

use crate::common::errors::PairError;
use crate::invite::{Invite, PairMode};
use crate::pairing::PairingChannel;
use crate::rendezvous::{Registration, RendezvousClient};
use crate::wire::{self, WireMessage};

/// Sub-state of the outbound transfer, for the dialog to render.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendState {
    Waiting,
    Sending,
    Sent,
    Failed,
}

/// The finished report, ready for the wire.
#[derive(Clone, Debug)]
pub struct OutgoingDocument {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub patient_label: String,
}

/// Hands one generated report to the paired phone.
///
/// The document is sent exactly once per connection, as a single message.
/// A successful send does not close the channel: the phone may still be in
/// its own share flow, so only dismissing the dialog tears the session down.
pub struct PdfSender {
    registration: Registration,
    document: OutgoingDocument,
    state: watch::Sender<SendState>,
}

impl PdfSender {
    pub async fn open(
        client: &RendezvousClient,
        document: OutgoingDocument,
    ) -> Result<Self, PairError> {
        let registration = client.register_fresh().await?;
        let (state, _) = watch::channel(SendState::Waiting);
        Ok(Self {
            registration,
            document,
            state,
        })
    }

    pub fn invite(&self) -> Invite {
        self.registration.invite(PairMode::Pdf)
    }

    pub fn state(&self) -> watch::Receiver<SendState> {
        self.state.subscribe()
    }

    /// Wait for the phone, push the document, and hand the still-open
    /// channel back to the caller.
    pub async fn serve(&self) -> Result<PairingChannel, PairError> {
        let channel = self.registration.incoming().await?;
        self.push(&channel)?;
        Ok(channel)
    }

    /// Send over an existing channel. Also the retry path after a transient
    /// failure: the session stays alive, the operator just invokes it again.
    pub fn push(&self, channel: &PairingChannel) -> Result<(), PairError> {
        let _ = self.state.send(SendState::Sending);
        let message = WireMessage::Pdf {
            data: wire::encode_bytes(&self.document.bytes),
            filename: self.document.filename.clone(),
            patient_name: self.document.patient_label.clone(),
        };
        match channel.send(message) {
            Ok(()) => {
                let _ = self.state.send(SendState::Sent);
                tracing::info!(
                    filename = %self.document.filename,
                    bytes = self.document.bytes.len(),
                    "report handed to phone"
                );
                Ok(())
            }
            Err(err) => {
                let _ = self.state.send(SendState::Failed);
                Err(err)
            }
        }
    }

    pub async fn close(self) {
        self.registration.release().await;
    }
}
