use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::common::errors::PairError;
use crate::invite::{Invite, PairMode};
use crate::rendezvous::{Registration, RendezvousClient};
use crate::wire::{self, WireMessage};

/// One decoded photo, numbered in arrival order across the whole session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedPhoto {
    pub index: usize,
    pub bytes: Vec<u8>,
}

/// Insertion callback: the form owns the photo collection, the inbox only
/// appends to it.
pub type PhotoSink = Arc<dyn Fn(ReceivedPhoto) + Send + Sync>;

/// Receives camera captures from the paired phone.
///
/// The session supports many photos: the channel stays open between shutter
/// presses, and after the phone disconnects the same invitation pairs the
/// next scan.
pub struct PhotoInbox {
    registration: Registration,
    sink: PhotoSink,
    received: Arc<AtomicUsize>,
}

impl PhotoInbox {
    pub async fn open(client: &RendezvousClient, sink: PhotoSink) -> Result<Self, PairError> {
        let registration = client.register_fresh().await?;
        Ok(Self {
            registration,
            sink,
            received: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn invite(&self) -> Invite {
        self.registration.invite(PairMode::Photo)
    }

    /// Photos received over the whole session, across reconnects.
    pub fn received(&self) -> usize {
        self.received.load(Ordering::SeqCst)
    }

    /// Accept the next phone connection and serve it until it goes away.
    /// Returns how many photos that connection delivered.
    pub async fn serve_once(&self) -> Result<usize, PairError> {
        let channel = self.registration.incoming().await?;
        let before = self.received.load(Ordering::SeqCst);

        let (done_tx, done_rx) = oneshot::channel::<()>();
        let done = Arc::new(Mutex::new(Some(done_tx)));

        {
            let sink = Arc::clone(&self.sink);
            let received = Arc::clone(&self.received);
            channel.on_message(move |message| {
                // a photo session only ever consumes photo messages
                if let WireMessage::Photo { photo } = message {
                    match wire::photo_bytes(&photo) {
                        Ok(bytes) => {
                            let index = received.fetch_add(1, Ordering::SeqCst) + 1;
                            sink(ReceivedPhoto { index, bytes });
                        }
                        Err(err) => {
                            tracing::warn!(error = %err, "discarding photo that failed to decode");
                        }
                    }
                }
            });
        }
        {
            let done = Arc::clone(&done);
            channel.on_close(move || {
                if let Some(tx) = done.lock().unwrap().take() {
                    let _ = tx.send(());
                }
            });
        }
        channel.on_error(move |err| {
            tracing::warn!(error = %err, "photo channel failed");
            if let Some(tx) = done.lock().unwrap().take() {
                let _ = tx.send(());
            }
        });

        let _ = done_rx.await;
        channel.close();
        Ok(self.received.load(Ordering::SeqCst) - before)
    }

    /// Tear the session down and release the broker registration.
    pub async fn close(self) {
        self.registration.release().await;
    }
}
