use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

use crate::common::errors::PairError;
use crate::pairing::PairingChannel;
use crate::wire::{self, WireMessage};

/// Fallbacks matching what the report generator labels a document when the
/// sender left the fields blank.
pub const DEFAULT_FILENAME: &str = "compte-rendu.pdf";
pub const DEFAULT_PATIENT_LABEL: &str = "Patient";

/// The decoded report, ready for the platform's share sheet or a download.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceivedDocument {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub patient_label: String,
}

/// Wait for the single document message of a PDF session.
///
/// A decode failure spoils only this attempt; the channel stays open and
/// the desktop can push again. A channel that closes or errors before the
/// document arrives resolves to an error instead of hanging.
pub async fn receive_document(channel: &PairingChannel) -> Result<ReceivedDocument, PairError> {
    let (tx, rx) = oneshot::channel::<Result<ReceivedDocument, PairError>>();
    let slot = Arc::new(Mutex::new(Some(tx)));

    {
        let slot = Arc::clone(&slot);
        channel.on_message(move |message| {
            if let WireMessage::Pdf {
                data,
                filename,
                patient_name,
            } = message
            {
                let outcome = wire::decode_bytes(&data).map(|bytes| ReceivedDocument {
                    bytes,
                    filename: if filename.is_empty() {
                        DEFAULT_FILENAME.to_string()
                    } else {
                        filename
                    },
                    patient_label: if patient_name.is_empty() {
                        DEFAULT_PATIENT_LABEL.to_string()
                    } else {
                        patient_name
                    },
                });
                if let Some(tx) = slot.lock().unwrap().take() {
                    let _ = tx.send(outcome);
                }
            }
        });
    }
    {
        let slot = Arc::clone(&slot);
        channel.on_close(move || {
            if let Some(tx) = slot.lock().unwrap().take() {
                let _ = tx.send(Err(PairError::ChannelNotOpen));
            }
        });
    }
    channel.on_error(move |err| {
        if let Some(tx) = slot.lock().unwrap().take() {
            let _ = tx.send(Err(err));
        }
    });

    rx.await.map_err(|_| PairError::ChannelNotOpen)?
}
