use std::sync::Mutex;

use crate::common::errors::PairError;
use crate::pairing::PairingChannel;
use crate::wire::{self, WireMessage};

/// One capture already pushed to the desktop. Kept only for the on-screen
/// "N photos sent" tally; nothing is persisted or deduplicated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturedAsset {
    pub index: usize,
    pub byte_len: usize,
}

/// The camera side of a photo session.
///
/// One shutter press is one send, with no local queue, so a send error
/// maps to exactly one failed capture the user can simply retake.
pub struct PhotoShutter {
    channel: PairingChannel,
    sent: Mutex<Vec<CapturedAsset>>,
}

impl PhotoShutter {
    pub fn new(channel: PairingChannel) -> Self {
        Self {
            channel,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Push one JPEG capture to the desktop. Returns the running tally.
    pub fn send_photo(&self, jpeg: &[u8]) -> Result<usize, PairError> {
        self.channel.send(WireMessage::Photo {
            photo: wire::jpeg_data_url(jpeg),
        })?;

        let mut sent = self.sent.lock().unwrap();
        let index = sent.len() + 1;
        sent.push(CapturedAsset {
            index,
            byte_len: jpeg.len(),
        });
        Ok(sent.len())
    }

    pub fn photos_sent(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn assets(&self) -> Vec<CapturedAsset> {
        self.sent.lock().unwrap().clone()
    }

    pub fn channel(&self) -> &PairingChannel {
        &self.channel
    }

    /// Ends the session; the camera stream itself belongs to the capture UI
    /// and is released there.
    pub fn close(&self) {
        self.channel.close();
    }
}
