//! Invitation URLs carried by the QR code.
//!
//! `<origin>?photo=1&peer=<id>` pairs the phone as a camera,
//! `<origin>?pdf=1&peer=<id>` as a report recipient. Opening the URL is the
//! entire handshake from the phone's point of view, so this format is the
//! one contract external scanners must honor exactly.

use reqwest::Url;
use thiserror::Error;

use crate::session::{SessionId, SessionIdError};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PairMode {
    /// Phone acts as a remote camera and pushes photos to the desktop.
    Photo,
    /// Phone receives the finished report for sharing/printing.
    Pdf,
}

impl PairMode {
    pub fn flag(self) -> &'static str {
        match self {
            PairMode::Photo => "photo",
            PairMode::Pdf => "pdf",
        }
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum InviteError {
    #[error("not a valid URL")]
    NotAUrl,

    #[error("URL carries no pairing mode flag")]
    MissingMode,

    #[error("URL carries no peer session identifier")]
    MissingPeer,

    #[error(transparent)]
    BadSessionId(#[from] SessionIdError),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invite {
    mode: PairMode,
    session_id: SessionId,
}

impl Invite {
    pub fn new(mode: PairMode, session_id: SessionId) -> Self {
        Self { mode, session_id }
    }

    pub fn mode(&self) -> PairMode {
        self.mode
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub fn to_url(&self, origin: &str) -> String {
        format!(
            "{}?{}=1&peer={}",
            origin.trim_end_matches('?'),
            self.mode.flag(),
            self.session_id
        )
    }

    pub fn parse(raw: &str) -> Result<Self, InviteError> {
        let url = Url::parse(raw).map_err(|_| InviteError::NotAUrl)?;

        let mut photo = false;
        let mut pdf = false;
        let mut peer = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "photo" => photo = value == "1",
                "pdf" => pdf = value == "1",
                "peer" => peer = Some(value.into_owned()),
                _ => {}
            }
        }

        // photo wins if both flags are somehow present
        let mode = if photo {
            PairMode::Photo
        } else if pdf {
            PairMode::Pdf
        } else {
            return Err(InviteError::MissingMode);
        };

        let peer = peer.ok_or(InviteError::MissingPeer)?;
        let session_id = SessionId::parse(&peer)?;
        Ok(Invite::new(mode, session_id))
    }
}
