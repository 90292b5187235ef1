//! Phone-side orchestrators, launched by opening a scanned invitation URL:
//! either the camera pushing captures to the desktop, or the recipient of
//! the finished report.

pub mod capture;
pub mod receive;

pub use capture::{CapturedAsset, PhotoShutter};
pub use receive::{receive_document, ReceivedDocument};

use crate::common::errors::PairError;
use crate::invite::Invite;
use crate::pairing::PairingChannel;
use crate::rendezvous::RendezvousClient;

/// Dial the session named in the invitation. Failure is terminal for the
/// session: stale QR codes fail closed and the user rescans; there is no
/// automatic retry.
pub async fn connect(
    client: &RendezvousClient,
    invite: &Invite,
) -> Result<PairingChannel, PairError> {
    client.connect_to(invite.session_id()).await
}
