//! Desktop-side orchestrators: collect photos from the paired phone, or
//! push the finished report to it. Each owns its session and channel
//! exclusively and releases both on teardown.

pub mod pdf;
pub mod photos;

pub use pdf::{OutgoingDocument, PdfSender, SendState};
pub use photos::{PhotoInbox, PhotoSink, ReceivedPhoto};
