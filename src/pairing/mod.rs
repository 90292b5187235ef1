pub mod channel;
pub mod state;

pub use channel::PairingChannel;
pub use state::{ChannelEvent, ChannelState};
