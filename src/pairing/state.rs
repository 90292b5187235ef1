//! Lifecycle of one pairing channel, as a single authoritative transition
//! function. UI layers render the current variant; nothing derives status
//! from side flags.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
    Idle,
    Connecting,
    Open,
    Closed,
    Errored,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelEvent {
    ConnectStarted,
    RemoteAccepted,
    LocalClose,
    RemoteClose,
    TransportFailure,
}

impl ChannelState {
    /// `Closed` and `Errored` are terminal: a failed or finished channel is
    /// discarded and a fresh session created, never revived.
    pub fn is_terminal(self) -> bool {
        matches!(self, ChannelState::Closed | ChannelState::Errored)
    }

    pub fn apply(self, event: ChannelEvent) -> ChannelState {
        use ChannelEvent::*;
        use ChannelState::*;

        match (self, event) {
            // terminal states absorb everything, including late transport noise
            (Closed, _) | (Errored, _) => self,

            (Idle, ConnectStarted) => Connecting,
            (Connecting, RemoteAccepted) => Open,
            (Connecting, TransportFailure) => Errored,
            (Open, TransportFailure) => Errored,
            (_, LocalClose) | (_, RemoteClose) => Closed,

            // out-of-order events (a RemoteAccepted while Idle, say) change nothing
            (state, _) => state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ChannelEvent::*;
    use super::ChannelState::*;

    #[test]
    fn nominal_lifecycle() {
        let state = Idle.apply(ConnectStarted);
        assert_eq!(state, Connecting);
        let state = state.apply(RemoteAccepted);
        assert_eq!(state, Open);
        let state = state.apply(LocalClose);
        assert_eq!(state, Closed);
    }

    #[test]
    fn failures_reach_errored_from_connecting_and_open() {
        assert_eq!(Connecting.apply(TransportFailure), Errored);
        assert_eq!(Open.apply(TransportFailure), Errored);
        // but not from idle; nothing is in flight yet
        assert_eq!(Idle.apply(TransportFailure), Idle);
    }

    #[test]
    fn remote_disconnect_closes_an_open_channel() {
        assert_eq!(Open.apply(RemoteClose), Closed);
    }

    #[test]
    fn terminal_states_absorb_every_event() {
        for event in [
            ConnectStarted,
            RemoteAccepted,
            LocalClose,
            RemoteClose,
            TransportFailure,
        ] {
            assert_eq!(Closed.apply(event), Closed);
            assert_eq!(Errored.apply(event), Errored);
        }
    }

    #[test]
    fn close_is_reachable_from_any_live_state() {
        assert_eq!(Idle.apply(LocalClose), Closed);
        assert_eq!(Connecting.apply(LocalClose), Closed);
        assert_eq!(Open.apply(LocalClose), Closed);
    }
}
