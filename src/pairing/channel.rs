//! One established direct connection, framed and typed.
//!
//! A `PairingChannel` owns its transport exclusively: a single I/O task
//! holds the socket, an unbounded queue feeds it outbound frames, and
//! inbound frames are handed to the registered observer in arrival order.
//! Frames are 4-byte-length-prefixed JSON (`LengthDelimitedCodec`), one
//! `WireMessage` per frame.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use crate::common::errors::PairError;
use crate::pairing::state::{ChannelEvent, ChannelState};
use crate::wire::{self, WireMessage};

type MessageHandler = Box<dyn FnMut(WireMessage) + Send>;
type LifecycleHandler = Box<dyn FnMut() + Send>;
type ErrorHandler = Box<dyn FnMut(PairError) + Send>;

#[derive(Default)]
struct Handlers {
    on_message: Mutex<Option<MessageHandler>>,
    on_open: Mutex<Option<LifecycleHandler>>,
    on_close: Mutex<Option<LifecycleHandler>>,
    on_error: Mutex<Option<ErrorHandler>>,
}

struct Shared {
    state: Mutex<ChannelState>,
    /// Cleared by `close()`; checked before every callback so a torn-down
    /// owner never sees a late event.
    live: AtomicBool,
    handlers: Handlers,
    /// Messages that arrived before the consumer registered its observer.
    /// Drained, in order, when `on_message` is installed.
    pending_messages: Mutex<VecDeque<WireMessage>>,
    close_pending: AtomicBool,
    error_pending: Mutex<Option<PairError>>,
}

impl Shared {
    fn new(initial: ChannelState) -> Self {
        Self {
            state: Mutex::new(initial),
            live: AtomicBool::new(true),
            handlers: Handlers::default(),
            pending_messages: Mutex::new(VecDeque::new()),
            close_pending: AtomicBool::new(false),
            error_pending: Mutex::new(None),
        }
    }

    fn state(&self) -> ChannelState {
        *self.state.lock().unwrap()
    }

    fn transition(&self, event: ChannelEvent) -> ChannelState {
        let mut state = self.state.lock().unwrap();
        *state = state.apply(event);
        *state
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    fn dispatch_message(&self, message: WireMessage) {
        if !self.is_live() {
            return;
        }
        // the handler lock is held across the callback so buffered drainage
        // in on_message registration cannot interleave with live delivery
        let mut slot = self.handlers.on_message.lock().unwrap();
        match slot.as_mut() {
            Some(handler) => handler(message),
            None => self.pending_messages.lock().unwrap().push_back(message),
        }
    }

    fn dispatch_close(&self) {
        if !self.is_live() {
            return;
        }
        let mut slot = self.handlers.on_close.lock().unwrap();
        match slot.as_mut() {
            Some(handler) => handler(),
            None => self.close_pending.store(true, Ordering::SeqCst),
        }
    }

    fn dispatch_error(&self, error: PairError) {
        if !self.is_live() {
            return;
        }
        let mut slot = self.handlers.on_error.lock().unwrap();
        match slot.as_mut() {
            Some(handler) => handler(error),
            None => {
                let mut pending = self.error_pending.lock().unwrap();
                // keep the first error; later ones are usually echoes of it
                if pending.is_none() {
                    *pending = Some(error);
                }
            }
        }
    }
}

pub struct PairingChannel {
    shared: Arc<Shared>,
    outbound: Mutex<Option<mpsc::UnboundedSender<Bytes>>>,
    max_frame_bytes: usize,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PairingChannel {
    /// A channel with no transport attached. Used as the starting point of
    /// `from_stream` and to model pre-open states directly in tests.
    pub(crate) fn detached(initial: ChannelState, max_frame_bytes: usize) -> Self {
        Self {
            shared: Arc::new(Shared::new(initial)),
            outbound: Mutex::new(None),
            max_frame_bytes,
            task: Mutex::new(None),
        }
    }

    /// Wrap an established stream. The channel walks the full lifecycle
    /// (`Idle → Connecting → Open`) and spawns its I/O task.
    pub fn from_stream<S>(stream: S, max_frame_bytes: usize) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let channel = Self::detached(ChannelState::Idle, max_frame_bytes);
        channel.shared.transition(ChannelEvent::ConnectStarted);
        channel.attach(stream);
        channel
    }

    pub(crate) fn attach<S>(&self, stream: S)
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        *self.outbound.lock().unwrap() = Some(outbound_tx);
        self.shared.transition(ChannelEvent::RemoteAccepted);

        let shared = Arc::clone(&self.shared);
        let max_frame_bytes = self.max_frame_bytes;
        let handle = tokio::spawn(run(stream, shared, outbound_rx, max_frame_bytes));
        *self.task.lock().unwrap() = Some(handle);
    }

    pub fn state(&self) -> ChannelState {
        self.shared.state()
    }

    /// Queue one message for delivery. Fire-and-forget: a clean return means
    /// the message was accepted locally, not that the peer decoded it.
    pub fn send(&self, message: WireMessage) -> Result<(), PairError> {
        if self.shared.state() != ChannelState::Open {
            return Err(PairError::ChannelNotOpen);
        }
        let frame = wire::encode_frame(&message, self.max_frame_bytes)?;
        let outbound = self.outbound.lock().unwrap();
        let sender = outbound.as_ref().ok_or(PairError::ChannelNotOpen)?;
        sender
            .send(Bytes::from(frame))
            .map_err(|_| PairError::ChannelNotOpen)
    }

    /// Install the single message observer. Anything that arrived before the
    /// observer existed is replayed first, in order.
    pub fn on_message<F>(&self, mut handler: F)
    where
        F: FnMut(WireMessage) + Send + 'static,
    {
        let mut slot = self.shared.handlers.on_message.lock().unwrap();
        let buffered: Vec<WireMessage> =
            self.shared.pending_messages.lock().unwrap().drain(..).collect();
        for message in buffered {
            handler(message);
        }
        *slot = Some(Box::new(handler));
    }

    /// Fires immediately if the channel is already open.
    pub fn on_open<F>(&self, mut handler: F)
    where
        F: FnMut() + Send + 'static,
    {
        if self.shared.state() == ChannelState::Open {
            handler();
        }
        *self.shared.handlers.on_open.lock().unwrap() = Some(Box::new(handler));
    }

    pub fn on_close<F>(&self, mut handler: F)
    where
        F: FnMut() + Send + 'static,
    {
        let mut slot = self.shared.handlers.on_close.lock().unwrap();
        if self.shared.close_pending.swap(false, Ordering::SeqCst) {
            handler();
        }
        *slot = Some(Box::new(handler));
    }

    pub fn on_error<F>(&self, mut handler: F)
    where
        F: FnMut(PairError) + Send + 'static,
    {
        let mut slot = self.shared.handlers.on_error.lock().unwrap();
        if let Some(error) = self.shared.error_pending.lock().unwrap().take() {
            handler(error);
        }
        *slot = Some(Box::new(handler));
    }

    /// Idempotent teardown. Outbound messages already queued are flushed
    /// before the stream is shut down; no events are delivered afterwards.
    pub fn close(&self) {
        self.shared.live.store(false, Ordering::SeqCst);
        self.shared.transition(ChannelEvent::LocalClose);
        // dropping the sender lets the I/O task drain the queue and finish
        self.outbound.lock().unwrap().take();
    }
}

impl Drop for PairingChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for PairingChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PairingChannel")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

async fn run<S>(
    stream: S,
    shared: Arc<Shared>,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
    max_frame_bytes: usize,
) where
    S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    let codec = LengthDelimitedCodec::builder()
        .max_frame_length(max_frame_bytes)
        .new_codec();
    let mut framed = Framed::new(stream, codec);

    loop {
        tokio::select! {
            // queued outbound frames drain before the local-close shutdown
            // is observed, so "send N times then close" delivers all N
            biased;

            queued = outbound.recv() => match queued {
                Some(frame) => {
                    if let Err(err) = framed.send(frame).await {
                        shared.transition(ChannelEvent::TransportFailure);
                        shared.dispatch_error(PairError::Internal(err.into()));
                        break;
                    }
                }
                None => {
                    // local close: flush and signal EOF to the peer
                    let _ = framed.close().await;
                    break;
                }
            },

            inbound = framed.next() => match inbound {
                Some(Ok(frame)) => match wire::decode_frame(&frame) {
                    Ok(WireMessage::Unknown) => {
                        tracing::debug!("ignoring message of unknown type");
                    }
                    Ok(message) => shared.dispatch_message(message),
                    // a malformed frame spoils that transfer, not the channel
                    Err(err) => shared.dispatch_error(err),
                },
                Some(Err(err)) => {
                    shared.transition(ChannelEvent::TransportFailure);
                    shared.dispatch_error(PairError::Internal(err.into()));
                    break;
                }
                None => {
                    shared.transition(ChannelEvent::RemoteClose);
                    shared.dispatch_close();
                    break;
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    const MAX_FRAME: usize = 1024 * 1024;

    fn photo(n: usize) -> WireMessage {
        WireMessage::Photo {
            photo: format!("photo-{n}"),
        }
    }

    fn pair() -> (PairingChannel, PairingChannel) {
        let (a, b) = tokio::io::duplex(64 * 1024);
        (
            PairingChannel::from_stream(a, MAX_FRAME),
            PairingChannel::from_stream(b, MAX_FRAME),
        )
    }

    async fn wait_for<F: Fn() -> bool>(condition: F) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("condition not reached within two seconds");
    }

    #[tokio::test]
    async fn send_is_refused_in_every_non_open_state() {
        for state in [
            ChannelState::Idle,
            ChannelState::Connecting,
            ChannelState::Closed,
            ChannelState::Errored,
        ] {
            let channel = PairingChannel::detached(state, MAX_FRAME);
            let result = channel.send(photo(0));
            assert!(
                matches!(result, Err(PairError::ChannelNotOpen)),
                "state {state:?} must refuse sends, got {result:?}"
            );
        }
    }

    #[tokio::test]
    async fn send_after_close_is_channel_not_open() {
        let (a, _b) = pair();
        assert_eq!(a.state(), ChannelState::Open);
        a.close();
        assert_eq!(a.state(), ChannelState::Closed);
        assert!(matches!(a.send(photo(0)), Err(PairError::ChannelNotOpen)));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (a, _b) = pair();
        a.close();
        a.close();
        assert_eq!(a.state(), ChannelState::Closed);
    }

    #[tokio::test]
    async fn messages_arrive_in_send_order_then_close_fires() {
        let (a, b) = pair();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let closed = Arc::new(AtomicBool::new(false));
        {
            let seen = Arc::clone(&seen);
            b.on_message(move |message| {
                if let WireMessage::Photo { photo } = message {
                    seen.lock().unwrap().push(photo);
                }
            });
        }
        {
            let closed = Arc::clone(&closed);
            b.on_close(move || closed.store(true, Ordering::SeqCst));
        }

        for n in 0..5 {
            a.send(photo(n)).unwrap();
        }
        a.close();

        wait_for(|| closed.load(Ordering::SeqCst)).await;
        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            (0..5).map(|n| format!("photo-{n}")).collect::<Vec<_>>()
        );
        assert_eq!(b.state(), ChannelState::Closed);
    }

    #[tokio::test]
    async fn no_events_are_delivered_after_local_close() {
        let (a, b) = pair();

        let count = Arc::new(AtomicUsize::new(0));
        {
            let count = Arc::clone(&count);
            b.on_message(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        a.send(photo(0)).unwrap();
        wait_for(|| count.load(Ordering::SeqCst) == 1).await;

        b.close();
        // the peer can still push; nothing may reach the closed consumer
        let _ = a.send(photo(1));
        let _ = a.send(photo(2));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(b.state(), ChannelState::Closed);
    }

    #[tokio::test]
    async fn messages_sent_before_the_observer_exists_are_replayed_in_order() {
        let (a, b) = pair();

        for n in 0..3 {
            a.send(photo(n)).unwrap();
        }
        a.close();

        // give the frames time to land in the buffer before the observer shows up
        tokio::time::sleep(Duration::from_millis(100)).await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            b.on_message(move |message| {
                if let WireMessage::Photo { photo } = message {
                    seen.lock().unwrap().push(photo);
                }
            });
        }

        wait_for(|| seen.lock().unwrap().len() == 3).await;
        assert_eq!(
            *seen.lock().unwrap(),
            (0..3).map(|n| format!("photo-{n}")).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn remote_close_is_observed_even_if_registered_late() {
        let (a, b) = pair();
        a.close();

        wait_for(|| b.state() == ChannelState::Closed).await;

        let closed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&closed);
        b.on_close(move || flag.store(true, Ordering::SeqCst));
        assert!(closed.load(Ordering::SeqCst), "buffered close event lost");
    }

    #[tokio::test]
    async fn on_open_fires_immediately_for_an_established_channel() {
        let (a, _b) = pair();
        let opened = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&opened);
        a.on_open(move || flag.store(true, Ordering::SeqCst));
        assert!(opened.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn unknown_message_types_are_dropped_silently() {
        let (a, b) = tokio::io::duplex(64 * 1024);
        let b = PairingChannel::from_stream(b, MAX_FRAME);

        let count = Arc::new(AtomicUsize::new(0));
        {
            let count = Arc::clone(&count);
            b.on_message(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }

        // hand-framed message of a future type, then a known one
        let mut raw = Framed::new(a, LengthDelimitedCodec::new());
        raw.send(Bytes::from(r#"{"type":"ping"}"#)).await.unwrap();
        raw.send(Bytes::from(
            r#"{"type":"photo","photo":"data:image/jpeg;base64,aGk="}"#,
        ))
        .await
        .unwrap();

        wait_for(|| count.load(Ordering::SeqCst) == 1).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1, "unknown type reached the observer");
        assert_eq!(b.state(), ChannelState::Open);
    }

    #[tokio::test]
    async fn oversized_send_fails_without_killing_the_channel() {
        let (a, _b) = pair();
        let huge = WireMessage::Photo {
            photo: "x".repeat(MAX_FRAME + 1),
        };
        assert!(matches!(
            a.send(huge),
            Err(PairError::TransferEncodingFailure(_))
        ));
        assert_eq!(a.state(), ChannelState::Open);
        a.send(photo(0)).unwrap();
    }
}
