//! Live tail transport handle
//!
//! A subscription is a one-directional frame channel plus a deferred error
//! slot. The producer (the platform adapter) pushes frames and records
//! transport failures; the consumer reads frames; a separate closer ends
//! the session. Dropping the frame sender is the "stream closed" condition.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{mpsc, watch};

/// A single line of function output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEvent {
    /// Milliseconds since the Unix epoch, when the platform supplies one
    pub timestamp: Option<i64>,
    pub message: String,
}

impl LogEvent {
    pub fn new(timestamp: Option<i64>, message: impl Into<String>) -> Self {
        Self {
            timestamp,
            message: message.into(),
        }
    }
}

/// A frame delivered by the live tail transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailFrame {
    /// Session acknowledgment
    SessionStart,

    /// Log events, in delivery order
    SessionUpdate(Vec<LogEvent>),

    /// Frame type the consumer does not understand
    Unknown(String),
}

/// Error recorded by the producer, read by the consumer after the fact
#[derive(Debug, Clone, Default)]
pub struct DeferredError {
    inner: Arc<Mutex<Option<String>>>,
}

impl DeferredError {
    /// Record an error; the first one recorded wins
    pub fn set(&self, message: impl Into<String>) {
        let mut slot = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.is_none() {
            *slot = Some(message.into());
        }
    }

    /// The recorded error, if any
    pub fn get(&self) -> Option<String> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Open live tail subscription
#[derive(Debug)]
pub struct LiveTailStream {
    frames: mpsc::Receiver<TailFrame>,
    deferred_error: DeferredError,
    close_tx: watch::Sender<bool>,
}

impl LiveTailStream {
    /// Wrap a frame channel; the returned receiver tells the producer when to stop
    pub fn new(
        frames: mpsc::Receiver<TailFrame>,
        deferred_error: DeferredError,
    ) -> (Self, watch::Receiver<bool>) {
        let (close_tx, close_rx) = watch::channel(false);
        let stream = Self {
            frames,
            deferred_error,
            close_tx,
        };
        (stream, close_rx)
    }

    /// Separate the consumer side from the closer
    pub fn split(self) -> (FrameReader, TailCloser) {
        let reader = FrameReader {
            frames: self.frames,
            deferred_error: self.deferred_error,
            closed: self.close_tx.subscribe(),
        };
        (reader, TailCloser { close_tx: self.close_tx })
    }
}

/// Outcome of one read from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Received {
    Frame(TailFrame),

    /// The producer hung up (nil frame)
    End,

    /// The session was closed locally
    Closed,
}

/// Consumer side of a subscription
pub struct FrameReader {
    frames: mpsc::Receiver<TailFrame>,
    deferred_error: DeferredError,
    closed: watch::Receiver<bool>,
}

impl FrameReader {
    /// Wait for the next frame; local closure takes priority over buffered frames
    pub async fn recv(&mut self) -> Received {
        if *self.closed.borrow() {
            return Received::Closed;
        }
        tokio::select! {
            biased;
            _ = self.closed.changed() => Received::Closed,
            frame = self.frames.recv() => match frame {
                Some(frame) => Received::Frame(frame),
                None => Received::End,
            },
        }
    }

    /// Whether the session has been closed locally; never waits
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Error recorded by the producer, if any
    pub fn deferred_error(&self) -> Option<String> {
        self.deferred_error.get()
    }
}

/// Closes a subscription
pub struct TailCloser {
    close_tx: watch::Sender<bool>,
}

impl TailCloser {
    pub fn close(&self) {
        self.close_tx.send_replace(true);
    }
}
