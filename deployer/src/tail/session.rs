//! Finite state machine for a live tail session

/// Tail session state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TailState {
    /// Subscription requested, not yet acknowledged
    Starting,

    /// Acknowledged, log lines are flowing
    Streaming,

    /// Local close requested
    Closing,

    /// Transport shut down
    Closed,

    /// Transport failed; terminal
    Failed,
}

/// Tail session event
#[derive(Debug, Clone)]
pub enum TailEvent {
    /// Session-start frame received
    Acknowledged,

    /// Budget expired or caller closed the session
    CloseRequested,

    /// Transport confirmed shut down, locally or upstream
    TransportClosed,

    /// Transport reported an error or an unrecognized frame
    TransportFailed(String),
}

/// Tail session FSM
#[derive(Debug, Clone)]
pub struct TailSession {
    state: TailState,
    error: Option<String>,
}

impl TailSession {
    /// Create a new session in starting state
    pub fn new() -> Self {
        Self {
            state: TailState::Starting,
            error: None,
        }
    }

    /// Get current state
    pub fn state(&self) -> &TailState {
        &self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: TailEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            (TailState::Starting, TailEvent::Acknowledged) => TailState::Streaming,

            (TailState::Starting | TailState::Streaming, TailEvent::CloseRequested) => {
                TailState::Closing
            }

            // Repeated or late acknowledgments leave the state as is
            (TailState::Streaming, TailEvent::Acknowledged) => TailState::Streaming,
            (TailState::Closing, TailEvent::Acknowledged) => TailState::Closing,

            (
                TailState::Starting | TailState::Streaming | TailState::Closing,
                TailEvent::TransportClosed,
            ) => TailState::Closed,

            (
                TailState::Starting | TailState::Streaming | TailState::Closing,
                TailEvent::TransportFailed(err),
            ) => {
                self.error = Some(err.clone());
                TailState::Failed
            }

            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }

    /// Whether the session has ended
    pub fn is_terminal(&self) -> bool {
        matches!(self.state, TailState::Closed | TailState::Failed)
    }
}

impl Default for TailSession {
    fn default() -> Self {
        Self::new()
    }
}
