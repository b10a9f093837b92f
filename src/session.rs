//! MCP session lifecycle.
//!
//! A session progresses Uninitialized -> Initializing -> Initialized. Before
//! initialization completes only `initialize` and `ping` are accepted. The
//! HTTP transport creates a fresh session per request (see
//! [`crate::router::McpRouter::with_fresh_session`]) so correlation ids from
//! distinct clients cannot cross.

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

/// Session lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionPhase {
    /// Only `initialize` and `ping` are valid.
    Uninitialized = 0,
    /// `initialize` answered, waiting for the `initialized` notification.
    Initializing = 1,
    /// Normal operation.
    Initialized = 2,
}

impl From<u8> for SessionPhase {
    fn from(value: u8) -> Self {
        match value {
            1 => SessionPhase::Initializing,
            2 => SessionPhase::Initialized,
            _ => SessionPhase::Uninitialized,
        }
    }
}

/// Shared session state, cloneable across request handling.
#[derive(Clone)]
pub struct SessionState {
    phase: Arc<AtomicU8>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            phase: Arc::new(AtomicU8::new(SessionPhase::Uninitialized as u8)),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase.load(Ordering::Acquire).into()
    }

    pub fn set_phase(&self, phase: SessionPhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    /// Whether requests beyond `initialize`/`ping` may be served.
    pub fn is_ready(&self) -> bool {
        // The `initialized` notification is optional for stateless clients;
        // answering from Initializing keeps single-shot HTTP requests working.
        matches!(
            self.phase(),
            SessionPhase::Initializing | SessionPhase::Initialized
        )
    }
}
