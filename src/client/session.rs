//! Client session state
//!
//! The negotiator's state machine: `AwaitingSession → Established → Closed`.
//! Exactly one `Established` transition can happen per connection; a close
//! records whether a session had been established so later calls fail with
//! the right error kind.

use std::sync::{PoisonError, RwLock};
use std::time::Instant;

use url::Url;

use crate::error::SessionError;

/// An established session: the bearer handle scoping subsequent calls
#[derive(Debug, Clone)]
pub struct Session {
    /// Opaque session identifier
    pub id: String,

    /// Resolved message-submission endpoint for this session
    pub endpoint: Url,

    /// When the announcement frame was parsed
    pub established_at: Instant,
}

#[derive(Debug, Clone)]
enum State {
    AwaitingSession,
    Established(Session),
    Closed { was_established: bool },
}

/// Shared view of the session state machine
pub struct SessionHandle {
    state: RwLock<State>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandle {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(State::AwaitingSession),
        }
    }

    /// Transition to `Established`; only valid while awaiting
    ///
    /// Returns false (and changes nothing) if a session was already
    /// established or the connection closed first.
    pub fn establish(&self, session: Session) -> bool {
        let mut state = self.write();
        match *state {
            State::AwaitingSession => {
                *state = State::Established(session);
                true
            }
            _ => false,
        }
    }

    /// Transition to `Closed`; idempotent
    pub fn close(&self) {
        let mut state = self.write();
        let was_established = matches!(*state, State::Established(_));
        if !matches!(*state, State::Closed { .. }) {
            *state = State::Closed { was_established };
        }
    }

    /// The current session, or the error kind calls should fail with
    pub fn current(&self) -> Result<Session, SessionError> {
        match &*self.read() {
            State::AwaitingSession => Err(SessionError::NotEstablished),
            State::Established(session) => Ok(session.clone()),
            State::Closed {
                was_established: false,
            } => Err(SessionError::NotEstablished),
            State::Closed {
                was_established: true,
            } => Err(SessionError::Closed),
        }
    }

    /// Error kind for calls interrupted by a close
    pub fn closed_kind(&self) -> SessionError {
        match &*self.read() {
            State::Closed {
                was_established: false,
            } => SessionError::NotEstablished,
            _ => SessionError::Closed,
        }
    }

    pub fn is_established(&self) -> bool {
        matches!(*self.read(), State::Established(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(*self.read(), State::Closed { .. })
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(id: &str) -> Session {
        Session {
            id: id.to_string(),
            endpoint: Url::parse("http://localhost:8000/messages/?session_id=s").unwrap(),
            established_at: Instant::now(),
        }
    }

    #[test]
    fn test_awaiting_fails_calls() {
        let handle = SessionHandle::new();
        assert_eq!(handle.current().unwrap_err(), SessionError::NotEstablished);
    }

    #[test]
    fn test_establish_once() {
        let handle = SessionHandle::new();
        assert!(handle.establish(session("first")));
        assert!(!handle.establish(session("second")));
        assert_eq!(handle.current().unwrap().id, "first");
    }

    #[test]
    fn test_close_before_establish() {
        let handle = SessionHandle::new();
        handle.close();
        assert_eq!(handle.current().unwrap_err(), SessionError::NotEstablished);
        // a late announcement must not resurrect the connection
        assert!(!handle.establish(session("late")));
        assert_eq!(handle.closed_kind(), SessionError::NotEstablished);
    }

    #[test]
    fn test_close_after_establish() {
        let handle = SessionHandle::new();
        handle.establish(session("s"));
        handle.close();
        assert_eq!(handle.current().unwrap_err(), SessionError::Closed);
        assert_eq!(handle.closed_kind(), SessionError::Closed);
    }

    #[test]
    fn test_close_idempotent() {
        let handle = SessionHandle::new();
        handle.establish(session("s"));
        handle.close();
        handle.close();
        assert_eq!(handle.current().unwrap_err(), SessionError::Closed);
    }
}
