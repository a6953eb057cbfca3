/// Events the API client reports about the session it is serving.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Token renewal failed; the token store has already been cleared.
    Invalidated,
}

/// Receives session events emitted by the API client.
pub trait SessionListener: Send + Sync {
    fn on_session_event(&self, event: SessionEvent);
}
