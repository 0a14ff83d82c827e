use std::time::Instant;
use uuid::Uuid;

/// Lifecycle of one connection's pipeline. Every operation gates on this
/// enum, never on the presence of a process handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    /// No cycle has run on this connection yet
    Idle,
    Running,
    /// Teardown in progress; start/stop requests are no-ops
    Stopping,
    /// A cycle completed; a new `start` opens a fresh record
    Stopped,
}

impl SessionStatus {
    pub fn is_running(self) -> bool {
        matches!(self, SessionStatus::Running)
    }
}

/// Per-cycle bookkeeping, reset wholesale on every start.
#[derive(Debug, Default)]
pub struct CycleState {
    /// Persistence record id, allocated only when a cycle actually starts
    pub record_id: Option<Uuid>,

    /// When the cycle started, for duration measurement
    pub started: Option<Instant>,

    /// Flips false -> true exactly once per cycle, at the persistence write
    pub finalized: bool,
}
