use std::sync::Arc;

use crate::error::ClientError;

/// Lifecycle phase of a polling session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// No attempt outstanding and none scheduled
    Idle,
    /// An attempt is in flight
    Fetching,
    /// Waiting for the interval to elapse before the next attempt
    Scheduled,
    /// Stop predicate matched; only an explicit restart leaves this phase
    Stopped,
}

/// Inputs driving the session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Start an attempt. Scheduled ticks are `manual: false`; refetch,
    /// re-enable and fetcher replacement are `manual: true`.
    Tick { manual: bool },
    Success { stop: bool, reschedule: bool },
    Failure { reschedule: bool },
    /// Outstanding work was cancelled without a result
    Cancel,
    Teardown,
}

impl SessionPhase {
    /// Phase after `event`
    pub fn on(self, event: SessionEvent) -> SessionPhase {
        use SessionEvent::*;
        use SessionPhase::*;

        match (self, event) {
            (Stopped, Tick { manual: false }) => Stopped,
            (_, Tick { .. }) => Fetching,
            (Fetching, Success { stop: true, .. }) => Stopped,
            (Fetching, Success { reschedule: true, .. }) => Scheduled,
            (Fetching, Success { .. }) => Idle,
            (Fetching, Failure { reschedule: true }) => Scheduled,
            (Fetching, Failure { .. }) => Idle,
            // Results only arrive while fetching
            (phase, Success { .. } | Failure { .. }) => phase,
            (Stopped, Cancel) => Stopped,
            (_, Cancel) => Idle,
            (_, Teardown) => Idle,
        }
    }

    pub fn is_stopped(self) -> bool {
        self == SessionPhase::Stopped
    }
}

/// Observable state of a polled resource.
///
/// `data` keeps the last successful value across failed attempts and
/// `error` holds the latest failure until the next success.
#[derive(Debug, Clone)]
pub struct ResourceState<T> {
    pub data: Option<T>,
    pub loading: bool,
    pub error: Option<Arc<ClientError>>,
    pub phase: SessionPhase,
    /// Attempts started over the resource's lifetime
    pub attempts: u64,
}

impl<T> ResourceState<T> {
    pub fn new(loading: bool) -> Self {
        Self {
            data: None,
            loading,
            error: None,
            phase: SessionPhase::Idle,
            attempts: 0,
        }
    }

    /// Loading with nothing to show yet
    pub fn is_initial_loading(&self) -> bool {
        self.loading && self.data.is_none() && self.error.is_none()
    }

    pub fn is_stopped(&self) -> bool {
        self.phase.is_stopped()
    }
}

impl<T> Default for ResourceState<T> {
    fn default() -> Self {
        Self::new(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SessionEvent::*;
    use SessionPhase::*;

    #[test]
    fn test_success_paths() {
        assert_eq!(Fetching.on(Success { stop: false, reschedule: true }), Scheduled);
        assert_eq!(Fetching.on(Success { stop: false, reschedule: false }), Idle);
        assert_eq!(Fetching.on(Success { stop: true, reschedule: true }), Stopped);
    }

    #[test]
    fn test_failure_keeps_polling_when_enabled() {
        assert_eq!(Fetching.on(Failure { reschedule: true }), Scheduled);
        assert_eq!(Fetching.on(Failure { reschedule: false }), Idle);
    }

    #[test]
    fn test_scheduled_tick_after_stop_is_noop() {
        assert_eq!(Stopped.on(Tick { manual: false }), Stopped);
        assert_eq!(Stopped.on(Tick { manual: false }).on(Tick { manual: false }), Stopped);
        assert_eq!(Stopped.on(Tick { manual: true }), Fetching);
    }

    #[test]
    fn test_tick_supersedes_in_flight_attempt() {
        assert_eq!(Fetching.on(Tick { manual: true }), Fetching);
        assert_eq!(Scheduled.on(Tick { manual: false }), Fetching);
        assert_eq!(Idle.on(Tick { manual: false }), Fetching);
    }

    #[test]
    fn test_cancel_and_teardown() {
        assert_eq!(Fetching.on(Cancel), Idle);
        assert_eq!(Scheduled.on(Cancel), Idle);
        assert_eq!(Stopped.on(Cancel), Stopped);
        assert_eq!(Stopped.on(Teardown), Idle);
        assert_eq!(Scheduled.on(Teardown), Idle);
    }

    #[test]
    fn test_stray_results_do_not_move_phase() {
        assert_eq!(Idle.on(Success { stop: true, reschedule: false }), Idle);
        assert_eq!(Stopped.on(Failure { reschedule: true }), Stopped);
    }

    #[test]
    fn test_initial_loading() {
        let state: ResourceState<u32> = ResourceState::new(true);
        assert!(state.is_initial_loading());
        let idle: ResourceState<u32> = ResourceState::default();
        assert!(!idle.is_initial_loading());
        assert!(!idle.is_stopped());
    }
}
