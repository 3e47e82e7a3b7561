//! Connection state and change detection

/// Connection state as reported by the underlying transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

impl ConnectionState {
    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

/// Lifecycle notification derived from a state change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Connected,
    Disconnected,
}

/// Detects state changes across periodic observations
///
/// Each actual change is reported exactly once; observing the same state
/// again yields nothing. The very first observation always counts as a
/// change.
#[derive(Debug, Default)]
pub struct StateMonitor {
    previous: Option<ConnectionState>,
}

impl StateMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an observation and return the transition it implies, if any
    pub fn observe(&mut self, state: ConnectionState) -> Option<Transition> {
        if self.previous == Some(state) {
            return None;
        }
        self.previous = Some(state);

        Some(if state.is_open() {
            Transition::Connected
        } else {
            Transition::Disconnected
        })
    }

    /// Last observed state
    pub fn last(&self) -> Option<ConnectionState> {
        self.previous
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_observation_reports() {
        let mut monitor = StateMonitor::new();
        assert_eq!(monitor.last(), None);
        assert_eq!(
            monitor.observe(ConnectionState::Connecting),
            Some(Transition::Disconnected)
        );
        assert_eq!(monitor.last(), Some(ConnectionState::Connecting));
    }

    #[test]
    fn test_unchanged_state_is_silent() {
        let mut monitor = StateMonitor::new();
        monitor.observe(ConnectionState::Open);
        assert_eq!(monitor.observe(ConnectionState::Open), None);
        assert_eq!(monitor.observe(ConnectionState::Open), None);
    }

    #[test]
    fn test_full_lifecycle() {
        let mut monitor = StateMonitor::new();
        let observed: Vec<_> = [
            ConnectionState::Connecting,
            ConnectionState::Connecting,
            ConnectionState::Open,
            ConnectionState::Open,
            ConnectionState::Closed,
            ConnectionState::Connecting,
            ConnectionState::Open,
        ]
        .into_iter()
        .filter_map(|state| monitor.observe(state))
        .collect();

        assert_eq!(
            observed,
            vec![
                Transition::Disconnected,
                Transition::Connected,
                Transition::Disconnected,
                Transition::Disconnected,
                Transition::Connected,
            ]
        );
    }

    #[test]
    fn test_is_open() {
        assert!(ConnectionState::Open.is_open());
        assert!(!ConnectionState::Connecting.is_open());
        assert!(!ConnectionState::Closed.is_open());
    }
}
