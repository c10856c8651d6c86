use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

const UNKNOWN: u8 = 0;
const CONNECTED: u8 = 1;
const DISCONNECTED: u8 = 2;

/// Edge in the transport's connectivity signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityTransition {
    Lost,
    Restored,
}

/// Tracks the boolean "connected" signal of the progress transport.
///
/// Only transitions matter. The first sample establishes the baseline without
/// producing a transition, so a session that starts offline does not warn
/// until it has been online at least once.
#[derive(Default)]
pub struct ConnectivityObserver {
    /// UNKNOWN until the first sample arrives
    status: AtomicU8,
    /// Set when the link dropped after having been up; cleared on restore
    lost: AtomicBool,
}

impl ConnectivityObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one sample of the signal. Returns the transition it caused, if any.
    pub fn update(&self, connected: bool) -> Option<ConnectivityTransition> {
        let next = if connected { CONNECTED } else { DISCONNECTED };
        let previous = self.status.swap(next, Ordering::SeqCst);

        match (previous, next) {
            (CONNECTED, DISCONNECTED) => {
                self.lost.store(true, Ordering::SeqCst);
                log::warn!("Connectivity: Lost connection to the progress feed");
                Some(ConnectivityTransition::Lost)
            }
            (DISCONNECTED, CONNECTED) => {
                let was_lost = self.lost.swap(false, Ordering::SeqCst);
                log::info!("Connectivity: Connection restored");
                // Offline from the start and now up for the first time is not a restore.
                was_lost.then_some(ConnectivityTransition::Restored)
            }
            (UNKNOWN, _) => {
                log::debug!("Connectivity: Initial state connected={}", connected);
                None
            }
            _ => None,
        }
    }

    /// `None` until the signal has been observed.
    pub fn is_connected(&self) -> Option<bool> {
        match self.status.load(Ordering::SeqCst) {
            CONNECTED => Some(true),
            DISCONNECTED => Some(false),
            _ => None,
        }
    }

    pub fn show_connection_warning(&self) -> bool {
        self.lost.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_edges_produce_transitions() {
        let observer = ConnectivityObserver::new();
        assert_eq!(observer.is_connected(), None);
        assert_eq!(observer.update(true), None);
        assert_eq!(observer.update(true), None);
        assert!(!observer.show_connection_warning());

        assert_eq!(observer.update(false), Some(ConnectivityTransition::Lost));
        assert_eq!(observer.update(false), None);
        assert!(observer.show_connection_warning());
        assert_eq!(observer.is_connected(), Some(false));

        assert_eq!(observer.update(true), Some(ConnectivityTransition::Restored));
        assert!(!observer.show_connection_warning());
    }

    #[test]
    fn test_starting_offline_does_not_warn() {
        let observer = ConnectivityObserver::new();
        assert_eq!(observer.update(false), None);
        assert!(!observer.show_connection_warning());
        assert_eq!(observer.update(true), None);
        assert_eq!(observer.is_connected(), Some(true));
    }
}
