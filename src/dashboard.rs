//! Latest-wins holder for fetched results.
//!
//! Every fetch takes a [`Ticket`] from [`ViewState::begin`]. When the fetch
//! completes, [`ViewState::apply`] stores the result only if no newer ticket
//! has been issued since, so a slow response can never overwrite a newer one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::debug;

/// Generation number of an issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

impl Ticket {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

/// Shared view state guarded by a generation counter.
#[derive(Debug)]
pub struct ViewState<T> {
    latest: AtomicU64,
    current: Mutex<Option<(Ticket, T)>>,
}

impl<T> Default for ViewState<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ViewState<T> {
    pub fn new() -> Self {
        Self {
            latest: AtomicU64::new(0),
            current: Mutex::new(None),
        }
    }

    /// Issue a ticket for a new request, superseding all earlier ones.
    pub fn begin(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Whether `ticket` is still the most recently issued one.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }

    /// Store `value` if `ticket` is current. Returns whether it was kept.
    pub fn apply(&self, ticket: Ticket, value: T) -> bool {
        let mut current = self
            .current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if !self.is_current(ticket) {
            debug!(
                "Discarding stale result from generation {} (latest {})",
                ticket.0,
                self.latest.load(Ordering::SeqCst)
            );
            return false;
        }

        *current = Some((ticket, value));
        true
    }

    /// Generation of the stored value, if any.
    pub fn applied_generation(&self) -> Option<u64> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map(|(ticket, _)| ticket.0)
    }
}

impl<T: Clone> ViewState<T> {
    /// Clone of the stored value.
    pub fn snapshot(&self) -> Option<T> {
        self.current
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .as_ref()
            .map(|(_, value)| value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_latest_ticket_wins() {
        let view: ViewState<&str> = ViewState::new();

        let first = view.begin();
        let second = view.begin();
        assert!(!view.is_current(first));
        assert!(view.is_current(second));

        assert!(view.apply(second, "fresh"));
        assert!(!view.apply(first, "stale"));

        assert_eq!(view.snapshot(), Some("fresh"));
        assert_eq!(view.applied_generation(), Some(2));
    }

    #[test]
    fn test_empty_until_applied() {
        let view: ViewState<u32> = ViewState::default();
        assert_eq!(view.snapshot(), None);

        let ticket = view.begin();
        assert_eq!(ticket.generation(), 1);
        assert!(view.apply(ticket, 7));
        assert_eq!(view.snapshot(), Some(7));
    }

    #[tokio::test]
    async fn test_slow_superseded_request_is_discarded() {
        let view = Arc::new(ViewState::<String>::new());

        let slow_ticket = view.begin();
        let slow_view = Arc::clone(&view);
        let slow = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            slow_view.apply(slow_ticket, "old filters".to_string())
        });

        let fast_ticket = view.begin();
        assert!(view.apply(fast_ticket, "new filters".to_string()));

        assert!(!slow.await.unwrap());
        assert_eq!(view.snapshot().as_deref(), Some("new filters"));
    }
}
