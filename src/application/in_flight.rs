use dashmap::DashSet;
use std::collections::HashSet;
use std::sync::Arc;

/// Order numbers currently owned by a worker of this process.
///
/// Internally synchronized; callers never lock. Marking is best-effort
/// de-duplication for the sweeper, not an exclusive claim.
#[derive(Debug, Default, Clone)]
pub struct InFlightTracker {
    orders: Arc<DashSet<String>>,
}

impl InFlightTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` if the order was already marked.
    pub fn mark(&self, number: &str) -> bool {
        self.orders.insert(number.to_string())
    }

    pub fn unmark(&self, number: &str) -> bool {
        self.orders.remove(number).is_some()
    }

    pub fn is_marked(&self, number: &str) -> bool {
        self.orders.contains(number)
    }

    /// Point-in-time copy of the marked set.
    pub fn snapshot(&self) -> HashSet<String> {
        self.orders.iter().map(|entry| entry.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Unmarks `number` when the returned guard is dropped, whatever path the worker exits by.
    pub fn release_on_drop(&self, number: &str) -> InFlightGuard {
        InFlightGuard {
            tracker: self.clone(),
            number: number.to_string(),
        }
    }
}

#[derive(Debug)]
pub struct InFlightGuard {
    tracker: InFlightTracker,
    number: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.tracker.unmark(&self.number);
    }
}
