use std::time::Duration;

/// Tunables for the protocol engine. `Default` carries the usual BEP-5
/// defaults; the `with_*` methods follow a consuming-builder style, the way
/// `Discv4::with_revalidation_interval_of` configures a long-lived service
/// without a constructor taking ten positional arguments.
#[derive(Clone, Debug)]
pub struct Config {
    /// Per-query retry budget ("Try" in BEP-5's terminology).
    pub try_count: u32,
    /// Kademlia bucket size ("K" in BEP-5's terminology).
    pub k: usize,
    /// Capacity of the packet-intake work semaphore.
    pub work_semaphore_capacity: usize,
    /// Capacity of the pending-query channel.
    pub pending_query_capacity: usize,
    /// Per-attempt timeout waiting for a transaction's completion signal.
    pub attempt_timeout: Duration,
    /// Interval between periodic self/random lookups.
    pub lookup_interval: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            try_count: 3,
            k: 8,
            work_semaphore_capacity: 1024,
            pending_query_capacity: 1024,
            attempt_timeout: Duration::from_secs(15),
            lookup_interval: Duration::from_secs(30 * 60),
        }
    }
}

impl Config {
    pub fn with_try_count(mut self, try_count: u32) -> Self {
        self.try_count = try_count;
        self
    }

    pub fn with_k(mut self, k: usize) -> Self {
        self.k = k;
        self
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    pub fn with_lookup_interval(mut self, interval: Duration) -> Self {
        self.lookup_interval = interval;
        self
    }

    /// The completion-signal channel must accept at least `Try + 1`
    /// non-blocking sends, so a burst of late duplicate signals from
    /// retried attempts never blocks a handler's `try_send`.
    pub fn completion_channel_capacity(&self) -> usize {
        self.try_count as usize + 1
    }
}
