//! # Helpdesk Testing
//!
//! Testing utilities for the helpdesk services.
//!
//! This crate provides:
//! - [`InMemoryRecordStore`]: serialized in-memory store with fault injection
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - Input and record fixtures
//! - `proptest` strategies for statuses and ticket inputs
//! - [`TestHelpdesk`]: the three services wired to one store and clock
//!
//! ## Example
//!
//! ```ignore
//! use helpdesk_testing::{fixtures, TestHelpdesk};
//!
//! #[tokio::test]
//! async fn filing_a_ticket() {
//!     let helpdesk = TestHelpdesk::new();
//!     let ticket = helpdesk
//!         .tickets
//!         .create(fixtures::REPORTER, &fixtures::create_ticket_input("TCK-1"))
//!         .await
//!         .unwrap();
//!     assert_eq!(ticket.status, TicketStatus::Open);
//! }
//! ```

use chrono::{DateTime, Utc};
use helpdesk_core::environment::Clock;

pub mod fixtures;
pub mod in_memory;
pub mod strategies;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, Mutex};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use helpdesk_testing::mocks::FixedClock;
    /// use helpdesk_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same time.
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Clock starting at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward
        ///
        /// # Panics
        ///
        /// Panics if another holder of the clock panicked mid-update.
        #[allow(clippy::unwrap_used)]
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.lock().unwrap();
            *time += by;
        }
    }

    impl Clock for ManualClock {
        #[allow(clippy::unwrap_used)]
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap()
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Test helpers and utilities
pub mod helpers {
    use crate::in_memory::InMemoryRecordStore;
    use crate::mocks::test_clock;
    use helpdesk_core::config::LifecycleConfig;
    use helpdesk_core::environment::Clock;
    use helpdesk_core::history::HistoryService;
    use helpdesk_core::lifecycle::TicketService;
    use helpdesk_core::resolution::ResolutionService;
    use helpdesk_core::store::RecordStore;
    use std::sync::Arc;
    use tracing_subscriber::EnvFilter;

    /// Install a `tracing` subscriber writing through the test harness.
    ///
    /// Honors `RUST_LOG`, defaulting to `warn`. Safe to call from every test.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }

    /// The ticket, resolution and history services sharing one store.
    pub struct TestHelpdesk<S = InMemoryRecordStore> {
        /// Backing store
        pub store: Arc<S>,
        /// Lifecycle engine
        pub tickets: TicketService<S>,
        /// Resolution workflow
        pub resolutions: ResolutionService<S>,
        /// History and comments
        pub history: HistoryService<S>,
    }

    impl TestHelpdesk<InMemoryRecordStore> {
        /// Fresh in-memory store on [`test_clock`] with default configuration.
        #[must_use]
        pub fn new() -> Self {
            Self::with_store(Arc::new(InMemoryRecordStore::new()))
        }
    }

    impl Default for TestHelpdesk<InMemoryRecordStore> {
        fn default() -> Self {
            Self::new()
        }
    }

    impl<S: RecordStore> TestHelpdesk<S> {
        /// Services over `store` on [`test_clock`] with default configuration.
        #[must_use]
        pub fn with_store(store: Arc<S>) -> Self {
            Self::build(store, Arc::new(test_clock()), LifecycleConfig::default())
        }

        /// Services over `store` with an explicit clock and configuration.
        #[must_use]
        pub fn build(store: Arc<S>, clock: Arc<dyn Clock>, config: LifecycleConfig) -> Self {
            Self {
                tickets: TicketService::new(Arc::clone(&store), Arc::clone(&clock), config),
                resolutions: ResolutionService::new(Arc::clone(&store), Arc::clone(&clock), config),
                history: HistoryService::new(Arc::clone(&store), clock, config),
                store,
            }
        }
    }
}

// Re-export commonly used items
pub use helpers::{TestHelpdesk, init_test_tracing};
pub use in_memory::{FailPoint, InMemoryRecordStore, InMemoryTx};
pub use mocks::{FixedClock, ManualClock, test_clock};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(test_clock().now());
        let other = clock.clone();
        clock.advance(chrono::Duration::minutes(5));
        assert_eq!(other.now(), test_clock().now() + chrono::Duration::minutes(5));
    }
}
