//! Forwarder counters.
//!
//! One [`ForwarderMetrics`] is handed to the message processor when it is
//! built. Counters are atomic so another task can snapshot them while the
//! forwarder runs.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::Relaxed);
    }
}

macro_rules! forwarder_metrics {
    ($($(#[$doc:meta])* $field:ident),* $(,)?) => {
        /// Message processor counters
        #[derive(Debug, Default)]
        pub struct ForwarderMetrics {
            $($(#[$doc])* pub $field: Counter,)*
        }

        /// Point-in-time copy of [`ForwarderMetrics`]
        #[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
        pub struct MetricsSnapshot {
            $(pub $field: u64,)*
        }

        impl ForwarderMetrics {
            pub fn snapshot(&self) -> MetricsSnapshot {
                MetricsSnapshot {
                    $($field: self.$field.value(),)*
                }
            }

            pub fn reset(&self) {
                $(self.$field.reset();)*
            }
        }
    };
}

forwarder_metrics! {
    /// Every message handed to the processor
    received,
    interests_received,
    objects_received,
    control_received,
    /// Interests folded into an existing PIT entry
    interests_aggregated,
    interests_forwarded,
    interests_satisfied_from_store,
    objects_forwarded,
    /// Every dropped message, whatever the reason
    dropped,
    interests_dropped,
    objects_dropped,
    dropped_malformed,
    dropped_no_route,
    /// Content objects nobody asked for
    dropped_no_reverse_path,
    dropped_connection_not_found,
    dropped_no_hop_limit,
    dropped_zero_hop_limit_from_remote,
    dropped_zero_hop_limit_to_remote,
    send_failures,
    pit_timeouts,
}
