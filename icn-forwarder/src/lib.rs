//! ICN forwarding engine: PIT, FIB, content store and the message
//! processor that ties them together.

pub mod config;
pub mod connection;
pub mod content_store;
pub mod fib;
pub mod lru;
pub mod matching_rules;
pub mod metrics;
pub mod pit;
pub mod processor;
pub mod strategy;
pub mod tap;

pub use config::ForwarderConfig;
pub use connection::ConnectionTable;
pub use content_store::{ContentStore, ContentStoreStats, LruContentStore};
pub use fib::{EmptyRoutePolicy, FibEntryInfo, ForwardingInformationBase, Route, RouteOrigin};
pub use metrics::{ForwarderMetrics, MetricsSnapshot};
pub use pit::{PendingInterestTable, PitEntry, PitVerdict};
pub use processor::{ControlHandler, MessageProcessor, ProcessorStatus};
pub use strategy::{ForwardingStrategy, StrategyKind};
pub use tap::{Tap, TapEvent};
