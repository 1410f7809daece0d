//! Synthetic workloads and reporting for forwarder benchmarks.

pub mod reporter;
pub mod workload;

pub use reporter::{BenchmarkReport, BenchmarkResult, Reporter};
pub use workload::{NullConnections, Workload, WorkloadConfig};
