use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use icn_forwarder::ProcessorStatus;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub name: String,
    pub duration: Duration,
    pub operations: u64,
    pub throughput: f64,
    pub latency_avg: Duration,
    pub latency_min: Duration,
    pub latency_max: Duration,
    pub latency_p50: Duration,
    pub latency_p99: Duration,
    /// Percentage of Interests answered by the content store
    pub cache_hit_rate: f64,
}

impl BenchmarkResult {
    pub fn new(name: String) -> Self {
        Self {
            name,
            duration: Duration::from_secs(0),
            operations: 0,
            throughput: 0.0,
            latency_avg: Duration::from_secs(0),
            latency_min: Duration::from_secs(0),
            latency_max: Duration::from_secs(0),
            latency_p50: Duration::from_secs(0),
            latency_p99: Duration::from_secs(0),
            cache_hit_rate: 0.0,
        }
    }

    /// Summarize the per-Interest latencies of one run
    pub fn from_latencies(
        name: &str,
        duration: Duration,
        mut latencies: Vec<Duration>,
        cache_hits: u64,
    ) -> Self {
        let operations = latencies.len() as u64;
        if operations == 0 {
            return Self::new(name.to_string());
        }
        latencies.sort_unstable();

        Self {
            name: name.to_string(),
            duration,
            operations,
            throughput: operations as f64 / duration.as_secs_f64().max(f64::EPSILON),
            latency_avg: latencies.iter().sum::<Duration>() / latencies.len() as u32,
            latency_min: latencies[0],
            latency_max: latencies[latencies.len() - 1],
            latency_p50: nearest_rank(&latencies, 50.0),
            latency_p99: nearest_rank(&latencies, 99.0),
            cache_hit_rate: cache_hits as f64 * 100.0 / operations as f64,
        }
    }
}

/// Nearest-rank percentile of an ascending slice
fn nearest_rank(sorted: &[Duration], pct: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let rank = (pct / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Latency column value, always in microseconds
fn micros(latency: Duration) -> String {
    format!("{:.2}", latency.as_secs_f64() * 1_000_000.0)
}

/// Interest rate column value
fn per_second(rate: f64) -> String {
    if rate >= 1_000_000.0 {
        format!("{:.2}M", rate / 1_000_000.0)
    } else if rate >= 1_000.0 {
        format!("{:.1}K", rate / 1_000.0)
    } else {
        format!("{:.0}", rate)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkSummary {
    pub total_operations: u64,
    pub average_throughput: f64,
    pub total_duration: f64,
}

#[derive(Debug, Serialize)]
pub struct BenchmarkReport {
    pub timestamp: String,
    pub results: BTreeMap<String, BenchmarkResult>,
    /// Forwarder state at the end of each run
    pub status: BTreeMap<String, ProcessorStatus>,
    pub summary: BenchmarkSummary,
}

#[derive(Debug, Default)]
pub struct Reporter {
    results: BTreeMap<String, BenchmarkResult>,
    status: BTreeMap<String, ProcessorStatus>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_result(&mut self, result: BenchmarkResult, status: ProcessorStatus) {
        self.status.insert(result.name.clone(), status);
        self.results.insert(result.name.clone(), result);
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn report(&self) -> BenchmarkReport {
        BenchmarkReport {
            timestamp: chrono::Utc::now().to_rfc3339(),
            results: self.results.clone(),
            status: self.status.clone(),
            summary: self.calculate_summary(),
        }
    }

    pub fn save_results<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.report())?;
        fs::write(path.as_ref(), json)?;
        println!("Benchmark results saved to {}", path.as_ref().display());
        Ok(())
    }

    pub fn print_summary(&self) {
        if self.results.is_empty() {
            println!("No benchmark results to display");
            return;
        }

        println!("\n=== Benchmark Summary ===");
        println!(
            "{:<16} {:>10} {:>12} {:>10} {:>10} {:>10} {:>8}",
            "Run", "Interests", "Interests/s", "Avg us", "P50 us", "P99 us", "Hit %"
        );
        println!("{}", "-".repeat(82));

        for (name, result) in &self.results {
            println!(
                "{:<16} {:>10} {:>12} {:>10} {:>10} {:>10} {:>8.2}",
                name,
                result.operations,
                per_second(result.throughput),
                micros(result.latency_avg),
                micros(result.latency_p50),
                micros(result.latency_p99),
                result.cache_hit_rate
            );
        }

        let summary = self.calculate_summary();
        println!("\nTotal interests: {}", summary.total_operations);
        println!("Average rate: {} interests/s", per_second(summary.average_throughput));
        println!("Total duration: {:.2} seconds", summary.total_duration);
    }

    fn calculate_summary(&self) -> BenchmarkSummary {
        if self.results.is_empty() {
            return BenchmarkSummary {
                total_operations: 0,
                average_throughput: 0.0,
                total_duration: 0.0,
            };
        }

        BenchmarkSummary {
            total_operations: self.results.values().map(|r| r.operations).sum(),
            average_throughput: self.results.values().map(|r| r.throughput).sum::<f64>()
                / self.results.len() as f64,
            total_duration: self.results.values().map(|r| r.duration.as_secs_f64()).sum(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::{Workload, WorkloadConfig};

    #[test]
    fn test_report_serializes() {
        let mut workload = Workload::new(&WorkloadConfig {
            distinct_names: 8,
            ..Default::default()
        });
        let result = workload.run("tiny", 32);
        let status = workload.processor().status();

        let mut reporter = Reporter::new();
        reporter.add_result(result, status);
        assert_eq!(reporter.len(), 1);

        let report = reporter.report();
        assert_eq!(report.summary.total_operations, 32);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["results"]["tiny"]["operations"], 32);
        assert_eq!(json["status"]["tiny"]["metrics"]["interests_received"], 32);
    }

    #[test]
    fn test_latency_summary() {
        let latencies = [5, 1, 4, 2, 3].iter().map(|&us| Duration::from_micros(us)).collect();
        let result = BenchmarkResult::from_latencies("run", Duration::from_secs(1), latencies, 2);

        assert_eq!(result.operations, 5);
        assert_eq!(result.latency_min, Duration::from_micros(1));
        assert_eq!(result.latency_max, Duration::from_micros(5));
        assert_eq!(result.latency_p50, Duration::from_micros(3));
        assert_eq!(result.latency_p99, Duration::from_micros(5));
        assert_eq!(result.latency_avg, Duration::from_micros(3));
        assert_eq!(result.cache_hit_rate, 40.0);
        assert_eq!(result.throughput, 5.0);

        let empty = BenchmarkResult::from_latencies("none", Duration::ZERO, Vec::new(), 0);
        assert_eq!(empty.operations, 0);
    }

    #[test]
    fn test_column_formatting() {
        assert_eq!(micros(Duration::from_nanos(1_250)), "1.25");
        assert_eq!(per_second(2_500_000.0), "2.50M");
        assert_eq!(per_second(1_500.0), "1.5K");
        assert_eq!(per_second(15.0), "15");
        assert_eq!(nearest_rank(&[], 50.0), Duration::ZERO);
    }
}
