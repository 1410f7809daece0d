use std::collections::{BTreeMap, VecDeque};

use log::info;
use serde::Serialize;

/// Weight of the previous timer value when smoothing
pub const TIMEOUT_SMOOTHER: f64 = 0.1;

/// Timer target as a multiple of the current RTT
pub const TIMEOUT_RATIO: f64 = 10.0;

/// Silence after which a path is considered dead (µs)
pub const STALE_PATH_THRESHOLD_US: u64 = 2_000_000;

/// Weight of history in the average RTT
const AVERAGE_RTT_ALPHA: f64 = 0.99;

/// Starting RTT estimate (µs)
const INITIAL_RTT_US: u64 = 1_000;

/// Liveness of a path. A destroyed path is one removed from its owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PathState {
    Active,
    Stale,
}

/// Throughput and RTT report for one path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PathReport {
    /// Content throughput since the previous report (bit/s)
    pub rate_bps: f64,
    /// Wire throughput since the previous report (bit/s)
    pub raw_rate_bps: f64,
    pub packets_received: u64,
    pub rtt_us: u64,
    pub rtt_min_us: u64,
    pub rtt_max_us: u64,
    pub average_rtt_us: f64,
    pub propagation_delay_us: Option<u64>,
    pub drop_probability: f64,
    pub timer_us: f64,
    pub last_bitrate_bps: u64,
    pub last_segment: u64,
    pub buffer_fill: u64,
}

/// Per-path RTT and loss state driving the RAAQM window.
///
/// RTT samples live in a fixed-size window kept twice: in arrival order
/// for eviction and as a value multiset for O(log n) min/max. All times
/// are microseconds supplied by the caller.
#[derive(Debug, Clone)]
pub struct RaaqmDataPath {
    drop_factor: f64,
    minimum_drop_probability: f64,
    timer: f64,
    samples: usize,

    rtt: u64,
    rtt_min: u64,
    rtt_max: u64,
    average_rtt: f64,
    propagation_delay: u64,
    new_propagation_delay: bool,
    drop_probability: f64,

    window: VecDeque<u64>,
    sorted: BTreeMap<u64, usize>,

    packets_received: u64,
    bytes_received: u64,
    raw_bytes_received: u64,
    last_bytes_received: u64,
    last_raw_bytes_received: u64,
    last_report_time: u64,
    last_received_packet: u64,

    last_bitrate: u64,
    last_segment: u64,
    buffer_fill: u64,
}

impl RaaqmDataPath {
    pub fn new(
        drop_factor: f64,
        minimum_drop_probability: f64,
        interest_lifetime_ms: u64,
        samples: usize,
        now: u64,
    ) -> Self {
        let samples = samples.max(1);
        Self {
            drop_factor,
            minimum_drop_probability,
            timer: (interest_lifetime_ms * 1_000) as f64,
            samples,
            rtt: INITIAL_RTT_US,
            rtt_min: INITIAL_RTT_US,
            rtt_max: INITIAL_RTT_US,
            average_rtt: 0.0,
            propagation_delay: u64::MAX,
            new_propagation_delay: false,
            drop_probability: 0.0,
            window: VecDeque::with_capacity(samples + 1),
            sorted: BTreeMap::new(),
            packets_received: 0,
            bytes_received: 0,
            raw_bytes_received: 0,
            last_bytes_received: 0,
            last_raw_bytes_received: 0,
            last_report_time: now,
            last_received_packet: now,
            last_bitrate: 0,
            last_segment: 0,
            buffer_fill: 0,
        }
    }

    /// Record one RTT sample taken at `now`
    pub fn insert_new_rtt(&mut self, sample: u64, now: u64) {
        self.rtt = sample;
        self.window.push_back(sample);
        *self.sorted.entry(sample).or_insert(0) += 1;

        if self.window.len() > self.samples {
            if let Some(oldest) = self.window.pop_front() {
                if let Some(count) = self.sorted.get_mut(&oldest) {
                    *count -= 1;
                    if *count == 0 {
                        self.sorted.remove(&oldest);
                    }
                }
            }
        }

        if let (Some((&min, _)), Some((&max, _))) =
            (self.sorted.first_key_value(), self.sorted.last_key_value())
        {
            self.rtt_min = min;
            self.rtt_max = max;
        }

        if self.rtt_min < self.propagation_delay {
            self.propagation_delay = self.rtt_min;
            self.new_propagation_delay = true;
        }

        self.average_rtt = if self.average_rtt == 0.0 {
            sample as f64
        } else {
            AVERAGE_RTT_ALPHA * self.average_rtt + (1.0 - AVERAGE_RTT_ALPHA) * sample as f64
        };
        self.last_received_packet = now;
    }

    /// One-shot: true once after each propagation delay decrease
    pub fn new_propagation_delay_available(&mut self) -> bool {
        std::mem::take(&mut self.new_propagation_delay)
    }

    /// Recompute the drop probability from the RTT position in the window
    pub fn update_drop_prob(&mut self) {
        self.drop_probability = 0.0;
        if self.window.len() < self.samples {
            return;
        }

        self.drop_probability = if self.rtt_max == self.rtt_min {
            self.minimum_drop_probability
        } else {
            self.minimum_drop_probability
                + self.drop_factor * (self.rtt.saturating_sub(self.rtt_min)) as f64
                    / (self.rtt_max - self.rtt_min) as f64
        };
    }

    /// Exponentially smooth the retransmission timer towards
    /// `TIMEOUT_RATIO` times the current RTT
    pub fn smooth_timer(&mut self) {
        self.timer = (1.0 - TIMEOUT_SMOOTHER) * self.timer
            + TIMEOUT_SMOOTHER * self.rtt as f64 * TIMEOUT_RATIO;
    }

    pub fn update_received_stats(&mut self, packet_size: usize, data_size: usize) {
        self.packets_received += 1;
        self.raw_bytes_received += packet_size as u64;
        self.bytes_received += data_size as u64;
    }

    pub fn is_stale(&self, now: u64) -> bool {
        now.saturating_sub(self.last_received_packet) > STALE_PATH_THRESHOLD_US
    }

    pub fn state(&self, now: u64) -> PathState {
        if self.is_stale(now) {
            PathState::Stale
        } else {
            PathState::Active
        }
    }

    /// Throughput since the last report. Logs the path statistics and
    /// starts a new measurement interval.
    pub fn path_reporter(&mut self, now: u64) -> PathReport {
        let elapsed_us = now.saturating_sub(self.last_report_time);
        let rate = |bytes: u64| {
            if elapsed_us == 0 {
                0.0
            } else {
                bytes as f64 * 8.0 * 1_000_000.0 / elapsed_us as f64
            }
        };

        let report = PathReport {
            rate_bps: rate(self.bytes_received - self.last_bytes_received),
            raw_rate_bps: rate(self.raw_bytes_received - self.last_raw_bytes_received),
            packets_received: self.packets_received,
            rtt_us: self.rtt,
            rtt_min_us: self.rtt_min,
            rtt_max_us: self.rtt_max,
            average_rtt_us: self.average_rtt,
            propagation_delay_us: self.propagation_delay(),
            drop_probability: self.drop_probability,
            timer_us: self.timer,
            last_bitrate_bps: self.last_bitrate,
            last_segment: self.last_segment,
            buffer_fill: self.buffer_fill,
        };

        info!(
            target: "raaqm",
            "path rate {:.0} bps (raw {:.0}), rtt {} us [{}..{}], avg {:.0} us, drop {:.5}, timer {:.0} us",
            report.rate_bps,
            report.raw_rate_bps,
            report.rtt_us,
            report.rtt_min_us,
            report.rtt_max_us,
            report.average_rtt_us,
            report.drop_probability,
            report.timer_us
        );

        self.last_bytes_received = self.bytes_received;
        self.last_raw_bytes_received = self.raw_bytes_received;
        self.last_report_time = now;
        report
    }

    /// Latest bitrate chosen by an adaptive player for `segment`
    pub fn bitrate_update(&mut self, bitrate_bps: u64, segment: u64) {
        self.last_bitrate = bitrate_bps;
        self.last_segment = segment;
    }

    /// Latest playout buffer fill reported by an adaptive player
    pub fn buffer_update(&mut self, buffer_fill: u64) {
        self.buffer_fill = buffer_fill;
    }

    pub fn drop_prob(&self) -> f64 {
        self.drop_probability
    }

    pub fn set_drop_prob(&mut self, drop_probability: f64) {
        self.drop_probability = drop_probability;
    }

    pub fn set_drop_factor(&mut self, drop_factor: f64) {
        self.drop_factor = drop_factor;
    }

    pub fn drop_factor(&self) -> f64 {
        self.drop_factor
    }

    pub fn rtt(&self) -> u64 {
        self.rtt
    }

    pub fn rtt_min(&self) -> u64 {
        self.rtt_min
    }

    pub fn rtt_max(&self) -> u64 {
        self.rtt_max
    }

    pub fn average_rtt(&self) -> f64 {
        self.average_rtt
    }

    /// Retransmission timer (µs)
    pub fn timer(&self) -> f64 {
        self.timer
    }

    /// Smallest RTT ever observed, if any
    pub fn propagation_delay(&self) -> Option<u64> {
        (self.propagation_delay != u64::MAX).then_some(self.propagation_delay)
    }

    pub fn sample_count(&self) -> usize {
        self.window.len()
    }

    pub fn packets_received(&self) -> u64 {
        self.packets_received
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(samples: usize) -> RaaqmDataPath {
        RaaqmDataPath::new(0.2, 0.00001, 1_000, samples, 0)
    }

    #[test]
    fn test_initial_state() {
        let path = path(30);
        assert_eq!(path.rtt(), 1_000);
        assert_eq!(path.timer(), 1_000_000.0);
        assert_eq!(path.propagation_delay(), None);
        assert_eq!(path.drop_prob(), 0.0);
    }

    #[test]
    fn test_drop_prob_zero_until_window_full() {
        let mut path = path(4);
        for rtt in [100, 200, 300] {
            path.insert_new_rtt(rtt, 0);
        }
        path.update_drop_prob();
        assert_eq!(path.drop_prob(), 0.0);
    }

    #[test]
    fn test_identical_samples_give_minimum_drop_prob() {
        let mut path = path(5);
        for _ in 0..5 {
            path.insert_new_rtt(700, 0);
        }
        path.update_drop_prob();
        assert_eq!(path.drop_prob(), 0.00001);
        assert!(path.drop_prob().is_finite());
    }

    #[test]
    fn test_drop_prob_scales_with_rtt_position() {
        let mut path = path(3);
        path.insert_new_rtt(100, 0);
        path.insert_new_rtt(300, 0);
        path.insert_new_rtt(200, 0);
        path.update_drop_prob();
        let expected = 0.00001 + 0.2 * 100.0 / 200.0;
        assert!((path.drop_prob() - expected).abs() < 1e-12);
    }

    #[test]
    fn test_window_slides_min_and_max() {
        let mut path = path(3);
        for rtt in [50, 400, 200, 300] {
            path.insert_new_rtt(rtt, 0);
        }
        assert_eq!(path.sample_count(), 3);
        assert_eq!(path.rtt_min(), 200);
        assert_eq!(path.rtt_max(), 400);
        assert_eq!(path.propagation_delay(), Some(50));
    }

    #[test]
    fn test_propagation_delay_flag_is_one_shot() {
        let mut path = path(10);
        for rtt in [500, 400, 300] {
            path.insert_new_rtt(rtt, 0);
            assert_eq!(path.propagation_delay(), Some(rtt));
            assert!(path.new_propagation_delay_available());
            assert!(!path.new_propagation_delay_available());
        }

        path.insert_new_rtt(900, 0);
        assert!(!path.new_propagation_delay_available());
        assert_eq!(path.propagation_delay(), Some(300));
    }

    #[test]
    fn test_smooth_timer() {
        let mut path = path(10);
        path.insert_new_rtt(2_000, 0);
        path.smooth_timer();
        assert_eq!(path.timer(), 0.9 * 1_000_000.0 + 0.1 * 2_000.0 * 10.0);
    }

    #[test]
    fn test_staleness() {
        let mut path = path(10);
        path.insert_new_rtt(100, 1_000_000);
        assert_eq!(path.state(3_000_000), PathState::Active);
        assert!(!path.is_stale(3_000_000));
        assert_eq!(path.state(3_000_001), PathState::Stale);
    }

    #[test]
    fn test_path_reporter_rate() {
        let mut path = path(10);
        path.update_received_stats(1_100, 1_000);
        path.update_received_stats(1_100, 1_000);
        path.bitrate_update(3_000_000, 12);
        path.buffer_update(40);

        let report = path.path_reporter(1_000_000);
        assert_eq!(report.rate_bps, 16_000.0);
        assert_eq!(report.raw_rate_bps, 17_600.0);
        assert_eq!(report.packets_received, 2);
        assert_eq!(report.last_segment, 12);
        assert_eq!(report.buffer_fill, 40);

        let idle = path.path_reporter(2_000_000);
        assert_eq!(idle.rate_bps, 0.0);
    }

    #[test]
    fn test_average_rtt() {
        let mut path = path(10);
        path.insert_new_rtt(1_000, 0);
        assert_eq!(path.average_rtt(), 1_000.0);
        path.insert_new_rtt(2_000, 0);
        assert!((path.average_rtt() - 1_010.0).abs() < 1e-9);
    }
}
