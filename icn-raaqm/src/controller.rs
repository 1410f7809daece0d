use std::collections::HashMap;

use log::{debug, info};
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::config::RaaqmConfig;
use crate::data_path::{PathReport, RaaqmDataPath};

/// Label of the path that exists from the start and is never pruned
pub const DEFAULT_PATH_LABEL: u8 = 0;

/// Access network class inferred from the propagation delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessNetwork {
    Wired,
    Wifi,
    Lte,
}

/// Consumer-side RAAQM window controller.
///
/// Owns one [`RaaqmDataPath`] per path label and the download window they
/// drive. Belongs to a single consumer session and is not synchronized.
#[derive(Debug)]
pub struct RaaqmController {
    config: RaaqmConfig,
    paths: HashMap<u8, RaaqmDataPath>,
    window: f64,
    beta: f64,
    drop_factor: f64,
    rng: StdRng,
}

impl RaaqmController {
    pub fn new(config: RaaqmConfig, now: u64) -> Self {
        Self::with_rng(config, StdRng::from_entropy(), now)
    }

    /// Controller with a deterministic drop decision
    pub fn with_seed(config: RaaqmConfig, seed: u64, now: u64) -> Self {
        Self::with_rng(config, StdRng::seed_from_u64(seed), now)
    }

    fn with_rng(config: RaaqmConfig, rng: StdRng, now: u64) -> Self {
        let window = config
            .initial_window
            .max(config.min_window)
            .min(config.max_window);
        let mut controller = Self {
            beta: config.beta,
            drop_factor: config.drop_factor,
            paths: HashMap::new(),
            window,
            rng,
            config,
        };
        controller.add_path(DEFAULT_PATH_LABEL, now);
        controller
    }

    fn add_path(&mut self, label: u8, now: u64) -> &mut RaaqmDataPath {
        let path = RaaqmDataPath::new(
            self.drop_factor,
            self.config.minimum_drop_probability,
            self.config.interest_lifetime_ms,
            self.config.sample_number,
            now,
        );
        debug!("New RAAQM path {}", label);
        self.paths.entry(label).or_insert(path)
    }

    /// Feed one received content object through the controller
    pub fn on_content_object(
        &mut self,
        label: u8,
        packet_size: usize,
        data_size: usize,
        rtt_us: u64,
        now: u64,
    ) {
        // Step 1: Path statistics
        if !self.paths.contains_key(&label) {
            self.add_path(label, now);
        }
        let new_delay = {
            let Some(path) = self.paths.get_mut(&label) else {
                return;
            };
            path.update_received_stats(packet_size, data_size);
            path.insert_new_rtt(rtt_us, now);
            path.smooth_timer();
            path.new_propagation_delay_available()
        };

        // Step 2: Additive increase
        self.increase_window();

        // Step 3: Autotune on propagation delay changes
        if self.config.autotune && new_delay {
            self.check_drop_probability(now);
        }

        // Step 4: Probabilistic decrease
        let drop_prob = match self.paths.get_mut(&label) {
            Some(path) => {
                path.update_drop_prob();
                path.drop_prob()
            }
            None => return,
        };
        if self.rng.gen::<f64>() < drop_prob {
            debug!("RAAQM drop on path {} (p = {:.5})", label, drop_prob);
            self.decrease_window();
        }
    }

    /// An Interest timed out. Returns the labels of pruned stale paths.
    pub fn on_timeout(&mut self, now: u64) -> Vec<u8> {
        self.decrease_window();
        self.check_for_stale_paths(now)
    }

    pub fn increase_window(&mut self) {
        self.window = (self.window + self.config.gamma / self.window).min(self.config.max_window);
    }

    pub fn decrease_window(&mut self) {
        self.window = (self.window * self.beta).max(self.config.min_window);
    }

    /// Remove every stale path except the default one
    pub fn check_for_stale_paths(&mut self, now: u64) -> Vec<u8> {
        let mut stale: Vec<u8> = self
            .paths
            .iter()
            .filter(|(&label, path)| label != DEFAULT_PATH_LABEL && path.is_stale(now))
            .map(|(&label, _)| label)
            .collect();
        stale.sort_unstable();

        for label in &stale {
            self.paths.remove(label);
            info!("Removed stale RAAQM path {}", label);
        }
        stale
    }

    /// Pick beta and the drop factor for the slowest live path
    pub fn check_drop_probability(&mut self, now: u64) -> Option<AccessNetwork> {
        let max_delay = self
            .paths
            .values()
            .filter(|path| !path.is_stale(now))
            .filter_map(|path| path.propagation_delay())
            .max()?;

        let (network, beta, drop_factor) = if max_delay < self.config.wifi_delay_us {
            (AccessNetwork::Wired, self.config.beta, self.config.drop_factor)
        } else if max_delay < self.config.lte_delay_us {
            (
                AccessNetwork::Wifi,
                self.config.beta_wifi,
                self.config.drop_factor_wifi,
            )
        } else {
            (
                AccessNetwork::Lte,
                self.config.beta_lte,
                self.config.drop_factor_lte,
            )
        };

        if beta != self.beta || drop_factor != self.drop_factor {
            debug!(
                "RAAQM autotune: {:?} (delay {} us), beta {}, drop factor {}",
                network, max_delay, beta, drop_factor
            );
        }
        self.beta = beta;
        self.drop_factor = drop_factor;
        for path in self.paths.values_mut() {
            path.set_drop_factor(drop_factor);
        }
        Some(network)
    }

    /// Rate report for every path, ordered by label
    pub fn report(&mut self, now: u64) -> Vec<(u8, PathReport)> {
        let mut labels: Vec<u8> = self.paths.keys().copied().collect();
        labels.sort_unstable();
        labels
            .into_iter()
            .filter_map(|label| {
                self.paths
                    .get_mut(&label)
                    .map(|path| (label, path.path_reporter(now)))
            })
            .collect()
    }

    /// Retransmission timer of a path, falling back to the configured lifetime
    pub fn interest_timeout_us(&self, label: u8) -> f64 {
        self.paths
            .get(&label)
            .map(|path| path.timer())
            .unwrap_or((self.config.interest_lifetime_ms * 1_000) as f64)
    }

    pub fn window(&self) -> f64 {
        self.window
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn drop_factor(&self) -> f64 {
        self.drop_factor
    }

    pub fn path(&self, label: u8) -> Option<&RaaqmDataPath> {
        self.paths.get(&label)
    }

    pub fn path_mut(&mut self, label: u8) -> Option<&mut RaaqmDataPath> {
        self.paths.get_mut(&label)
    }

    pub fn path_count(&self) -> usize {
        self.paths.len()
    }

    pub fn config(&self) -> &RaaqmConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> RaaqmConfig {
        RaaqmConfig {
            sample_number: 5,
            max_window: 8.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_window_bounds() {
        let mut controller = RaaqmController::with_seed(config(), 1, 0);
        assert_eq!(controller.window(), 1.0);

        for _ in 0..1_000 {
            controller.increase_window();
        }
        assert_eq!(controller.window(), 8.0);

        for _ in 0..100 {
            controller.decrease_window();
        }
        assert_eq!(controller.window(), 1.0);
    }

    #[test]
    fn test_increase_is_gamma_over_window() {
        let mut controller = RaaqmController::with_seed(config(), 1, 0);
        controller.increase_window();
        assert_eq!(controller.window(), 2.0);
        controller.increase_window();
        assert_eq!(controller.window(), 2.5);
    }

    #[test]
    fn test_window_grows_before_sample_window_fills() {
        let mut controller = RaaqmController::with_seed(config(), 7, 0);
        for i in 0..4 {
            controller.on_content_object(0, 1_100, 1_000, 500 + i * 100, i * 1_000);
        }
        // No drop probability yet, so every object increases the window
        assert!(controller.window() > 2.5);
        assert_eq!(controller.path(0).map(|p| p.drop_prob()), Some(0.0));
    }

    #[test]
    fn test_new_path_created_on_demand() {
        let mut controller = RaaqmController::with_seed(config(), 3, 0);
        controller.on_content_object(4, 100, 80, 2_000, 10);
        assert_eq!(controller.path_count(), 2);
        assert_eq!(controller.path(4).map(|p| p.rtt()), Some(2_000));
    }

    #[test]
    fn test_timeout_prunes_stale_paths_but_keeps_default() {
        let mut controller = RaaqmController::with_seed(config(), 3, 0);
        controller.on_content_object(1, 100, 80, 500, 0);
        controller.on_content_object(2, 100, 80, 500, 2_500_000);

        let removed = controller.on_timeout(3_000_000);
        assert_eq!(removed, vec![1]);
        assert!(controller.path(0).is_some());
        assert!(controller.path(2).is_some());
        assert_eq!(controller.path_count(), 2);
    }

    #[test]
    fn test_autotune_selects_network_class() {
        let config = RaaqmConfig {
            autotune: true,
            ..config()
        };
        let mut controller = RaaqmController::with_seed(config, 11, 0);

        controller.on_content_object(0, 100, 80, 500, 0);
        assert_eq!(controller.beta(), 0.8);
        assert_eq!(controller.drop_factor(), 0.2);

        controller.on_content_object(1, 100, 80, 5_000, 10);
        assert_eq!(controller.beta(), 0.9);
        assert_eq!(controller.drop_factor(), 0.6);
        assert_eq!(controller.path(0).map(|p| p.drop_factor()), Some(0.6));

        controller.on_content_object(2, 100, 80, 20_000, 20);
        assert_eq!(controller.drop_factor(), 0.1);
        assert_eq!(
            controller.check_drop_probability(30),
            Some(AccessNetwork::Lte)
        );
    }

    #[test]
    fn test_report_covers_every_path() {
        let mut controller = RaaqmController::with_seed(config(), 5, 0);
        controller.on_content_object(0, 1_100, 1_000, 400, 0);
        controller.on_content_object(3, 1_100, 1_000, 400, 0);

        let reports = controller.report(1_000_000);
        let labels: Vec<u8> = reports.iter().map(|(label, _)| *label).collect();
        assert_eq!(labels, vec![0, 3]);
        assert_eq!(reports[0].1.rate_bps, 8_000.0);
    }

    #[test]
    fn test_interest_timeout_tracks_timer() {
        let controller = RaaqmController::with_seed(config(), 5, 0);
        assert_eq!(controller.interest_timeout_us(0), 1_000_000.0);
        assert_eq!(controller.interest_timeout_us(9), 1_000_000.0);
    }
}
