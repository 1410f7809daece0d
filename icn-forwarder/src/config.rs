use serde::{Deserialize, Serialize};

use icn_common::{
    DEFAULT_CONTENT_STORE_CAPACITY, DEFAULT_INTEREST_LIFETIME_MS, MAX_INTEREST_LIFETIME_MS,
};

use crate::fib::EmptyRoutePolicy;
use crate::strategy::StrategyKind;

/// Message processor configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwarderConfig {
    /// Maximum number of cached content objects, 0 disables caching
    pub content_store_capacity: usize,
    /// Store content objects that satisfied a PIT entry
    pub cache_store: bool,
    /// Answer Interests from the content store
    pub cache_serve: bool,
    /// Lifetime of an Interest that carries none
    pub default_interest_lifetime_ms: u64,
    /// Upper bound applied to every Interest lifetime
    pub max_interest_lifetime_ms: u64,
    /// Strategy of FIB entries created without an explicit one
    pub default_strategy: StrategyKind,
    pub empty_route_policy: EmptyRoutePolicy,
    /// Period of the PIT expiry sweep, 0 leaves expiry purely lazy
    pub pit_sweep_interval_ms: u64,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            content_store_capacity: DEFAULT_CONTENT_STORE_CAPACITY,
            cache_store: true,
            cache_serve: true,
            default_interest_lifetime_ms: DEFAULT_INTEREST_LIFETIME_MS,
            max_interest_lifetime_ms: MAX_INTEREST_LIFETIME_MS,
            default_strategy: StrategyKind::Random,
            empty_route_policy: EmptyRoutePolicy::Keep,
            pit_sweep_interval_ms: 1_000,
        }
    }
}
