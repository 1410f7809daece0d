use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::debug;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use icn_common::{Clock, ConnectionId, ManualClock, MICROS_PER_TICK};
use icn_core::{Message, Name, NameComponent};
use icn_forwarder::{ConnectionTable, ForwarderConfig, ForwarderMetrics, MessageProcessor, Route};

use crate::reporter::BenchmarkResult;

/// Application connection issuing Interests
pub const CONSUMER: ConnectionId = 1;
/// Upstream connection answering them
pub const PRODUCER: ConnectionId = 2;

/// Connection table that accepts and discards everything
#[derive(Debug, Default)]
pub struct NullConnections {
    sends: AtomicU64,
}

impl NullConnections {
    pub fn sends(&self) -> u64 {
        self.sends.load(Ordering::Relaxed)
    }
}

impl ConnectionTable for NullConnections {
    fn send(&self, _connection: ConnectionId, _message: &Arc<Message>) -> bool {
        self.sends.fetch_add(1, Ordering::Relaxed);
        true
    }

    fn is_up(&self, connection: ConnectionId) -> bool {
        connection == CONSUMER || connection == PRODUCER
    }

    fn is_local(&self, connection: ConnectionId) -> bool {
        connection == CONSUMER
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadConfig {
    /// Distinct content names requested
    pub distinct_names: usize,
    /// Components per name, including the routed prefix
    pub name_depth: usize,
    pub content_store_capacity: usize,
    pub payload_size: usize,
    pub seed: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            distinct_names: 10_000,
            name_depth: 4,
            content_store_capacity: 4_096,
            payload_size: 1_024,
            seed: 42,
        }
    }
}

/// Build `count` distinct names of `depth` components under `/bench`
pub fn generate_names(count: usize, depth: usize, rng: &mut impl Rng) -> Vec<Name> {
    (0..count)
        .map(|i| {
            let mut components = vec![NameComponent::from("bench")];
            for _ in 2..depth.max(2) {
                components.push(NameComponent::new(format!("{:04x}", rng.gen::<u16>()).into_bytes()));
            }
            components.push(NameComponent::new(format!("seg{}", i).into_bytes()));
            components.truncate(icn_common::MAX_NAME_COMPONENTS);
            Name::from_components(components).unwrap_or_else(|_| Name::root())
        })
        .collect()
}

/// One consumer and one producer around a message processor. Every
/// Interest the store cannot answer is satisfied by the producer.
pub struct Workload {
    processor: MessageProcessor,
    clock: Arc<ManualClock>,
    connections: Arc<NullConnections>,
    names: Vec<Name>,
    payload: Vec<u8>,
    rng: StdRng,
}

impl Workload {
    pub fn new(config: &WorkloadConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(config.seed);
        let clock = Arc::new(ManualClock::new(0));
        let connections = Arc::new(NullConnections::default());
        let forwarder = ForwarderConfig {
            content_store_capacity: config.content_store_capacity,
            ..Default::default()
        };

        let mut processor = MessageProcessor::new(
            forwarder,
            connections.clone(),
            clock.clone(),
            Arc::new(ForwarderMetrics::default()),
        );
        processor.add_or_update_route(&Route::new(
            Name::from_components(vec![NameComponent::from("bench")]).unwrap_or_else(|_| Name::root()),
            PRODUCER,
        ));

        let names = generate_names(config.distinct_names.max(1), config.name_depth, &mut rng);
        Self {
            processor,
            clock,
            connections,
            names,
            payload: vec![0xab; config.payload_size],
            rng,
        }
    }

    /// Request one uniformly chosen name. Returns true on a cache hit.
    pub fn step(&mut self) -> bool {
        self.clock.advance_micros(MICROS_PER_TICK);
        let now = self.clock.ticks();
        let name = self.names[self.rng.gen_range(0..self.names.len())].clone();

        let metrics = Arc::clone(self.processor.metrics());
        let hits_before = metrics.interests_satisfied_from_store.value();
        self.processor
            .receive(Message::interest(name.clone()).received_on(CONSUMER, now));
        if metrics.interests_satisfied_from_store.value() > hits_before {
            return true;
        }

        let object = Message::content_object(name, self.payload.clone()).received_on(PRODUCER, now);
        self.processor.receive(object);
        false
    }

    pub fn run(&mut self, name: &str, operations: u64) -> BenchmarkResult {
        let mut latencies = Vec::with_capacity(operations as usize);
        let mut hits = 0u64;
        let start = Instant::now();

        for _ in 0..operations {
            let op_start = Instant::now();
            if self.step() {
                hits += 1;
            }
            latencies.push(op_start.elapsed());
        }

        let duration = start.elapsed();
        debug!("{}: {} operations in {:?}", name, operations, duration);
        BenchmarkResult::from_latencies(name, duration, latencies, hits)
    }

    pub fn processor(&self) -> &MessageProcessor {
        &self.processor
    }

    pub fn connections(&self) -> &NullConnections {
        &self.connections
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_names() {
        let mut rng = StdRng::seed_from_u64(1);
        let names = generate_names(3, 4, &mut rng);
        assert_eq!(names.len(), 3);
        assert!(names.iter().all(|n| n.len() == 4));
        assert_eq!(names[0].get(0).map(|c| c.value()), Some(&b"bench"[..]));
        assert_ne!(names[0], names[1]);
    }

    #[test]
    fn test_small_working_set_hits_cache() {
        let config = WorkloadConfig {
            distinct_names: 4,
            content_store_capacity: 16,
            ..Default::default()
        };
        let mut workload = Workload::new(&config);
        let result = workload.run("small", 200);

        assert_eq!(result.operations, 200);
        assert!(result.cache_hit_rate > 90.0);
        assert_eq!(workload.processor().pit().len(), 0);
        assert!(workload.connections().sends() >= 200);
    }

    #[test]
    fn test_no_cache_means_no_hits() {
        let config = WorkloadConfig {
            distinct_names: 4,
            content_store_capacity: 0,
            ..Default::default()
        };
        let mut workload = Workload::new(&config);
        let result = workload.run("uncached", 50);
        assert_eq!(result.cache_hit_rate, 0.0);

        let metrics = workload.processor().metrics().snapshot();
        assert_eq!(metrics.interests_forwarded, 50);
        assert_eq!(metrics.objects_forwarded, 50);
    }
}
