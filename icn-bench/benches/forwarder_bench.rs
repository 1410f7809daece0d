use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{rngs::StdRng, SeedableRng};

use icn_bench::workload::generate_names;
use icn_bench::{Workload, WorkloadConfig};
use icn_core::Message;
use icn_forwarder::{ContentStore, LruContentStore, PendingInterestTable};

fn benchmark_content_store(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let names = generate_names(8_192, 4, &mut rng);
    let objects: Vec<Arc<Message>> = names
        .iter()
        .map(|name| Arc::new(Message::content_object(name.clone(), vec![0u8; 256])))
        .collect();
    let interests: Vec<Message> = names.iter().cloned().map(Message::interest).collect();

    c.bench_function("content_store_put_with_eviction", |b| {
        let mut store = LruContentStore::new(1_024);
        let mut i = 0;
        b.iter(|| {
            store.put_content(Arc::clone(&objects[i % objects.len()]), 0);
            i += 1;
        })
    });

    c.bench_function("content_store_match_hit", |b| {
        let mut store = LruContentStore::new(objects.len());
        for object in &objects {
            store.put_content(Arc::clone(object), 0);
        }
        let mut i = 0;
        b.iter(|| {
            black_box(store.match_interest(&interests[i % interests.len()], 0));
            i += 1;
        })
    });
}

fn benchmark_pit(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(11);
    let names = generate_names(4_096, 4, &mut rng);
    let interests: Vec<Arc<Message>> = names
        .iter()
        .map(|name| Arc::new(Message::interest(name.clone()).received_on(1, 0)))
        .collect();
    let objects: Vec<Message> = names
        .iter()
        .map(|name| Message::content_object(name.clone(), Vec::new()))
        .collect();

    c.bench_function("pit_insert_and_satisfy", |b| {
        let mut pit = PendingInterestTable::new(4_000, 60_000);
        let mut i = 0;
        b.iter(|| {
            let idx = i % interests.len();
            pit.receive_interest(&interests[idx], 0);
            black_box(pit.satisfy_interest(&objects[idx]));
            i += 1;
        })
    });

    c.bench_function("pit_aggregate", |b| {
        let mut pit = PendingInterestTable::new(4_000, 60_000);
        for interest in &interests {
            pit.receive_interest(interest, 0);
        }
        let mut i = 0;
        b.iter(|| {
            black_box(pit.receive_interest(&interests[i % interests.len()], 0));
            i += 1;
        })
    });
}

fn benchmark_processor(c: &mut Criterion) {
    let mut group = c.benchmark_group("processor_interest_object_cycle");
    for capacity in [0usize, 1_024, 16_384] {
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &capacity| {
            let mut workload = Workload::new(&WorkloadConfig {
                distinct_names: 8_192,
                content_store_capacity: capacity,
                ..Default::default()
            });
            b.iter(|| black_box(workload.step()))
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_content_store, benchmark_pit, benchmark_processor);
criterion_main!(benches);
