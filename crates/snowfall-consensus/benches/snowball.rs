//! Snowball hot-path benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use snowfall_consensus::{Bag, Parameters, Snowball};
use snowfall_ids::Id;

fn bench_record_poll(c: &mut Criterion) {
    let mut group = c.benchmark_group("snowball_record_poll");

    for num_choices in [2usize, 8, 32] {
        group.bench_with_input(
            BenchmarkId::from_parameter(num_choices),
            &num_choices,
            |b, &num_choices| {
                let params = Parameters::default();
                let winner = Id::from_bytes([0u8; 32]);

                // Votes split across the losers, quorum on the winner.
                let mut votes = Bag::new();
                votes.add_count(winner, params.alpha);
                for i in 1..num_choices {
                    votes.add_count(Id::from_bytes([i as u8; 32]), 1);
                }

                b.iter(|| {
                    let mut sb = Snowball::new(params, winner).unwrap();
                    for _ in 0..params.beta_virtuous {
                        sb.record_poll(black_box(&votes));
                    }
                    black_box(sb.finalized())
                });
            },
        );
    }
    group.finish();
}

fn bench_mode(c: &mut Criterion) {
    c.bench_function("bag_mode_1k", |b| {
        let mut votes = Bag::new();
        for i in 0..1000u32 {
            let mut bytes = [0u8; 32];
            bytes[..4].copy_from_slice(&i.to_be_bytes());
            votes.add_count(Id::from_bytes(bytes), (i % 7 + 1) as usize);
        }
        b.iter(|| black_box(votes.mode()));
    });
}

criterion_group!(benches, bench_record_poll, bench_mode);
criterion_main!(benches);
