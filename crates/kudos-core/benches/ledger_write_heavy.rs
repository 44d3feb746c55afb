//! Criterion benchmark: write-heavy ledger traffic (holds/decisions/sweep).
//! Run with: cargo bench -p kudos-core --bench ledger_write_heavy

use chrono::{Duration as ChronoDuration, Utc};
use criterion::{black_box, criterion_group, criterion_main, Bencher, Criterion};
use kudos_core::{LedgerConfig, Store, SubmitParams};
use std::time::Duration;
use tempfile::NamedTempFile;

const MEMBERS: usize = 20;

fn make_store(grace_minutes: i64) -> (Store, NamedTempFile) {
    let f = NamedTempFile::new().unwrap();
    let config = LedgerConfig {
        grace_period_minutes: grace_minutes,
        distribution_amount: 1_000,
        ..LedgerConfig::default()
    };
    let store = Store::open(f.path(), config).unwrap();
    store.create_org("bench", "Bench Org").unwrap();
    for i in 0..MEMBERS {
        store
            .add_member("bench", &format!("m{}", i), &format!("Member {}", i), i == 0)
            .unwrap();
    }
    store.issue("bench", 1_000_000).unwrap();
    let now = Utc::now();
    store
        .open_period("bench", "bench-period", now, now + ChronoDuration::days(31))
        .unwrap();
    (store, f)
}

fn submit_ring(store: &Store, count: usize) -> Vec<String> {
    (0..count)
        .map(|i| {
            let sender = format!("m{}", i % MEMBERS);
            let recipient = format!("m{}", (i + 1) % MEMBERS);
            store
                .submit_transfer(SubmitParams {
                    org_id: "bench",
                    sender_id: &sender,
                    recipient_id: &recipient,
                    amount: 3,
                    reason: None,
                    client_ref: None,
                })
                .unwrap()
                .transfer_id
        })
        .collect()
}

fn bench_ledger_write_heavy(c: &mut Criterion) {
    let mut group = c.benchmark_group("ledger_write_heavy");
    if std::env::var("QUICK").is_ok() {
        group
            .sample_size(10)
            .measurement_time(Duration::from_secs(2));
    } else {
        group.sample_size(20);
    }

    // Many holds per period (insert/txn stress)
    group.bench_function("submit_100_transfers", |b: &mut Bencher<'_>| {
        b.iter(|| {
            let (store, _f) = make_store(1_440);
            let ids = submit_ring(&store, 100);
            black_box(ids.len());
        });
    });

    group.bench_function("submit_50_then_approve_realize", |b: &mut Bencher<'_>| {
        b.iter(|| {
            let (store, _f) = make_store(1_440);
            let ids = submit_ring(&store, 50);
            for id in &ids {
                store.approve_transfer("bench", id, "m0").unwrap();
                store.realize_transfer("bench", id).unwrap();
            }
            black_box(ids.len());
        });
    });

    // One sweep settling a whole backlog in a single transaction
    group.bench_function("sweep_100_due_transfers", |b: &mut Bencher<'_>| {
        b.iter(|| {
            let (store, _f) = make_store(0);
            submit_ring(&store, 100);
            let outcome = store.sweep_due(Utc::now()).unwrap();
            assert_eq!(outcome.realized, 100);
            black_box(outcome.realized);
        });
    });

    group.finish();
}

criterion_group!(benches, bench_ledger_write_heavy);
criterion_main!(benches);
