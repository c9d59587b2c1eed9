use chrono::Duration;
use common::SessionId;
use criterion::{Criterion, criterion_group, criterion_main};
use domain::SkuId;
use inventory::{InMemoryStockLedger, ReservationLine, StockLedger};

fn stocked_ledger(rt: &tokio::runtime::Runtime, skus: usize) -> InMemoryStockLedger {
    let ledger = InMemoryStockLedger::new();
    rt.block_on(async {
        for i in 0..skus {
            ledger
                .receive(&SkuId::new(format!("SKU-{i:03}")), u64::MAX / 4)
                .await
                .unwrap();
        }
    });
    ledger
}

fn bench_reserve_release_single(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ledger = stocked_ledger(&rt, 1);
    let lines = vec![ReservationLine::new("SKU-000", 1)];

    c.bench_function("ledger/reserve_release_1_sku", |b| {
        b.iter(|| {
            rt.block_on(async {
                let reservation = ledger
                    .reserve(SessionId::new(), &lines, Duration::minutes(15))
                    .await
                    .unwrap();
                ledger.release(reservation.id).await.unwrap();
            });
        });
    });
}

fn bench_reserve_commit_ten(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ledger = stocked_ledger(&rt, 10);
    let lines: Vec<ReservationLine> = (0..10)
        .rev()
        .map(|i| ReservationLine::new(format!("SKU-{i:03}"), 2))
        .collect();

    c.bench_function("ledger/reserve_commit_10_skus", |b| {
        b.iter(|| {
            rt.block_on(async {
                let reservation = ledger
                    .reserve(SessionId::new(), &lines, Duration::minutes(15))
                    .await
                    .unwrap();
                ledger.commit(reservation.id).await.unwrap();
            });
        });
    });
}

fn bench_contended_reserve(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .unwrap();
    let ledger = stocked_ledger(&rt, 4);

    c.bench_function("ledger/contended_reserve_16_tasks", |b| {
        b.iter(|| {
            rt.block_on(async {
                let handles: Vec<_> = (0..16)
                    .map(|t| {
                        let ledger = ledger.clone();
                        let lines = vec![
                            ReservationLine::new(format!("SKU-{:03}", t % 4), 1),
                            ReservationLine::new(format!("SKU-{:03}", (t + 1) % 4), 1),
                        ];
                        tokio::spawn(async move {
                            let reservation = ledger
                                .reserve(SessionId::new(), &lines, Duration::minutes(15))
                                .await
                                .unwrap();
                            ledger.release(reservation.id).await.unwrap();
                        })
                    })
                    .collect();
                for handle in handles {
                    handle.await.unwrap();
                }
            });
        });
    });
}

criterion_group!(
    benches,
    bench_reserve_release_single,
    bench_reserve_commit_ten,
    bench_contended_reserve,
);
criterion_main!(benches);
