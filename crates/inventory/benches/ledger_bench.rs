use common::{ReservationId, Sku};
use criterion::{Criterion, criterion_group, criterion_main};
use inventory::{InMemoryInventoryLedger, InventoryLedger};

fn bench_reserve_release_cycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let ledger = InMemoryInventoryLedger::new();
    let sku = Sku::new("SKU-BENCH");
    rt.block_on(ledger.set_stock(sku.clone(), u32::MAX));

    c.bench_function("ledger/reserve_release", |b| {
        b.iter(|| {
            rt.block_on(async {
                let id = ReservationId::new();
                ledger.reserve(sku.clone(), 1, id).await.unwrap();
                ledger.release(id).await.unwrap();
            });
        });
    });
}

fn bench_reserve_commit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("ledger/reserve_commit", |b| {
        b.iter(|| {
            rt.block_on(async {
                let ledger = InMemoryInventoryLedger::new();
                let sku = Sku::new("SKU-BENCH");
                ledger.set_stock(sku.clone(), 100).await;
                let id = ReservationId::new();
                ledger.reserve(sku, 1, id).await.unwrap();
                ledger.commit(id).await.unwrap();
            });
        });
    });
}

criterion_group!(benches, bench_reserve_release_cycle, bench_reserve_commit);
criterion_main!(benches);
