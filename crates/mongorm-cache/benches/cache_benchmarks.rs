use bson::oid::ObjectId;
use criterion::{Criterion, criterion_group, criterion_main};
use mongorm_cache::DocumentCache;

fn bench_set_and_get(c: &mut Criterion) {
    let cache: DocumentCache<bool> = DocumentCache::new(|_, alive| !*alive);
    let id = ObjectId::new();
    cache.set(id, true);
    c.bench_function("cache_try_get_hit", |b| {
        b.iter(|| cache.try_get(&id));
    });
}

fn bench_flush(c: &mut Criterion) {
    c.bench_function("cache_flush_1000_dead", |b| {
        b.iter(|| {
            let cache: DocumentCache<bool> = DocumentCache::new(|_, alive| !*alive);
            for _ in 0..1000 {
                cache.set(ObjectId::new(), false);
            }
            cache.flush(usize::MAX)
        });
    });
}

criterion_group!(benches, bench_set_and_get, bench_flush);
criterion_main!(benches);
