use bson::oid::ObjectId;
use criterion::{Criterion, criterion_group, criterion_main};
use mongorm_core::ChangeNotifier;

fn bench_notify(c: &mut Criterion) {
    let notifier = ChangeNotifier::new();
    notifier.subscribe(|_| {});
    c.bench_function("change_notifier_notify", |b| {
        b.iter(|| notifier.notify("name"));
    });
}

fn bench_object_id_new(c: &mut Criterion) {
    c.bench_function("object_id_new", |b| {
        b.iter(ObjectId::new);
    });
}

criterion_group!(benches, bench_notify, bench_object_id_new);
criterion_main!(benches);
