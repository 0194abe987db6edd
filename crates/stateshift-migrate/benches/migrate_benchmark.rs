#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::{json, Value};
use stateshift_migrate::{FieldOp, MigrationManager, MigrationStep};

fn settings_snapshot() -> Value {
    let panels: Vec<Value> = (0..64)
        .map(|i| json!({"id": i, "title": format!("panel {i}"), "collapsed": i % 2 == 0}))
        .collect();
    json!({"theme": "dark", "layout": {"panels": panels}, "recent": ["a", "b", "c"]})
}

fn bench_migrate_chain(c: &mut Criterion) {
    let state = settings_snapshot();

    c.bench_function("migrate_20_field_steps", |b| {
        b.iter(|| {
            let mut manager = MigrationManager::new("bench");
            for v in 1..=20 {
                manager
                    .add_migration(MigrationStep::from_ops(
                        v,
                        "add flag",
                        vec![FieldOp::add(format!("flag{v}"), v)],
                    ))
                    .expect("unique versions");
            }
            black_box(manager.migrate(&state, 0, 20));
        });
    });
}

criterion_group!(benches, bench_migrate_chain);
criterion_main!(benches);
