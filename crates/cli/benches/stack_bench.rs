use criterion::{criterion_group, criterion_main, BatchSize, Criterion};
use reftable::RefRecord;
use stack::{Stack, WriteOptions};
use std::path::Path;
use tempfile::tempdir;

const N_TABLES: usize = 32;
const VALUE_SIZE: usize = 20;

fn open_stack(dir: &Path) -> Stack {
    Stack::open(
        dir,
        dir.join("tables.list"),
        WriteOptions { sync: false },
    )
    .unwrap()
}

/// Builds a stack of `N_TABLES` one-record tables, bypassing auto-compaction
/// so the table count is stable across runs.
fn build_stack(dir: &Path) -> Stack {
    let mut st = open_stack(dir);
    for i in 0..N_TABLES {
        let next = st.next_update_index();
        let name = format!("refs/heads/branch-{:04}", i);
        st.try_add(move |wr| {
            wr.set_limits(next, next);
            wr.add_ref(&RefRecord::set(name, next, vec![0xab; VALUE_SIZE]))
        })
        .unwrap();
    }
    st
}

fn stack_add_benchmark(c: &mut Criterion) {
    c.bench_function("stack_add_one_table", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let st = open_stack(dir.path());
                (dir, st)
            },
            |(_dir, mut st)| {
                let next = st.next_update_index();
                st.try_add(move |wr| {
                    wr.set_limits(next, next);
                    wr.add_ref(&RefRecord::set(
                        "refs/heads/main",
                        next,
                        vec![0xab; VALUE_SIZE],
                    ))
                })
                .unwrap();
            },
            BatchSize::SmallInput,
        );
    });
}

fn stack_get_benchmark(c: &mut Criterion) {
    c.bench_function("stack_get_over_32_tables", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let st = build_stack(dir.path());
                (dir, st)
            },
            |(_dir, st)| {
                for i in 0..N_TABLES {
                    let name = format!("refs/heads/branch-{:04}", i);
                    let v = st.merged().get(&name).unwrap();
                    assert!(v.is_some());
                }
            },
            BatchSize::LargeInput,
        );
    });
}

fn stack_compact_all_benchmark(c: &mut Criterion) {
    c.bench_function("stack_compact_all_32_tables", |b| {
        b.iter_batched(
            || {
                let dir = tempdir().unwrap();
                let st = build_stack(dir.path());
                (dir, st)
            },
            |(_dir, mut st)| {
                st.compact_all().unwrap();
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(
    benches,
    stack_add_benchmark,
    stack_get_benchmark,
    stack_compact_all_benchmark
);
criterion_main!(benches);
