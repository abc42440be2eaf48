// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Performance benchmarks for memo.
//!
//! Run with: cargo bench -p memo

#![allow(missing_docs, reason = "benchmark code")]

use std::{
    future,
    sync::atomic::{AtomicU64, Ordering},
};

use criterion::{Criterion, criterion_group, criterion_main};
use memo::Memo;

static KEY_COUNTER: AtomicU64 = AtomicU64::new(0);

fn unique_key() -> String {
    format!("key_{}", KEY_COUNTER.fetch_add(1, Ordering::Relaxed))
}

fn new_memo() -> Memo<String> {
    Memo::builder(|key: String| async move { key }).logging(false).build()
}

/// Lookup of an already cached key.
fn bench_hit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    let memo = new_memo();
    rt.block_on(memo.get("hot")).expect("lookup failed");

    c.bench_function("hit", |b| {
        b.to_async(&rt).iter(|| memo.get("hot"));
    });
}

/// First lookup of a key: publishes an entry and runs the computation.
fn bench_miss(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    let memo = new_memo();

    c.bench_function("miss", |b| {
        b.to_async(&rt).iter(|| {
            let memo = memo.clone();
            async move { memo.get(&unique_key()).await }
        });
    });
}

/// 100 concurrent tasks on one new key.
fn bench_high_contention(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    let memo = new_memo();

    c.bench_function("high_contention_100", |b| {
        b.to_async(&rt).iter(|| {
            let memo = memo.clone();
            async move {
                let key = unique_key();
                let tasks: Vec<_> = (0..100)
                    .map(|_| {
                        let memo = memo.clone();
                        let key = key.clone();
                        tokio::spawn(async move { memo.get(&key).await })
                    })
                    .collect();

                for task in tasks {
                    task.await.expect("Task panicked").expect("lookup failed");
                }
            }
        });
    });
}

/// Cancellable lookup of a cached key, which pays for the background task.
fn bench_cancellable_hit(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("Failed to create runtime");
    let memo = new_memo();
    rt.block_on(memo.get("hot")).expect("lookup failed");

    c.bench_function("cancellable_hit", |b| {
        b.to_async(&rt).iter(|| memo.cancellable_get("hot", future::pending::<()>()));
    });
}

criterion_group!(benches, bench_hit, bench_miss, bench_high_contention, bench_cancellable_hit);
criterion_main!(benches);
