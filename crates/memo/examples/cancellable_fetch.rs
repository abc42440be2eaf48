// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Demonstrates sharing slow fetches between concurrent callers and abandoning one of them.
//!
//! Five requests for the same URL share one fetch. Then a request that originates a fetch is
//! cancelled by a timer, and the requests waiting on it retry and fetch again.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use memo::Memo;

#[tokio::main]
async fn main() {
    let fetches = Arc::new(AtomicUsize::new(0));

    let counter = Arc::clone(&fetches);
    let pages = Memo::builder(move |url: String| {
        let fetch = counter.fetch_add(1, Ordering::SeqCst) + 1;
        async move {
            println!("  fetching {url} (fetch #{fetch})");
            // The first fetch of the slow page stalls.
            let latency = if url.ends_with("/slow") && fetch == 2 { 3600 } else { 200 };
            tokio::time::sleep(Duration::from_millis(latency)).await;
            Ok::<_, String>(format!("<html>{url}</html>"))
        }
    })
    .name("pages")
    .build();

    println!("5 concurrent requests for /home...");
    let mut handles = Vec::new();
    for i in 1..=5 {
        let pages = pages.clone();
        handles.push(tokio::spawn(async move {
            let body = pages.get("https://example.com/home").await;
            println!("  [request {i}] {body:?}");
        }));
    }
    for handle in handles {
        handle.await.expect("request task panicked");
    }

    println!("\nA request for /slow that gives up after 100ms, with 3 requests waiting on it...");
    let impatient = tokio::spawn({
        let pages = pages.clone();
        async move {
            pages
                .cancellable_get("https://example.com/slow", tokio::time::sleep(Duration::from_millis(100)))
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    let mut waiters = Vec::new();
    for i in 1..=3 {
        let pages = pages.clone();
        waiters.push(tokio::spawn(async move {
            let body = pages.get("https://example.com/slow").await;
            println!("  [waiter {i}] {body:?}");
        }));
    }

    let outcome = impatient.await.expect("request task panicked");
    println!("  [impatient] {outcome:?}");
    for waiter in waiters {
        waiter.await.expect("request task panicked");
    }

    println!(
        "\nDone: {} fetches for {} cached pages.",
        fetches.load(Ordering::SeqCst),
        pages.len()
    );
}
