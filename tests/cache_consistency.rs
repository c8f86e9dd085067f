//! Consistency tests for the tagged query store.
//!
//! Covers single-flight fetching, invalidation targeting by tag, and the
//! generation gate that discards superseded responses.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;

use rivolo::cache::{Fetcher, Listener, QuerySnapshot, QueryStatus, QueryStore, Signature, Tag};

fn tags(tags: &[Tag]) -> HashSet<Tag> {
    tags.iter().cloned().collect()
}

fn listener() -> (Listener, mpsc::UnboundedReceiver<QuerySnapshot>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let listener: Listener = Arc::new(move |snapshot: &QuerySnapshot| {
        let _ = tx.send(snapshot.clone());
    });
    (listener, rx)
}

async fn wait_success(rx: &mut mpsc::UnboundedReceiver<QuerySnapshot>) -> QuerySnapshot {
    loop {
        let snapshot = rx.recv().await.expect("listener channel open");
        if snapshot.status == QueryStatus::Success {
            return snapshot;
        }
    }
}

/// Fetcher that counts calls and sleeps `delay_ms` before returning
/// `payload`.
fn slow_fetcher(calls: Arc<AtomicUsize>, delay_ms: u64, payload: serde_json::Value) -> Fetcher {
    Arc::new(move || {
        calls.fetch_add(1, Ordering::SeqCst);
        let payload = payload.clone();
        Box::pin(async move {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            Ok(payload)
        })
    })
}

#[tokio::test(start_paused = true)]
async fn concurrent_subscribers_share_one_fetch() {
    let store = QueryStore::new(Duration::from_secs(60));
    let signature = Signature::new("jobs", &json!({ "page": 1 }));
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = slow_fetcher(calls.clone(), 100, json!({ "jobs": [] }));

    let (listener_a, mut rx_a) = listener();
    let (listener_b, mut rx_b) = listener();
    let (listener_c, mut rx_c) = listener();
    let _a = store.subscribe(
        signature.clone(),
        tags(&[Tag::category("MusicJob")]),
        fetcher.clone(),
        listener_a,
    );
    let _b = store.subscribe(
        signature.clone(),
        tags(&[Tag::category("MusicJob")]),
        fetcher.clone(),
        listener_b,
    );
    let _c = store.subscribe(
        signature,
        tags(&[Tag::category("MusicJob")]),
        fetcher,
        listener_c,
    );

    let a = wait_success(&mut rx_a).await;
    let b = wait_success(&mut rx_b).await;
    let c = wait_success(&mut rx_c).await;
    assert_eq!(a.data, Some(json!({ "jobs": [] })));
    assert_eq!(b.data, a.data);
    assert_eq!(c.data, a.data);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn entity_invalidation_targets_exact_id_and_bare_lists() {
    let store = QueryStore::new(Duration::from_secs(60));
    let list_sig = Signature::new("jobs", &json!({ "page": 1 }));
    let seven_sig = Signature::new("job", &json!({ "id": "7" }));
    let eight_sig = Signature::new("job", &json!({ "id": "8" }));

    let list_calls = Arc::new(AtomicUsize::new(0));
    let seven_calls = Arc::new(AtomicUsize::new(0));
    let eight_calls = Arc::new(AtomicUsize::new(0));

    let (list_listener, mut list_rx) = listener();
    let (seven_listener, mut seven_rx) = listener();
    let (eight_listener, mut eight_rx) = listener();

    let _list = store.subscribe(
        list_sig,
        tags(&[Tag::category("MusicJob")]),
        slow_fetcher(list_calls.clone(), 5, json!({ "jobs": [] })),
        list_listener,
    );
    let _seven = store.subscribe(
        seven_sig,
        tags(&[Tag::entity("MusicJob", "7")]),
        slow_fetcher(seven_calls.clone(), 5, json!({ "id": "7" })),
        seven_listener,
    );
    let _eight = store.subscribe(
        eight_sig,
        tags(&[Tag::entity("MusicJob", "8")]),
        slow_fetcher(eight_calls.clone(), 5, json!({ "id": "8" })),
        eight_listener,
    );
    wait_success(&mut list_rx).await;
    wait_success(&mut seven_rx).await;
    wait_success(&mut eight_rx).await;

    store.invalidate(&[Tag::entity("MusicJob", "7")]);
    wait_success(&mut list_rx).await;
    wait_success(&mut seven_rx).await;

    assert_eq!(list_calls.load(Ordering::SeqCst), 2);
    assert_eq!(seven_calls.load(Ordering::SeqCst), 2);
    assert_eq!(eight_calls.load(Ordering::SeqCst), 1);

    // The bare category sweeps everything, id entries included.
    store.invalidate(&[Tag::category("MusicJob")]);
    wait_success(&mut list_rx).await;
    wait_success(&mut seven_rx).await;
    wait_success(&mut eight_rx).await;
    assert_eq!(eight_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn superseded_response_is_discarded() {
    let store = QueryStore::new(Duration::from_secs(60));
    let signature = Signature::new("jobs", &json!({ "page": 1 }));

    // First fetch is slow and stale; the refetch after invalidation is fast.
    let attempts = Arc::new(AtomicUsize::new(0));
    let fetcher: Fetcher = {
        let attempts = attempts.clone();
        Arc::new(move || {
            let attempt = attempts.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if attempt == 0 {
                    tokio::time::sleep(Duration::from_millis(1_000)).await;
                    Ok(json!({ "version": "stale" }))
                } else {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok(json!({ "version": "fresh" }))
                }
            })
        })
    };

    let (listener, mut rx) = listener();
    let _guard = store.subscribe(
        signature.clone(),
        tags(&[Tag::category("MusicJob")]),
        fetcher,
        listener,
    );
    // Invalidate while the slow first fetch is still in flight.
    store.invalidate(&[Tag::category("MusicJob")]);

    let snapshot = wait_success(&mut rx).await;
    assert_eq!(snapshot.data, Some(json!({ "version": "fresh" })));

    // Let the stale response arrive; it must not overwrite the fresh one.
    tokio::time::sleep(Duration::from_millis(1_100)).await;
    let snapshot = store.read(&signature).expect("entry present");
    assert_eq!(snapshot.status, QueryStatus::Success);
    assert_eq!(snapshot.data, Some(json!({ "version": "fresh" })));
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn listener_sees_loading_then_success_with_data_retained() {
    let store = QueryStore::new(Duration::from_secs(60));
    let signature = Signature::new("jobs", &json!({ "page": 1 }));
    let calls = Arc::new(AtomicUsize::new(0));

    let (listener, mut rx) = listener();
    let _guard = store.subscribe(
        signature,
        tags(&[Tag::category("MusicJob")]),
        slow_fetcher(calls, 5, json!({ "jobs": [1] })),
        listener,
    );

    let first = rx.recv().await.expect("snapshot");
    assert_eq!(first.status, QueryStatus::Loading);
    assert_eq!(first.data, None);
    let second = wait_success(&mut rx).await;
    assert_eq!(second.data, Some(json!({ "jobs": [1] })));

    // During an invalidation refetch the stale data stays visible.
    store.invalidate(&[Tag::category("MusicJob")]);
    let reloading = rx.recv().await.expect("snapshot");
    assert_eq!(reloading.status, QueryStatus::Loading);
    assert_eq!(reloading.data, Some(json!({ "jobs": [1] })));
}

#[tokio::test(start_paused = true)]
async fn unsubscribing_does_not_cancel_a_shared_fetch() {
    let store = QueryStore::new(Duration::from_secs(60));
    let signature = Signature::new("jobs", &json!({ "page": 1 }));
    let calls = Arc::new(AtomicUsize::new(0));
    let fetcher = slow_fetcher(calls.clone(), 100, json!({ "jobs": [] }));

    let (listener_a, rx_a) = listener();
    let (listener_b, mut rx_b) = listener();
    let guard_a = store.subscribe(
        signature.clone(),
        tags(&[Tag::category("MusicJob")]),
        fetcher.clone(),
        listener_a,
    );
    let _guard_b = store.subscribe(
        signature,
        tags(&[Tag::category("MusicJob")]),
        fetcher,
        listener_b,
    );

    drop(guard_a);
    drop(rx_a);

    let snapshot = wait_success(&mut rx_b).await;
    assert_eq!(snapshot.data, Some(json!({ "jobs": [] })));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
