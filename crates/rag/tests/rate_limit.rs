//! Provider throughput under a burst of concurrent queries.

mod common;

use common::{doc, pipeline, settings, RecordingClient, StaticSearch, StaticStore};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use veritas_rag::SourceLabel;

#[tokio::test(start_paused = true)]
async fn burst_never_exceeds_safety_ceiling() {
    let mut settings = settings();
    settings.queue.requests_per_minute = 10;
    settings.queue.safety_factor = 0.9;
    settings.queue.tokens_per_minute = 1_000_000;

    let store = Arc::new(StaticStore::new(vec![doc(
        "units",
        "The MS in Computer Science requires 30 units.",
        0.7,
    )]));
    let search = Arc::new(StaticSearch::new(vec![]));
    let client = Arc::new(RecordingClient::new(
        "The MS in Computer Science requires 30 units [Local].",
    ));
    let pipeline = pipeline(settings, store, search, client.clone());

    let queries: Vec<String> = (1..=15)
        .map(|i| format!("How many units does the MS take, version {}?", i))
        .collect();
    let answers = join_all(queries.iter().map(|q| pipeline.answer(q, &[]))).await;

    for answer in &answers {
        assert_eq!(answer.source_label, SourceLabel::VectorOnly, "{}", answer.text);
    }

    let times = client.call_times();
    assert_eq!(times.len(), 15);

    // The 10th dispatch waits for the first to leave the window.
    assert!(times[9] - times[0] >= Duration::from_secs(60));

    // Calls are recorded in dispatch order, so any ten consecutive calls
    // must span at least a full window.
    for i in 0..times.len() - 9 {
        assert!(
            times[i + 9] - times[i] >= Duration::from_secs(60),
            "calls {}..={} within one window",
            i,
            i + 9
        );
    }

    let limiter = pipeline.stats().rate_limiter;
    assert_eq!(limiter.max_requests, 9);
    assert_eq!(limiter.total_acquired, 15);
    assert!(limiter.total_waits >= 1);
}
