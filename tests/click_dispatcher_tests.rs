mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{CountingResolver, memory_service};
use linkgate::config::ClickConfig;
use linkgate::services::{ClickDispatcher, ClickEvent, LinkResolver};
use linkgate::storage::CreateLinkRequest;

#[tokio::test]
async fn test_slow_recording_times_out_without_propagating() {
    let (service, _repo) = memory_service();
    let link = service
        .create(CreateLinkRequest::new("https://example.com"))
        .await
        .unwrap();
    let recorder =
        Arc::new(CountingResolver::new(service.clone()).with_click_delay(Duration::from_millis(200)));

    let dispatcher = ClickDispatcher::start(
        recorder.clone(),
        &ClickConfig {
            workers: 1,
            queue_size: 8,
            timeout_ms: 20,
        },
    );
    assert!(dispatcher.submit(ClickEvent {
        link_id: link.id.clone(),
        ..Default::default()
    }));

    assert!(dispatcher.shutdown(Duration::from_secs(5)).await);
    let stats = dispatcher.stats();
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.recorded, 0);
    assert_eq!(recorder.calls.record_click.load(Ordering::SeqCst), 1);
    assert_eq!(service.get_link_stats(&link.id).await.unwrap().total_clicks, 0);
}

#[tokio::test]
async fn test_full_queue_drops_clicks() {
    let (service, _repo) = memory_service();
    let recorder =
        Arc::new(CountingResolver::new(service).with_click_delay(Duration::from_millis(200)));

    let dispatcher = ClickDispatcher::start(
        recorder,
        &ClickConfig {
            workers: 1,
            queue_size: 1,
            timeout_ms: 1000,
        },
    );

    let accepted = (0..10)
        .filter(|_| dispatcher.submit(ClickEvent::default()))
        .count();
    let stats = dispatcher.stats();

    assert!(accepted < 10);
    assert_eq!(stats.submitted as usize, accepted);
    assert_eq!(stats.dropped as usize, 10 - accepted);

    dispatcher.shutdown(Duration::from_secs(5)).await;
}
