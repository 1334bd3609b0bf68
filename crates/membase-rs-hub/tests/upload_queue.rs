use membase_rs_hub::{HubClient, HubConfig, HubError, UploadOutcome};
use membase_rs_test_utils::ScriptedTransport;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn client_with(transport: &Arc<ScriptedTransport>, config: HubConfig) -> HubClient {
    HubClient::new(config, transport.clone())
}

#[tokio::test(start_paused = true)]
async fn uploads_drain_in_fifo_order() {
    let transport = Arc::new(ScriptedTransport::new());
    let client = client_with(&transport, HubConfig::default());

    for id in ["a", "b", "c"] {
        let outcome = client
            .upload_hub("owner", id, "{}", None, false)
            .await
            .expect("queued");
        assert_eq!(outcome, UploadOutcome::Queued);
    }
    client.wait_for_idle().await;

    assert_eq!(transport.uploaded_ids(), vec!["a", "b", "c"]);
    let status = client.status();
    assert_eq!(status.completed_uploads, 3);
    assert_eq!(status.queue_len, 0);
    assert!(!status.is_processing);
}

#[tokio::test(start_paused = true)]
async fn only_one_upload_is_in_flight() {
    let transport = Arc::new(ScriptedTransport::new().with_latency(Duration::from_millis(50)));
    let client = client_with(&transport, HubConfig::default());

    let handles: Vec<_> = ["a", "b", "c"]
        .into_iter()
        .map(|id| client.enqueue_upload("owner", id, "{}", None))
        .collect();
    for handle in handles {
        handle.wait().await.expect("ack");
    }

    for gap in transport.gaps() {
        assert!(gap >= Duration::from_millis(150), "gap too short: {gap:?}");
    }
}

#[tokio::test(start_paused = true)]
async fn blocking_upload_returns_the_ack() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond_json(json!({"hash": "0xfeed"}));
    let client = client_with(&transport, HubConfig::default());

    let payload = r#"{"name":"alice","content":"hello"}"#;
    let outcome = client
        .upload_hub("owner", "conv_0", payload, None, true)
        .await
        .expect("upload");
    assert_eq!(outcome, UploadOutcome::Completed(json!({"hash": "0xfeed"})));

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].request.url.ends_with("/api/upload"));
    assert_eq!(
        sent[0].request.json_body().cloned(),
        Some(json!({
            "Owner": "owner",
            "Bucket": "alice",
            "ID": "conv_0",
            "Message": payload,
        }))
    );
}

#[tokio::test(start_paused = true)]
async fn failed_upload_does_not_halt_the_queue() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond_status(500);
    let client = client_with(&transport, HubConfig::default());

    let first = client.enqueue_upload("owner", "a", "{}", None);
    let second = client.enqueue_upload("owner", "b", "{}", None);

    let err = first.wait().await.unwrap_err();
    assert!(matches!(err, HubError::Status { status: 500, .. }));
    second.wait().await.expect("second upload");

    let status = client.status();
    assert_eq!(status.failed_uploads, 1);
    assert_eq!(status.completed_uploads, 1);
    assert_eq!(transport.uploaded_ids(), vec!["a", "b"]);
}

#[tokio::test(start_paused = true)]
async fn close_abandons_pending_uploads() {
    let transport = Arc::new(ScriptedTransport::new().gated());
    let client = client_with(&transport, HubConfig::default());

    let in_flight = client.enqueue_upload("owner", "a", "{}", None);
    let mut pending = client.enqueue_upload("owner", "b", "{}", None);
    while transport.call_count() == 0 {
        tokio::task::yield_now().await;
    }

    client.close();
    let status = client.status();
    assert_eq!(status.queue_len, 0);
    assert!(!status.is_processing);
    assert!(pending.is_abandoned());

    transport.release(1);
    in_flight.wait().await.expect("in-flight upload finishes");

    let waited = tokio::time::timeout(Duration::from_secs(60), pending.wait()).await;
    assert!(waited.is_err(), "abandoned upload must not resolve");
    assert_eq!(transport.uploaded_ids(), vec!["a"]);
}

#[tokio::test(start_paused = true)]
async fn upload_after_close_waits_for_the_in_flight_one() {
    let transport = Arc::new(ScriptedTransport::new().gated());
    let client = client_with(&transport, HubConfig::default());

    let first = client.enqueue_upload("owner", "a", "{}", None);
    while transport.call_count() == 0 {
        tokio::task::yield_now().await;
    }
    client.close();

    let second = client.enqueue_upload("owner", "b", "{}", None);
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
    assert_eq!(transport.call_count(), 1, "b must not start while a is in flight");
    assert_eq!(client.status().queue_len, 1);

    transport.release(2);
    first.wait().await.expect("a finishes");
    second.wait().await.expect("b runs after a");
    client.wait_for_idle().await;

    assert_eq!(transport.uploaded_ids(), vec!["a", "b"]);
    let gaps = transport.gaps();
    assert!(gaps[0] >= Duration::from_millis(100), "{gaps:?}");
    assert!(!client.status().is_processing);
}

#[tokio::test(start_paused = true)]
async fn default_bucket_prefers_membase_id() {
    let transport = Arc::new(ScriptedTransport::new());
    let config = HubConfig {
        membase_id: "agent-7".to_string(),
        ..HubConfig::default()
    };
    let client = client_with(&transport, config);

    client.enqueue_upload("owner", "a", "plain", None);
    client.enqueue_upload("owner", "b", "plain", Some("explicit"));
    client.wait_for_idle().await;

    let buckets: Vec<_> = transport
        .sent()
        .iter()
        .filter_map(|sent| sent.request.json_body()?.get("Bucket")?.as_str().map(str::to_string))
        .collect();
    assert_eq!(buckets, vec!["agent-7", "explicit"]);
}

#[test]
fn enqueue_without_runtime_waits_for_explicit_drain() {
    let transport = Arc::new(ScriptedTransport::new());
    let config = HubConfig {
        upload_interval_ms: 0,
        ..HubConfig::default()
    };
    let client = client_with(&transport, config);

    let _handle = client.enqueue_upload("owner", "a", "{}", None);
    assert_eq!(client.status().queue_len, 1);
    assert_eq!(transport.call_count(), 0);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .expect("runtime");
    runtime.block_on(client.drain());

    assert_eq!(transport.uploaded_ids(), vec!["a"]);
    assert_eq!(client.status().queue_len, 0);
}
