//! Integration tests for the throttled execution core.
//!
//! Timing-sensitive cases run on tokio's paused clock so admission
//! timestamps are exact; the HTTP propagation cases run against a local
//! one-shot fixture server in real time.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use idlewatch::throttle::{run_recovering, CallOutcome, Quota, RecoveryConfig, ThrottleGate, Throttler};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::time::Instant;

fn quota(max_operations: u32, window_ms: u64) -> Quota {
    Quota::new("test", max_operations, Duration::from_millis(window_ms)).unwrap()
}

/// Serve one canned HTTP response per connection, in order, then stop.
async fn spawn_fixture(responses: Vec<String>) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        for response in responses {
            let Ok((mut stream, _)) = listener.accept().await else {
                return;
            };
            let mut buf = [0u8; 4096];
            let _ = stream.read(&mut buf).await;
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.shutdown().await;
        }
    });

    addr
}

fn http_response(status_line: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
        status_line,
        body.len(),
        body
    )
}

#[tokio::test(start_paused = true)]
async fn burst_of_seven_calls_respects_five_per_second() {
    let throttler = Throttler::new("records", quota(5, 1000));
    let start = Instant::now();
    let mut admitted_at = Vec::new();

    for i in 0..7 {
        let value = throttler.execute(|| async move { i }).await;
        assert_eq!(value, i);
        admitted_at.push(start.elapsed());
    }

    // First five immediate, the rest spill past the window edge.
    for at in &admitted_at[..5] {
        assert_eq!(*at, Duration::ZERO);
    }
    for at in &admitted_at[5..] {
        assert!(
            *at >= Duration::from_millis(1000),
            "call admitted too early: {:?}",
            at
        );
    }
}

#[tokio::test(start_paused = true)]
async fn fifty_concurrent_callers_never_exceed_quota() {
    let gate = Arc::new(ThrottleGate::new("race", quota(5, 1000)));
    let start = Instant::now();

    let mut handles = Vec::new();
    for _ in 0..50 {
        let gate = Arc::clone(&gate);
        handles.push(tokio::spawn(async move {
            gate.acquire().await;
            start.elapsed()
        }));
    }

    let mut admitted: Vec<Duration> = futures::future::join_all(handles)
        .await
        .into_iter()
        .map(|r| r.unwrap())
        .collect();
    admitted.sort();

    let window = Duration::from_millis(1000);
    for (i, &t) in admitted.iter().enumerate() {
        let in_window = admitted[..=i].iter().filter(|&&s| t - s < window).count();
        assert!(
            in_window <= 5,
            "{} admissions inside one window ending at {:?}",
            in_window,
            t
        );
    }
}

#[tokio::test(start_paused = true)]
async fn independent_services_do_not_share_quota() {
    let records = Throttler::new("records", quota(1, 1000));
    let chat = Throttler::new("chat", quota(1, 1000));
    let start = Instant::now();

    records.execute(|| async {}).await;
    chat.execute(|| async {}).await;

    assert_eq!(start.elapsed(), Duration::ZERO);
}

#[tokio::test]
async fn throttled_get_propagates_status_and_payload() {
    let addr = spawn_fixture(vec![
        http_response("200 OK", r#"{"data": [1, 2, 3]}"#),
        http_response("404 Not Found", r#"{"error": "missing"}"#),
    ])
    .await;
    let url = format!("http://{}/things", addr);
    let throttler = Throttler::new("fixture", quota(10, 1000));

    let ok = throttler
        .throttled_get(&url, &[("page", "1")])
        .await
        .unwrap();
    assert_eq!(ok.status().as_u16(), 200);
    let body: serde_json::Value = ok.json().await.unwrap();
    assert_eq!(body["data"][1], 2);

    // Non-2xx is a response, not an error; nothing is swallowed.
    let not_found = throttler
        .throttled_get(&url, &[("page", "2")])
        .await
        .unwrap();
    assert_eq!(not_found.status().as_u16(), 404);
}

#[tokio::test]
async fn failure_shell_retries_transient_status_then_succeeds() {
    let addr = spawn_fixture(vec![
        http_response("503 Service Unavailable", "{}"),
        http_response("200 OK", r#"{"ready": true}"#),
    ])
    .await;
    let url = format!("http://{}/health", addr);
    let throttler = Throttler::new("fixture", quota(10, 1000));
    let recovery = RecoveryConfig::new()
        .max_attempts(3)
        .base_delay(Duration::from_millis(10))
        .jitter(0.0);

    let throttler = &throttler;
    let url = url.as_str();
    let outcome = run_recovering("fixture", &recovery, move || async move {
        let response = throttler.throttled_get(url, &[("probe", "1")]).await?;
        let response = response.error_for_status()?;
        Ok(response.json::<serde_json::Value>().await?)
    })
    .await;

    match outcome {
        CallOutcome::Success(value) => assert_eq!(value["ready"], true),
        CallOutcome::Failure(reason) => panic!("expected recovery, got failure: {}", reason),
    }
}

#[tokio::test]
async fn failure_shell_returns_sentinel_after_exhaustion() {
    // Nothing listens here; every attempt fails at the transport level.
    let throttler = Throttler::new("fixture", quota(10, 1000));
    let recovery = RecoveryConfig::new()
        .max_attempts(2)
        .base_delay(Duration::from_millis(10))
        .jitter(0.0);

    let throttler = &throttler;
    let outcome: CallOutcome<serde_json::Value> =
        run_recovering("fixture", &recovery, move || async move {
            let response = throttler
                .throttled_get("http://127.0.0.1:9/nothing", &[("probe", "1")])
                .await?;
            Ok(response.json().await?)
        })
        .await;

    assert!(outcome.is_failure());
    assert!(outcome.failure_reason().is_some());
}

#[tokio::test]
async fn empty_result_is_distinguishable_from_failure() {
    let addr = spawn_fixture(vec![http_response("200 OK", r#"{"data": []}"#)]).await;
    let url = format!("http://{}/users", addr);
    let throttler = Throttler::new("fixture", quota(10, 1000));
    let recovery = RecoveryConfig::default();

    let throttler = &throttler;
    let url = url.as_str();
    let outcome: CallOutcome<Vec<serde_json::Value>> =
        run_recovering("fixture", &recovery, move || async move {
            let response = throttler.throttled_get(url, &[("page", "1")]).await?;
            let body: serde_json::Value = response.json().await?;
            let data = body["data"].as_array().cloned().unwrap_or_default();
            Ok(data)
        })
        .await;

    // A successfully fetched empty list is Success(empty), never Failure.
    assert_eq!(outcome, CallOutcome::Success(Vec::new()));
}
