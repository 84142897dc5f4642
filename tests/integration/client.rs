//! Client tests against real and scripted external targets
//!
//! These tests verify that:
//! - A converging target yields the number of wrong replies seen
//! - A dial failure is fatal and never counted as a wrong reply
//! - Submission succeeds only on 202

use assert_matches::assert_matches;
use egw_scale_test::{
    PONG,
    config::ProbeSettings,
    prober::{ProbeError, Prober, probe},
};
use std::net::SocketAddr;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::*;

/// Target that answers incorrectly `wrong` times, then correctly.
async fn spawn_flaky_target(wrong: usize) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut served = 0;
        loop {
            let (mut stream, _) = listener.accept().await.unwrap();
            let reply: &[u8] = if served < wrong { b"stale\n" } else { PONG };
            served += 1;
            let _ = stream.write_all(reply).await;
            let _ = stream.shutdown().await;
        }
    });

    addr
}

#[tokio::test]
async fn test_correct_target_needs_no_retries() {
    let addr = spawn_test_responder("").await;

    let outcome = probe(&create_test_probe_settings(addr)).await.unwrap();

    assert_eq!(outcome.num_failed_requests, 0);
    assert_eq!(outcome.attempts, 1);
    assert!(outcome.masquerade_delay.as_secs_f64() >= 0.0);
}

#[tokio::test]
async fn test_counts_each_wrong_reply() {
    for wrong in [1, 3, 6] {
        let addr = spawn_flaky_target(wrong).await;
        let settings = create_test_probe_settings(addr);

        let outcome = probe(&settings).await.unwrap();

        assert_eq!(outcome.num_failed_requests, wrong as u64);
        assert_eq!(outcome.attempts, wrong as u64 + 1);
        assert!(
            outcome.masquerade_delay >= settings.retry_interval * wrong as u32,
            "delay {:?} should cover {wrong} retry intervals",
            outcome.masquerade_delay
        );
    }
}

#[tokio::test]
async fn test_refused_dial_is_fatal() {
    let addr = closed_port_addr().await;

    let err = probe(&create_test_probe_settings(addr)).await.unwrap_err();

    assert_matches!(err, ProbeError::Connect { .. });
}

#[tokio::test]
async fn test_dial_failure_after_wrong_replies_is_still_fatal() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // one wrong reply, then the target disappears
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        drop(listener);
        let _ = stream.write_all(b"stale\n").await;
        let _ = stream.shutdown().await;
    });

    let err = probe(&create_test_probe_settings(addr)).await.unwrap_err();

    assert_matches!(err, ProbeError::Connect { .. });
}

#[tokio::test]
async fn test_unauthorized_target_is_retried_until_bound() {
    let addr = spawn_test_responder("10.0.0.0/8").await;
    let settings = ProbeSettings {
        max_attempts: Some(4),
        ..create_test_probe_settings(addr)
    };

    let err = probe(&settings).await.unwrap_err();

    assert_matches!(err, ProbeError::RetriesExhausted { attempts: 4, .. });
}

#[tokio::test]
async fn test_run_submits_result() {
    let target = spawn_flaky_target(2).await;
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/result"))
        .and(header("content-type", "application/json"))
        .and(body_partial_json(serde_json::json!({
            "ClientID": "egw-scale-test/client-0",
            "NumFailedRequests": 2,
        })))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&mock_server)
        .await;

    let prober = Prober::new(create_test_prober_config(target, *mock_server.address()));
    let result = prober.run().await.unwrap();

    assert_eq!(result.client_id, "egw-scale-test/client-0");
    assert_eq!(result.num_failed_requests, 2);
    assert!(result.masquerade_delay_seconds >= 0.04);
}

#[tokio::test]
async fn test_run_rejects_non_accepted_status() {
    let target = spawn_test_responder("").await;
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/result"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let prober = Prober::new(create_test_prober_config(target, *mock_server.address()));
    let err = prober.run().await.unwrap_err();

    assert_matches!(err, ProbeError::UnexpectedStatus(status) if status.as_u16() == 200);
}

#[tokio::test]
async fn test_run_fails_when_metrics_server_unreachable() {
    let target = spawn_test_responder("").await;
    let metrics_server = closed_port_addr().await;

    let prober = Prober::new(create_test_prober_config(target, metrics_server));
    let err = prober.run().await.unwrap_err();

    assert_matches!(err, ProbeError::Submit(_));
}

#[tokio::test]
async fn test_unreachable_target_never_submits() {
    let target = closed_port_addr().await;
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&mock_server)
        .await;

    let prober = Prober::new(create_test_prober_config(target, *mock_server.address()));
    let err = prober.run().await.unwrap_err();

    assert_matches!(err, ProbeError::Connect { .. });
}
