//! Helper functions for integration tests

use egw_scale_test::{
    collector::{CollectorState, spawn_collector},
    config::{ClientIdentity, CollectorConfig, ProbeSettings, ProberConfig, ResponderConfig},
    metrics::ResultAggregator,
    responder::Responder,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

pub fn create_test_identity() -> ClientIdentity {
    ClientIdentity {
        namespace: "egw-scale-test".to_string(),
        name: "client-0".to_string(),
    }
}

/// Probe settings tuned for loopback tests
pub fn create_test_probe_settings(target: SocketAddr) -> ProbeSettings {
    ProbeSettings {
        connect_timeout: Duration::from_millis(500),
        retry_interval: Duration::from_millis(20),
        ..ProbeSettings::new(target.to_string())
    }
}

pub fn create_test_prober_config(target: SocketAddr, metrics_server: SocketAddr) -> ProberConfig {
    ProberConfig {
        identity: create_test_identity(),
        probe: create_test_probe_settings(target),
        metrics_server_addr: metrics_server.to_string(),
    }
}

/// Start an external target on a random loopback port.
pub async fn spawn_test_responder(allowed_cidr: &str) -> SocketAddr {
    let mut config = ResponderConfig::new(0, allowed_cidr).unwrap();
    config.listen_addr = "127.0.0.1:0".parse().unwrap();

    let responder = Responder::bind(&config).await.unwrap();
    let addr = responder.local_addr().unwrap();
    tokio::spawn(responder.run());

    addr
}

/// Start a metrics server on a random loopback port with its own aggregator.
pub async fn spawn_test_collector() -> (SocketAddr, Arc<ResultAggregator>) {
    let aggregator = Arc::new(ResultAggregator::new().unwrap());
    let config = CollectorConfig {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
    };

    let addr = spawn_collector(config, CollectorState::new(aggregator.clone()))
        .await
        .unwrap();

    (addr, aggregator)
}

/// An address nothing is listening on.
pub async fn closed_port_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub async fn scrape(addr: SocketAddr) -> String {
    let response = reqwest::get(format!("http://{addr}/metrics")).await.unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    response.text().await.unwrap()
}

/// Value of the sample whose name (including labels) is exactly `name`.
pub fn metric_value(text: &str, name: &str) -> Option<f64> {
    text.lines()
        .filter(|line| !line.starts_with('#'))
        .find_map(|line| {
            let (key, value) = line.rsplit_once(' ')?;
            if key == name { value.parse().ok() } else { None }
        })
}

pub fn result_json(failed: u64, delay: f64) -> serde_json::Value {
    serde_json::json!({
        "ClientID": "egw-scale-test/client-0",
        "NumFailedRequests": failed,
        "MasqueradeDelay": delay,
    })
}
