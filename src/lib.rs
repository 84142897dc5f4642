pub mod collector;
pub mod config;
pub mod metrics;
pub mod prober;
pub mod responder;
pub mod util;

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The exact reply an external target writes to every authorized connection.
pub const PONG: &[u8] = b"pong\n";

/// Outcome of a single client run, submitted once to the metrics server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    #[serde(rename = "ClientID")]
    pub client_id: String,

    #[serde(rename = "NumFailedRequests")]
    pub num_failed_requests: u64,

    #[serde(rename = "MasqueradeDelay")]
    pub masquerade_delay_seconds: f64,
}

impl ProbeResult {
    pub fn new(client_id: String, num_failed_requests: u64, masquerade_delay: Duration) -> Self {
        Self {
            client_id,
            num_failed_requests,
            masquerade_delay_seconds: masquerade_delay.as_secs_f64(),
        }
    }

    /// Check the constraints a deserialized result must satisfy before it is aggregated.
    pub fn validate(&self) -> Result<(), String> {
        if self.client_id.is_empty() {
            return Err("ClientID must not be empty".to_string());
        }

        if !self.masquerade_delay_seconds.is_finite() || self.masquerade_delay_seconds < 0.0 {
            return Err(format!(
                "MasqueradeDelay must be a non-negative number, got {}",
                self.masquerade_delay_seconds
            ));
        }

        Ok(())
    }
}
