//! Client - measures how long it takes to reach the external target correctly
//!
//! The client dials the external target until it reads the expected reply,
//! then reports how many wrong replies it saw and how long convergence took.
//!
//! ## Failure policy
//!
//! - **Dial failure** (refused, unreachable, connect timeout): fatal, never retried
//! - **Wrong or empty reply**: counted, followed by a fixed pause and a new dial
//! - **Submission failure** or a status other than 202: fatal, never retried
//!
//! ## Measurement
//!
//! The delay runs from the moment before the first dial to the moment the
//! *successful* dial completed, so it includes every failed attempt and pause.

pub mod error;

use std::io;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

use reqwest::StatusCode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::{TcpStream, lookup_host};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, instrument};

use crate::config::{ProbeSettings, ProberConfig};
use crate::{PONG, ProbeResult};

pub use error::{ClientResult, ProbeError};

/// Measurement produced by a converged probe loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeOutcome {
    /// Dials that connected but did not read the expected reply
    pub num_failed_requests: u64,

    /// Every dial, including the successful one
    pub attempts: u64,

    pub masquerade_delay: Duration,
}

/// A single client run: probe the external target, then report to the metrics server
pub struct Prober {
    config: ProberConfig,
    client: reqwest::Client,
}

impl Prober {
    pub fn new(config: ProberConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Probe until converged and submit the result.
    pub async fn run(&self) -> ClientResult<ProbeResult> {
        let outcome = probe(&self.config.probe).await?;

        let result = ProbeResult::new(
            self.config.identity.client_id(),
            outcome.num_failed_requests,
            outcome.masquerade_delay,
        );

        self.submit(&result).await?;
        info!("successfully completed task");

        Ok(result)
    }

    /// POST the result to the metrics server once. Anything but 202 is an error.
    #[instrument(skip_all, fields(metrics_server_addr = %self.config.metrics_server_addr))]
    pub async fn submit(&self, result: &ProbeResult) -> ClientResult<()> {
        let url = format!("http://{}/result", self.config.metrics_server_addr);
        info!(?result, "sending result to metrics server");

        let response = self.client.post(&url).json(result).send().await?;

        let status = response.status();
        if status != StatusCode::ACCEPTED {
            return Err(ProbeError::UnexpectedStatus(status));
        }

        Ok(())
    }
}

/// Dial the external target until it answers with [`PONG`].
#[instrument(skip_all, fields(external_target = %settings.target_addr))]
pub async fn probe(settings: &ProbeSettings) -> ClientResult<ProbeOutcome> {
    let start = Instant::now();
    let mut num_failed_requests = 0;
    let mut attempts = 0;

    loop {
        attempts += 1;

        let mut stream = dial(settings).await?;
        let attempt_time = Instant::now();

        let reply = read_reply(&mut stream).await?;
        drop(stream);

        if reply == PONG {
            info!(num_missed = num_failed_requests, "successfully connected to external target");

            return Ok(ProbeOutcome {
                num_failed_requests,
                attempts,
                masquerade_delay: attempt_time.duration_since(start),
            });
        }

        num_failed_requests += 1;
        debug!(
            reply = %String::from_utf8_lossy(&reply).escape_debug(),
            "received incorrect reply"
        );

        let elapsed = start.elapsed();
        let out_of_attempts = settings.max_attempts.is_some_and(|max| attempts >= max);
        let out_of_time = settings.deadline.is_some_and(|deadline| elapsed >= deadline);
        if out_of_attempts || out_of_time {
            return Err(ProbeError::RetriesExhausted { attempts, elapsed });
        }

        sleep(settings.retry_interval).await;
    }
}

async fn dial(settings: &ProbeSettings) -> ClientResult<TcpStream> {
    let connect = connect_ipv4(&settings.target_addr);

    let source = match timeout(settings.connect_timeout, connect).await {
        Ok(Ok(stream)) => return Ok(stream),
        Ok(Err(e)) => e,
        Err(_) => io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
    };

    Err(ProbeError::Connect {
        target: settings.target_addr.clone(),
        source,
    })
}

async fn connect_ipv4(target: &str) -> io::Result<TcpStream> {
    let addr = lookup_host(target)
        .await?
        .find(SocketAddr::is_ipv4)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("no IPv4 address for {target}"),
            )
        })?;

    TcpStream::connect(addr).await
}

/// Read up to and including the first newline. EOF before a newline yields the
/// partial line.
async fn read_reply(stream: &mut TcpStream) -> ClientResult<Vec<u8>> {
    let mut reader = BufReader::new(stream);
    let mut reply = Vec::with_capacity(PONG.len());

    reader
        .read_until(b'\n', &mut reply)
        .await
        .map_err(ProbeError::Read)?;

    Ok(reply)
}
