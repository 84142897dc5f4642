//! Error types for the client

use std::fmt;
use std::io;
use std::time::Duration;

use reqwest::StatusCode;

/// Result type alias for client operations
pub type ClientResult<T> = Result<T, ProbeError>;

/// Fatal client errors. A wrong reply is not one of them: it is counted and retried.
#[derive(Debug)]
pub enum ProbeError {
    /// The TCP dial itself failed or timed out
    Connect { target: String, source: io::Error },

    /// Reading the reply failed with something other than a clean EOF
    Read(io::Error),

    /// The configured attempt or time bound ran out before a correct reply
    RetriesExhausted { attempts: u64, elapsed: Duration },

    /// The result could not be delivered to the metrics server
    Submit(reqwest::Error),

    /// The metrics server answered with something other than 202 Accepted
    UnexpectedStatus(StatusCode),
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeError::Connect { target, source } => {
                write!(f, "unable to connect to external target {target}: {source}")
            }
            ProbeError::Read(err) => write!(f, "unable to read reply: {err}"),
            ProbeError::RetriesExhausted { attempts, elapsed } => write!(
                f,
                "no correct reply after {attempts} attempts ({:.3}s)",
                elapsed.as_secs_f64()
            ),
            ProbeError::Submit(err) => {
                write!(f, "unable to submit result to metrics server: {err}")
            }
            ProbeError::UnexpectedStatus(status) => {
                write!(f, "metrics server returned unexpected status code: {status}")
            }
        }
    }
}

impl std::error::Error for ProbeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProbeError::Connect { source, .. } => Some(source),
            ProbeError::Read(err) => Some(err),
            ProbeError::Submit(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ProbeError {
    fn from(err: reqwest::Error) -> Self {
        ProbeError::Submit(err)
    }
}
