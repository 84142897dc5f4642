use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use ipnetwork::IpNetwork;
use tracing::trace;

use crate::util::{
    get_pod_name, get_pod_namespace, listen_addr, pod_name_var, pod_namespace_var,
};

/// Per-attempt connect timeout used when none is configured.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_millis(50);

/// Pause between a wrong reply and the next dial when none is configured.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Errors detected while assembling a component configuration
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A required environment variable is unset or empty
    MissingEnv(&'static str),

    /// The allow-list could not be parsed as a CIDR
    InvalidCidr { value: String, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingEnv(key) => write!(f, "env variable {key} is not set"),
            ConfigError::InvalidCidr { value, reason } => {
                write!(f, "invalid allowed CIDR '{value}': {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// External target configuration
#[derive(Debug, Clone)]
pub struct ResponderConfig {
    pub listen_addr: SocketAddr,

    /// Only peers inside this network get a reply; `None` serves everyone
    pub allowed_cidr: Option<IpNetwork>,
}

impl ResponderConfig {
    /// Build the configuration from the raw flag values.
    ///
    /// An empty CIDR string disables filtering.
    pub fn new(listen_port: u16, allowed_cidr: &str) -> Result<Self, ConfigError> {
        let allowed_cidr = parse_allowed_cidr(allowed_cidr)?;
        let config = Self {
            listen_addr: listen_addr(listen_port),
            allowed_cidr,
        };
        trace!("external target config: {config:?}");
        Ok(config)
    }
}

fn parse_allowed_cidr(value: &str) -> Result<Option<IpNetwork>, ConfigError> {
    let value = value.trim();
    if value.is_empty() {
        return Ok(None);
    }

    value
        .parse::<IpNetwork>()
        .map(Some)
        .map_err(|e| ConfigError::InvalidCidr {
            value: value.to_string(),
            reason: e.to_string(),
        })
}

/// Identity of the workload running the client, taken from the downward API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIdentity {
    pub namespace: String,
    pub name: String,
}

impl ClientIdentity {
    /// Read `POD_NAME` and `POD_NAMESPACE` from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_values(get_pod_name(), get_pod_namespace())
    }

    pub fn from_values(
        name: Option<String>,
        namespace: Option<String>,
    ) -> Result<Self, ConfigError> {
        let name = name
            .filter(|name| !name.is_empty())
            .ok_or(ConfigError::MissingEnv(pod_name_var()))?;
        let namespace = namespace
            .filter(|namespace| !namespace.is_empty())
            .ok_or(ConfigError::MissingEnv(pod_namespace_var()))?;

        Ok(Self { namespace, name })
    }

    /// `<namespace>/<name>`
    pub fn client_id(&self) -> String {
        [self.namespace.as_str(), self.name.as_str()].join("/")
    }
}

/// Retry and timing knobs of the probe loop
#[derive(Debug, Clone)]
pub struct ProbeSettings {
    /// `IP:Port` of the external target
    pub target_addr: String,

    pub connect_timeout: Duration,

    pub retry_interval: Duration,

    /// Upper bound on dial attempts; `None` retries until the right reply arrives
    pub max_attempts: Option<u64>,

    /// Upper bound on the time spent retrying, measured from the first attempt
    pub deadline: Option<Duration>,
}

impl ProbeSettings {
    pub fn new(target_addr: impl Into<String>) -> Self {
        Self {
            target_addr: target_addr.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            max_attempts: None,
            deadline: None,
        }
    }
}

/// Client configuration
#[derive(Debug, Clone)]
pub struct ProberConfig {
    pub identity: ClientIdentity,

    pub probe: ProbeSettings,

    /// `IP:Port` of the metrics server
    pub metrics_server_addr: String,
}

/// Metrics server configuration
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub listen_addr: SocketAddr,
}

impl CollectorConfig {
    pub fn new(listen_port: u16) -> Self {
        Self {
            listen_addr: listen_addr(listen_port),
        }
    }
}
