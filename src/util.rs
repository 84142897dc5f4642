use std::net::{Ipv4Addr, SocketAddr};

const POD_NAME: &str = "POD_NAME";

const POD_NAMESPACE: &str = "POD_NAMESPACE";

const LOG_TARGETS: &str = "EGW_LOG";

const DEFAULT_RESPONDER_PORT: u16 = 1337;

const DEFAULT_COLLECTOR_PORT: u16 = 2112;

const LISTEN_ADDR: Ipv4Addr = Ipv4Addr::UNSPECIFIED;

pub fn get_default_responder_port() -> u16 {
    DEFAULT_RESPONDER_PORT
}

pub fn get_default_collector_port() -> u16 {
    DEFAULT_COLLECTOR_PORT
}

/// Bind address on all interfaces for the given port.
pub fn listen_addr(port: u16) -> SocketAddr {
    SocketAddr::from((LISTEN_ADDR, port))
}

pub fn pod_name_var() -> &'static str {
    POD_NAME
}

pub fn pod_namespace_var() -> &'static str {
    POD_NAMESPACE
}

pub fn get_pod_name() -> Option<String> {
    non_empty_var(POD_NAME)
}

pub fn get_pod_namespace() -> Option<String> {
    non_empty_var(POD_NAMESPACE)
}

pub fn get_log_targets() -> Option<String> {
    non_empty_var(LOG_TARGETS)
}

fn non_empty_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.is_empty())
}
