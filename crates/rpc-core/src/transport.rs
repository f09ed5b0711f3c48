//! The abstract transport contract both backends implement, plus the
//! backend-selection machinery described in §4.2 and §6.
//!
//! The concrete DIRECT and BROKERED implementations live in the
//! `rpc-direct` and `rpc-brokered` crates; this crate only knows about
//! the trait shape and the `rpc.driver` string that chooses between them.

use crate::error::RpcError;
use crate::wire::{Request, Value};
use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;

/// Arguments shared by every `Client` constructor.
#[derive(Debug, Clone)]
pub struct ClientAddr {
    pub connect_url: Option<String>,
    pub ip: Option<String>,
    pub port: Option<u16>,
}

impl ClientAddr {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            connect_url: Some(url.into()),
            ip: None,
            port: None,
        }
    }

    pub fn from_ip_port(ip: impl Into<String>, port: u16) -> Self {
        Self {
            connect_url: None,
            ip: Some(ip.into()),
            port: Some(port),
        }
    }

    /// Resolve to a concrete connect URL using `pattern`, failing per
    /// §4.2 if neither a URL nor an ip/port pair was given.
    pub fn resolve(&self, pattern: &str) -> Result<String, RpcError> {
        if let Some(url) = &self.connect_url {
            return Ok(url.clone());
        }
        if let (Some(ip), Some(port)) = (&self.ip, self.port) {
            return Ok(crate::url::build_url(pattern, ip, Some(port)));
        }
        Err(RpcError::InvalidArgument(
            "no url parameters provided: need connect_url or (ip, port)".into(),
        ))
    }
}

/// Client half of the transport contract.
#[async_trait]
pub trait Client: Send + Sync {
    /// Blocking (from the caller's perspective), bounded by the client's
    /// configured timeout. See §4.2.
    async fn call(
        &self,
        function: &str,
        args: Vec<Value>,
        kwargs: HashMap<String, Value>,
    ) -> Result<Value, RpcError>;

    /// Fire-and-forget; never raises a decoded application exception.
    async fn send(
        &self,
        function: &str,
        args: Vec<Value>,
        kwargs: HashMap<String, Value>,
    ) -> Result<(), RpcError>;
}

/// Server half of the transport contract.
#[async_trait]
pub trait Server: Send + Sync {
    /// Block until one request record arrives.
    async fn get_request(&self) -> Result<Request, RpcError>;

    /// Publish a reply to the address a request's `reply_to` named.
    async fn send_reply(&self, reply_to: &str, value: Value) -> Result<(), RpcError>;

    /// The address this server is bound to (used for logging and by
    /// `build_url`-shaped queue names on the BROKERED backend).
    fn bound_url(&self) -> &str;
}

/// The timeout a `Client::call` is bounded by, resolved from either an
/// explicit override or `rpc.rcv_timeout`.
pub fn resolve_timeout(explicit: Option<Duration>, default_secs: u64) -> Duration {
    explicit.unwrap_or_else(|| Duration::from_secs(default_secs))
}

/// Backend identifiers understood by `rpc.driver`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Driver {
    Direct,
    Brokered,
}

impl Driver {
    pub fn parse(name: &str) -> Result<Self, RpcError> {
        match name {
            "direct" => Ok(Driver::Direct),
            "brokered" => Ok(Driver::Brokered),
            other => Err(RpcError::InvalidArgument(format!(
                "unknown rpc.driver: {other} (expected \"direct\" or \"brokered\")"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_from_connect_url() {
        let addr = ClientAddr::from_url("tcp://10.0.0.1:9000");
        assert_eq!(addr.resolve("tcp://{ip}:{port}").unwrap(), "tcp://10.0.0.1:9000");
    }

    #[test]
    fn resolves_from_ip_port() {
        let addr = ClientAddr::from_ip_port("10.0.0.1", 9000);
        assert_eq!(addr.resolve("tcp://{ip}:{port}").unwrap(), "tcp://10.0.0.1:9000");
    }

    #[test]
    fn rejects_neither() {
        let addr = ClientAddr {
            connect_url: None,
            ip: None,
            port: None,
        };
        assert!(matches!(
            addr.resolve("tcp://{ip}:{port}"),
            Err(RpcError::InvalidArgument(_))
        ));
    }

    #[test]
    fn driver_parses_known_names() {
        assert_eq!(Driver::parse("direct").unwrap(), Driver::Direct);
        assert_eq!(Driver::parse("brokered").unwrap(), Driver::Brokered);
        assert!(Driver::parse("carrier-pigeon").is_err());
    }
}
