//! The DIRECT transport backend (§4.3): brokerless push/pull sockets
//! behind a deferred-close pool, over either NNG (`with-nng`, default)
//! or ZeroMQ (`with-zmq`).
//!
//! The two backends are mutually exclusive in practice — pick one Cargo
//! feature — but both are written against the same shape so swapping
//! the feature flag is the only change a caller needs to make.

mod pool;

#[cfg(feature = "with-nng")]
mod nng;
#[cfg(feature = "with-zmq")]
mod zmq;

#[cfg(feature = "with-nng")]
pub use crate::nng::{NngClient as DirectClient, NngServer as DirectServer};
#[cfg(all(feature = "with-zmq", not(feature = "with-nng")))]
pub use crate::zmq::{ZmqClient as DirectClient, ZmqServer as DirectServer};

use pool::DeferredClosePool;
use rpc_core::config::Settings;
use rpc_core::error::RpcError;
use rpc_core::transport::ClientAddr;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

/// The process-wide deferred-close pool, mirroring the Python original's
/// `ZMQSocket.sockets_pool` class attribute: every client and server in
/// the process sweeps and feeds the same list, so a socket handed off by
/// one short-lived `DirectClient` still gets swept by the next
/// acquisition anywhere in the process, not just by that same instance.
#[cfg(feature = "with-nng")]
fn shared_pool() -> Arc<DeferredClosePool<::nng::Socket>> {
    static POOL: OnceLock<Arc<DeferredClosePool<::nng::Socket>>> = OnceLock::new();
    POOL.get_or_init(|| Arc::new(DeferredClosePool::new())).clone()
}

#[cfg(all(feature = "with-zmq", not(feature = "with-nng")))]
fn shared_pool() -> Arc<DeferredClosePool<::zmq::Socket>> {
    static POOL: OnceLock<Arc<DeferredClosePool<::zmq::Socket>>> = OnceLock::new();
    POOL.get_or_init(|| Arc::new(DeferredClosePool::new())).clone()
}

/// Construct a DIRECT client against `addr`, per §4.2/§4.3.
#[cfg(feature = "with-nng")]
pub fn connect_client(settings: &Settings, addr: ClientAddr) -> Result<DirectClient, RpcError> {
    DirectClient::new(
        addr,
        settings.rpc.ip.clone(),
        settings.rpc.url_pattern.clone(),
        Duration::from_secs(settings.rpc.rcv_timeout),
        Duration::from_secs(settings.rpc.send_timeout),
        shared_pool(),
    )
}

#[cfg(all(feature = "with-zmq", not(feature = "with-nng")))]
pub fn connect_client(settings: &Settings, addr: ClientAddr) -> Result<DirectClient, RpcError> {
    DirectClient::new(
        ::zmq::Context::new(),
        addr,
        settings.rpc.ip.clone(),
        settings.rpc.url_pattern.clone(),
        Duration::from_secs(settings.rpc.rcv_timeout),
        Duration::from_secs(settings.rpc.send_timeout),
        shared_pool(),
    )
}

/// Bind a DIRECT server on `port`, per §4.2/§4.3.
#[cfg(feature = "with-nng")]
pub fn bind_server(settings: &Settings, port: u16) -> Result<DirectServer, RpcError> {
    DirectServer::bind(
        &settings.rpc.ip,
        port,
        &settings.rpc.url_pattern,
        Duration::from_secs(settings.rpc.send_timeout),
        shared_pool(),
    )
}

#[cfg(all(feature = "with-zmq", not(feature = "with-nng")))]
pub fn bind_server(settings: &Settings, port: u16) -> Result<DirectServer, RpcError> {
    DirectServer::bind(
        ::zmq::Context::new(),
        &settings.rpc.ip,
        port,
        &settings.rpc.url_pattern,
        Duration::from_secs(settings.rpc.send_timeout),
        shared_pool(),
    )
}
