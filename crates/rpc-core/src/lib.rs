//! Transport-agnostic core of the RPC subsystem: configuration, the
//! error taxonomy, the wire format, the `Client`/`Server` contract, and
//! the server-side dispatch loop.
//!
//! Concrete transports live in sibling crates: `rpc-direct` (push/pull
//! sockets over NNG or ZeroMQ) and `rpc-brokered` (AMQP exchanges and
//! queues).

pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod transport;
pub mod url;
pub mod util;
pub mod wire;

pub use error::{ErrorEnvelope, ErrorKind, RpcError};
pub use transport::{Client, ClientAddr, Driver, Server};
pub use wire::{Request, Value};
