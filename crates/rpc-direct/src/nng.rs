//! NNG-backed push/pull sockets (§4.3), the default DIRECT implementation.
//!
//! Grounded on the `nng_impl` module of the teacher's `bus::rpc` for the
//! spawn_blocking-per-operation structure, and on `ZMQSocket` in
//! `dao/common/rpc_driver/zmq.py` for the socket *shape*: these are
//! genuine push/pull sockets, not the teacher's req/rep pair, matching
//! what the original actually does.

use crate::pool::{DeferredClosePool, SocketKind};
use async_trait::async_trait;
use nng::options::{Options, RecvTimeout};
use nng::{Protocol, Socket};
use rpc_core::error::RpcError;
use rpc_core::transport::{Client as ClientTrait, ClientAddr, Server as ServerTrait};
use rpc_core::wire::{decode_direct, encode_direct, Request, Value};
use std::collections::HashMap;
use std::net::TcpListener;
use std::sync::Arc;
use std::time::Duration;

/// NNG doesn't expose a "bind to an OS-chosen port and tell me which"
/// call the way ZeroMQ does, so we borrow the standard trick: claim a
/// free port with a throwaway `TcpListener`, read it back, then bind the
/// real socket there. A small race exists between the drop and the nng
/// bind, as it does for every "find a free port" helper of this shape.
fn alloc_ephemeral_url(ip: &str, pattern: &str) -> Result<String, RpcError> {
    let listener = TcpListener::bind((ip, 0))
        .map_err(|e| RpcError::Generic(format!("failed to allocate an ephemeral port on {ip}: {e}")))?;
    let port = listener
        .local_addr()
        .map_err(|e| RpcError::Generic(format!("failed to read allocated port: {e}")))?
        .port();
    drop(listener);
    Ok(rpc_core::url::build_url(pattern, ip, Some(port)))
}

fn new_push() -> Result<Socket, RpcError> {
    Socket::new(Protocol::Push0).map_err(|e| RpcError::Transport(e.into()))
}

fn new_pull() -> Result<Socket, RpcError> {
    Socket::new(Protocol::Pull0).map_err(|e| RpcError::Transport(e.into()))
}

/// DIRECT client over NNG push/pull sockets.
pub struct NngClient {
    connect_url: String,
    ip: String,
    url_pattern: String,
    default_timeout: Duration,
    send_timeout: Duration,
    pool: Arc<DeferredClosePool<Socket>>,
}

impl NngClient {
    pub fn new(
        addr: ClientAddr,
        ip: String,
        url_pattern: String,
        default_timeout: Duration,
        send_timeout: Duration,
        pool: Arc<DeferredClosePool<Socket>>,
    ) -> Result<Self, RpcError> {
        let connect_url = addr.resolve(&url_pattern)?;
        Ok(Self {
            connect_url,
            ip,
            url_pattern,
            default_timeout,
            send_timeout,
            pool,
        })
    }

    async fn request(&self, mut request: Request, want_reply: bool) -> Result<Option<Value>, RpcError> {
        self.pool.sweep(self.send_timeout);

        let push = new_push()?;
        push.dial(&self.connect_url).map_err(|e| RpcError::Transport(e.into()))?;

        let pull = if want_reply {
            let reply_url = alloc_ephemeral_url(&self.ip, &self.url_pattern)?;
            let pull = new_pull()?;
            pull.set_opt::<RecvTimeout>(Some(self.default_timeout))
                .map_err(|e| RpcError::Transport(e.into()))?;
            pull.listen(&reply_url).map_err(|e| RpcError::Transport(e.into()))?;
            request.reply_to = Some(reply_url);
            Some(pull)
        } else {
            request.reply_to = None;
            None
        };

        let bytes = encode_direct(&request).map_err(|e| RpcError::Generic(format!("encode failed: {e}")))?;
        let pool = self.pool.clone();
        let reply = tokio::task::spawn_blocking(move || -> Result<Option<Vec<u8>>, RpcError> {
            push.send(nng::Message::from(bytes))
                .map_err(|(_, e)| RpcError::Transport(e.into()))?;
            pool.finish(SocketKind::Push, push);

            match pull {
                Some(pull) => {
                    let msg = pull.recv().map_err(|e| match e {
                        nng::Error::TimedOut => RpcError::Timeout,
                        other => RpcError::Transport(other.into()),
                    })?;
                    let bytes = msg.as_slice().to_vec();
                    pool.finish(SocketKind::Pull, pull);
                    Ok(Some(bytes))
                }
                None => Ok(None),
            }
        })
        .await
        .map_err(|e| RpcError::Generic(format!("blocking task panicked: {e}")))??;

        match reply {
            Some(bytes) => {
                let value: Value = decode_direct(&bytes).map_err(|e| RpcError::Generic(format!("decode failed: {e}")))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl ClientTrait for NngClient {
    async fn call(&self, function: &str, args: Vec<Value>, kwargs: HashMap<String, Value>) -> Result<Value, RpcError> {
        let request = Request::fire_and_forget(function, args, kwargs);
        match self.request(request, true).await? {
            Some(Value::Error(envelope)) => Err(RpcError::from_envelope(envelope)),
            Some(value) => Ok(value),
            None => unreachable!("call always requests a reply"),
        }
    }

    async fn send(&self, function: &str, args: Vec<Value>, kwargs: HashMap<String, Value>) -> Result<(), RpcError> {
        let request = Request::fire_and_forget(function, args, kwargs);
        self.request(request, false).await?;
        Ok(())
    }
}

/// DIRECT server bound to a single pull socket, replying through
/// scoped push sockets drawn from the deferred-close pool.
pub struct NngServer {
    pull: Socket,
    bound_url: String,
    send_timeout: Duration,
    pool: Arc<DeferredClosePool<Socket>>,
}

impl NngServer {
    pub fn bind(
        ip: &str,
        port: u16,
        url_pattern: &str,
        send_timeout: Duration,
        pool: Arc<DeferredClosePool<Socket>>,
    ) -> Result<Self, RpcError> {
        let bound_url = rpc_core::url::build_url(url_pattern, ip, Some(port));
        let pull = new_pull()?;
        pull.listen(&bound_url).map_err(|e| RpcError::Transport(e.into()))?;
        Ok(Self {
            pull,
            bound_url,
            send_timeout,
            pool,
        })
    }
}

#[async_trait]
impl ServerTrait for NngServer {
    async fn get_request(&self) -> Result<Request, RpcError> {
        let pull = self.pull.clone();
        let bytes = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, RpcError> {
            let msg = pull.recv().map_err(|e| RpcError::Transport(e.into()))?;
            Ok(msg.as_slice().to_vec())
        })
        .await
        .map_err(|e| RpcError::Generic(format!("blocking task panicked: {e}")))??;

        decode_direct(&bytes).map_err(|e| RpcError::Generic(format!("decode failed: {e}")))
    }

    async fn send_reply(&self, reply_to: &str, value: Value) -> Result<(), RpcError> {
        self.pool.sweep(self.send_timeout);

        let push = new_push()?;
        push.dial(reply_to).map_err(|e| RpcError::Transport(e.into()))?;
        let bytes = encode_direct(&value).map_err(|e| RpcError::Generic(format!("encode failed: {e}")))?;
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<(), RpcError> {
            push.send(nng::Message::from(bytes))
                .map_err(|(_, e)| RpcError::Transport(e.into()))?;
            pool.finish(SocketKind::Push, push);
            Ok(())
        })
        .await
        .map_err(|e| RpcError::Generic(format!("blocking task panicked: {e}")))??;
        Ok(())
    }

    fn bound_url(&self) -> &str {
        &self.bound_url
    }
}
