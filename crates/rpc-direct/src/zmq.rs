//! ZeroMQ-backed push/pull sockets (§4.3), the alternative DIRECT
//! implementation behind the `with-zmq` feature.
//!
//! Grounded directly on `ZMQSocket` in
//! `dao/common/rpc_driver/zmq.py`: `zmq.PUSH`/`zmq.PULL` sockets, a
//! shared `zmq.Context`, and `bind_to_random_port` for the client's
//! ephemeral reply socket.

use crate::pool::{DeferredClosePool, SocketKind};
use async_trait::async_trait;
use rpc_core::error::RpcError;
use rpc_core::transport::{Client as ClientTrait, ClientAddr, Server as ServerTrait};
use rpc_core::wire::{decode_direct, encode_direct, Request, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use zmq::{Context, Socket};

fn new_push(ctx: &Context) -> Result<Socket, RpcError> {
    let push = ctx.socket(zmq::PUSH).map_err(|e| RpcError::Transport(e.into()))?;
    // Defense-in-depth atop the deferred-close pool, matching
    // `ZMQSocket`'s `setsockopt(zmq.LINGER, 0)`: if a push socket is ever
    // dropped before the pool sweeps it, don't block the caller waiting
    // to flush unsent data.
    push.set_linger(0).map_err(|e| RpcError::Transport(e.into()))?;
    Ok(push)
}

fn new_pull(ctx: &Context) -> Result<Socket, RpcError> {
    ctx.socket(zmq::PULL).map_err(|e| RpcError::Transport(e.into()))
}

/// DIRECT client over ZeroMQ push/pull sockets.
pub struct ZmqClient {
    context: Context,
    connect_url: String,
    ip: String,
    url_pattern: String,
    default_timeout: Duration,
    send_timeout: Duration,
    pool: Arc<DeferredClosePool<Socket>>,
}

impl ZmqClient {
    pub fn new(
        context: Context,
        addr: ClientAddr,
        ip: String,
        url_pattern: String,
        default_timeout: Duration,
        send_timeout: Duration,
        pool: Arc<DeferredClosePool<Socket>>,
    ) -> Result<Self, RpcError> {
        let connect_url = addr.resolve(&url_pattern)?;
        Ok(Self {
            context,
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

        let push = new_push(&self.context)?;
        push.connect(&self.connect_url).map_err(|e| RpcError::Transport(e.into()))?;

        let pull = if want_reply {
            let pull = new_pull(&self.context)?;
            pull.set_rcvtimeo(self.default_timeout.as_millis() as i32)
                .map_err(|e| RpcError::Transport(e.into()))?;

            // bind_to_random_port wants the address with no port of its
            // own; it picks one, binds, and hands it back.
            let bind_addr = rpc_core::url::build_url(&self.url_pattern, &self.ip, None);
            let port = pull
                .bind_to_random_port(&bind_addr)
                .map_err(|e| RpcError::Transport(e.into()))?;
            let reply_url = rpc_core::url::build_url(&self.url_pattern, &self.ip, Some(port as u16));

            request.reply_to = Some(reply_url);
            Some(pull)
        } else {
            request.reply_to = None;
            None
        };

        let bytes = encode_direct(&request).map_err(|e| RpcError::Generic(format!("encode failed: {e}")))?;
        let pool = self.pool.clone();
        let reply = tokio::task::spawn_blocking(move || -> Result<Option<Vec<u8>>, RpcError> {
            push.send(bytes, 0).map_err(|e| RpcError::Transport(e.into()))?;
            pool.finish(SocketKind::Push, push);

            match pull {
                Some(pull) => {
                    let bytes = pull.recv_bytes(0).map_err(|e| match e {
                        zmq::Error::EAGAIN => RpcError::Timeout,
                        other => RpcError::Transport(other.into()),
                    })?;
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
impl ClientTrait for ZmqClient {
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
pub struct ZmqServer {
    context: Context,
    pull: Socket,
    bound_url: String,
    send_timeout: Duration,
    pool: Arc<DeferredClosePool<Socket>>,
}

impl ZmqServer {
    pub fn bind(
        context: Context,
        ip: &str,
        port: u16,
        url_pattern: &str,
        send_timeout: Duration,
        pool: Arc<DeferredClosePool<Socket>>,
    ) -> Result<Self, RpcError> {
        let bound_url = rpc_core::url::build_url(url_pattern, ip, Some(port));
        let pull = new_pull(&context)?;
        pull.bind(&bound_url).map_err(|e| RpcError::Transport(e.into()))?;
        Ok(Self {
            context,
            pull,
            bound_url,
            send_timeout,
            pool,
        })
    }
}

#[async_trait]
impl ServerTrait for ZmqServer {
    async fn get_request(&self) -> Result<Request, RpcError> {
        let bytes = self.pull.recv_bytes(0).map_err(|e| RpcError::Transport(e.into()))?;
        decode_direct(&bytes).map_err(|e| RpcError::Generic(format!("decode failed: {e}")))
    }

    async fn send_reply(&self, reply_to: &str, value: Value) -> Result<(), RpcError> {
        self.pool.sweep(self.send_timeout);

        let push = new_push(&self.context)?;
        push.connect(reply_to).map_err(|e| RpcError::Transport(e.into()))?;
        let bytes = encode_direct(&value).map_err(|e| RpcError::Generic(format!("encode failed: {e}")))?;
        push.send(bytes, 0).map_err(|e| RpcError::Transport(e.into()))?;
        self.pool.finish(SocketKind::Push, push);
        Ok(())
    }

    fn bound_url(&self) -> &str {
        &self.bound_url
    }
}
