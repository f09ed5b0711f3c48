//! BROKERED server: one long-lived connection and channel, a durable
//! named queue, auto-ack consumption, and reconnect-on-drain-failure.
//!
//! Grounded on `Queue`/`Channel` in `dao/common/rpc_driver/amqp.py`: on
//! any consumer error the original tears down and re-declares the
//! connection, sleeping `reconnect_on` seconds between attempts.
//!
//! The consumer lives in its own background task so `get_request` never
//! holds a lock across its indefinitely-suspending receive: it only
//! waits on an `mpsc` channel the background task feeds, while
//! `send_reply` publishes through a separately-locked `Channel` handle
//! the same task keeps current on reconnect. The two paths never
//! contend for the same lock, matching `amqp.py`'s cooperative model
//! where reading and writing the connection don't block each other.

use crate::{amqp_uri, connection_properties};
use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::options::{BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Channel, Connection, Consumer};
use rpc_core::error::RpcError;
use rpc_core::transport::Server as ServerTrait;
use rpc_core::wire::{decode_brokered, encode_brokered, Request, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

const INBOX_CAPACITY: usize = 1024;

async fn declare(
    rabbit: &rpc_core::config::RabbitSettings,
    queue_name: &str,
) -> Result<(Connection, Channel, Consumer), RpcError> {
    let connection = Connection::connect(&amqp_uri(rabbit), connection_properties())
        .await
        .map_err(|e| RpcError::Transport(e.into()))?;
    let channel = connection.create_channel().await.map_err(|e| RpcError::Transport(e.into()))?;

    channel
        .queue_declare(queue_name, QueueDeclareOptions::default(), FieldTable::default())
        .await
        .map_err(|e| RpcError::Transport(e.into()))?;

    let consumer = channel
        .basic_consume(
            queue_name,
            "rpc-server",
            BasicConsumeOptions {
                no_ack: true,
                ..Default::default()
            },
            FieldTable::default(),
        )
        .await
        .map_err(|e| RpcError::Transport(e.into()))?;

    Ok((connection, channel, consumer))
}

/// State `send_reply` needs, kept independent of the consumer loop.
struct Shared {
    channel: Mutex<Channel>,
}

/// BROKERED server bound to one named queue.
pub struct BrokeredServer {
    queue_name: String,
    shared: Arc<Shared>,
    requests: Mutex<mpsc::Receiver<Result<Request, RpcError>>>,
}

impl BrokeredServer {
    pub async fn bind(
        rabbit: rpc_core::config::RabbitSettings,
        ip: &str,
        port: u16,
        url_pattern: &str,
        reconnect_on: Duration,
    ) -> Result<Self, RpcError> {
        let queue_name = rpc_core::url::build_url(url_pattern, ip, Some(port));
        let (connection, channel, consumer) = declare(&rabbit, &queue_name).await?;
        let shared = Arc::new(Shared {
            channel: Mutex::new(channel),
        });
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);

        tokio::spawn(consume_loop(
            rabbit,
            queue_name.clone(),
            reconnect_on,
            Arc::clone(&shared),
            connection,
            consumer,
            tx,
        ));

        Ok(Self {
            queue_name,
            shared,
            requests: Mutex::new(rx),
        })
    }
}

/// Owns the consumer and the connection backing it for as long as
/// they're in use, forwarding decoded deliveries to `get_request` and
/// publishing fresh channels to `shared` whenever it reconnects.
#[allow(unused_assignments)]
async fn consume_loop(
    rabbit: rpc_core::config::RabbitSettings,
    queue_name: String,
    reconnect_on: Duration,
    shared: Arc<Shared>,
    mut connection: Connection,
    mut consumer: Consumer,
    tx: mpsc::Sender<Result<Request, RpcError>>,
) {
    loop {
        let needs_reconnect = match consumer.next().await {
            Some(Ok(delivery)) => {
                let decoded = decode_brokered(&delivery.data).map_err(|e| RpcError::Generic(format!("decode failed: {e}")));
                if tx.send(decoded).await.is_err() {
                    return;
                }
                false
            }
            Some(Err(e)) => {
                tracing::warn!(error = %e, queue = %queue_name, "broker consumer error, reconnecting");
                true
            }
            None => {
                tracing::warn!(queue = %queue_name, "broker consumer stream ended, reconnecting");
                true
            }
        };

        if needs_reconnect {
            match declare(&rabbit, &queue_name).await {
                Ok((fresh_connection, fresh_channel, fresh_consumer)) => {
                    *shared.channel.lock().await = fresh_channel;
                    connection = fresh_connection;
                    consumer = fresh_consumer;
                }
                Err(e) => {
                    if tx.send(Err(e)).await.is_err() {
                        return;
                    }
                    tokio::time::sleep(reconnect_on).await;
                }
            }
        }
    }
}

#[async_trait]
impl ServerTrait for BrokeredServer {
    async fn get_request(&self) -> Result<Request, RpcError> {
        let mut requests = self.requests.lock().await;
        requests
            .recv()
            .await
            .ok_or_else(|| RpcError::Generic("broker consumer task exited".into()))?
    }

    async fn send_reply(&self, reply_to: &str, value: Value) -> Result<(), RpcError> {
        let payload = encode_brokered(&value).map_err(|e| RpcError::Generic(format!("encode failed: {e}")))?;
        let channel = self.shared.channel.lock().await;
        channel
            .basic_publish(
                "",
                reply_to,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default(),
            )
            .await
            .map_err(|e| RpcError::Transport(e.into()))?;
        Ok(())
    }

    fn bound_url(&self) -> &str {
        &self.queue_name
    }
}
