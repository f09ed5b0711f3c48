//! BROKERED client: per-call exchange + optional exclusive reply queue.
//!
//! Grounded on `Exchange`/`Channel` context managers in
//! `dao/common/rpc_driver/amqp.py`: every call opens its own channel,
//! declares a throwaway exchange, binds it to the server's queue,
//! publishes, and tears the exchange back down on the way out.

use crate::{amqp_uri, connection_properties};
use async_trait::async_trait;
use futures_util::StreamExt;
use lapin::options::{
    BasicConsumeOptions, BasicPublishOptions, ExchangeDeclareOptions, ExchangeDeleteOptions, QueueBindOptions,
    QueueDeclareOptions, QueueDeleteOptions,
};
use lapin::types::FieldTable;
use lapin::{BasicProperties, Connection, ExchangeKind};
use rpc_core::error::RpcError;
use rpc_core::transport::{Client as ClientTrait, ClientAddr};
use rpc_core::wire::{decode_brokered, encode_brokered, Request, Value};
use std::collections::HashMap;
use std::time::Duration;

/// Per-call exchange name: `{uuid}_{server-queue-name}`, per §6.
fn exchange_name(queue_name: &str) -> String {
    format!("{}_{}", uuid::Uuid::new_v4().simple(), queue_name)
}

/// Client reply-queue name: `"client_" + random hex`, per §6.
fn reply_queue_name() -> String {
    format!("client_{}", uuid::Uuid::new_v4().simple())
}

/// BROKERED client. Holds one long-lived AMQP connection; every call or
/// send opens and tears down its own channel, per §4.4.
pub struct BrokeredClient {
    connection: Connection,
    queue_name: String,
    default_timeout: Duration,
}

impl BrokeredClient {
    pub async fn new(
        rabbit: &rpc_core::config::RabbitSettings,
        addr: ClientAddr,
        url_pattern: &str,
        default_timeout: Duration,
    ) -> Result<Self, RpcError> {
        let queue_name = addr.resolve(url_pattern)?;
        let connection = Connection::connect(&amqp_uri(rabbit), connection_properties())
            .await
            .map_err(|e| RpcError::Transport(e.into()))?;
        Ok(Self {
            connection,
            queue_name,
            default_timeout,
        })
    }

    /// The shared publish procedure behind both `send` and `call`: declare
    /// a throwaway direct exchange, bind it to the server's queue, publish,
    /// then delete the exchange.
    async fn publish(&self, function: &str, args: Vec<Value>, kwargs: HashMap<String, Value>, reply_to: Option<String>) -> Result<(), RpcError> {
        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| RpcError::Transport(e.into()))?;

        let exchange_name = exchange_name(&self.queue_name);

        channel
            .exchange_declare(
                &exchange_name,
                ExchangeKind::Direct,
                ExchangeDeclareOptions {
                    auto_delete: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| RpcError::Transport(e.into()))?;

        channel
            .queue_bind(&self.queue_name, &exchange_name, "", QueueBindOptions::default(), FieldTable::default())
            .await
            .map_err(|_| RpcError::NotFound(format!("no such rpc queue: {}", self.queue_name)))?;

        let request = match &reply_to {
            Some(addr) => Request::call(function, args, kwargs, addr.clone()),
            None => Request::fire_and_forget(function, args, kwargs),
        };
        let payload = encode_brokered(&request).map_err(|e| RpcError::Generic(format!("encode failed: {e}")))?;

        channel
            .basic_publish(
                &exchange_name,
                "",
                BasicPublishOptions {
                    mandatory: true,
                    ..Default::default()
                },
                &payload,
                BasicProperties::default(),
            )
            .await
            .map_err(|e| RpcError::Transport(e.into()))?;

        channel
            .exchange_delete(&exchange_name, ExchangeDeleteOptions::default())
            .await
            .map_err(|e| RpcError::Transport(e.into()))?;

        Ok(())
    }
}

#[async_trait]
impl ClientTrait for BrokeredClient {
    async fn call(&self, function: &str, args: Vec<Value>, kwargs: HashMap<String, Value>) -> Result<Value, RpcError> {
        let reply_to = reply_queue_name();

        let channel = self
            .connection
            .create_channel()
            .await
            .map_err(|e| RpcError::Transport(e.into()))?;

        channel
            .queue_declare(
                &reply_to,
                QueueDeclareOptions {
                    exclusive: true,
                    auto_delete: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| RpcError::Transport(e.into()))?;

        let mut consumer = channel
            .basic_consume(
                &reply_to,
                &reply_to,
                BasicConsumeOptions {
                    no_ack: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await
            .map_err(|e| RpcError::Transport(e.into()))?;

        self.publish(function, args, kwargs, Some(reply_to.clone())).await?;

        let delivery = tokio::time::timeout(self.default_timeout, consumer.next())
            .await
            .map_err(|_| RpcError::Timeout)?
            .ok_or_else(|| RpcError::Generic("reply consumer stream ended unexpectedly".into()))?
            .map_err(|e| RpcError::Transport(e.into()))?;

        let _ = channel.queue_delete(&reply_to, QueueDeleteOptions::default()).await;

        let value: Value = decode_brokered(&delivery.data).map_err(|e| RpcError::Generic(format!("decode failed: {e}")))?;
        match value {
            Value::Error(envelope) => Err(RpcError::from_envelope(envelope)),
            other => Ok(other),
        }
    }

    async fn send(&self, function: &str, args: Vec<Value>, kwargs: HashMap<String, Value>) -> Result<(), RpcError> {
        self.publish(function, args, kwargs, None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_name_embeds_queue_name_as_suffix() {
        let name = exchange_name("tcp://127.0.0.1:9000");
        assert!(name.ends_with("_tcp://127.0.0.1:9000"));
        let prefix = name.split('_').next().unwrap();
        assert_eq!(prefix.len(), 32, "uuid simple form is 32 hex chars");
    }

    #[test]
    fn exchange_names_are_unique_per_call() {
        let queue = "tcp://127.0.0.1:9000";
        assert_ne!(exchange_name(queue), exchange_name(queue));
    }

    #[test]
    fn reply_queue_name_has_client_prefix() {
        let name = reply_queue_name();
        assert!(name.starts_with("client_"));
        assert_eq!(name.len(), "client_".len() + 32);
    }
}
