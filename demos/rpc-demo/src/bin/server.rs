//! A runnable RPC server exercising both backends end-to-end (§10.5).
//!
//! Registers the handlers the testable properties in §8 are phrased
//! against: `echo` returns its last argument, `boom` always fails,
//! `slow` exercises the call timeout, `log` is a one-way sink, and
//! `identity` echoes back exactly what it was called with.

use anyhow::{Context, Result};
use rpc_core::dispatch::{Dispatcher, MethodTable};
use rpc_core::error::RpcError;
use rpc_core::transport::{Driver, Server};
use rpc_core::wire::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

async fn echo(mut args: Vec<Value>, _kwargs: HashMap<String, Value>) -> Result<Value, RpcError> {
    Ok(args.pop().unwrap_or(Value::Null))
}

async fn boom(_args: Vec<Value>, _kwargs: HashMap<String, Value>) -> Result<Value, RpcError> {
    Err(RpcError::Generic("boom: deliberate failure for testing".into()))
}

async fn slow(_args: Vec<Value>, _kwargs: HashMap<String, Value>) -> Result<Value, RpcError> {
    tokio::time::sleep(Duration::from_secs(2)).await;
    Ok(Value::Str("eventually".into()))
}

async fn log(args: Vec<Value>, _kwargs: HashMap<String, Value>) -> Result<Value, RpcError> {
    tracing::info!(?args, "log: remote log message");
    Ok(Value::Null)
}

async fn identity(args: Vec<Value>, kwargs: HashMap<String, Value>) -> Result<Value, RpcError> {
    Ok(Value::Map(vec![
        ("args".to_string(), Value::Seq(args)),
        ("kwargs".to_string(), Value::Map(kwargs.into_iter().collect())),
    ]))
}

fn method_table() -> MethodTable {
    let mut table = MethodTable::new();
    table.register("echo", echo);
    table.register("boom", boom);
    table.register("slow", slow);
    table.register("log", log);
    table.register("identity", identity);
    table
}

async fn run_until_shutdown<S: Server + 'static>(dispatcher: Dispatcher<S>) {
    tokio::select! {
        _ = dispatcher.run() => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = rpc_core::config::load("rpc-demo").context("loading configuration")?;
    rpc_core::logging::setup(&settings.common);

    let port: u16 = std::env::var("RPC_DEMO_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5555);
    let driver = Driver::parse(&settings.rpc.driver).context("parsing rpc.driver")?;

    match driver {
        Driver::Direct => {
            let server = Arc::new(rpc_direct::bind_server(&settings, port).context("binding DIRECT server")?);
            tracing::info!(bound_url = server.bound_url(), "rpc-demo server listening (DIRECT)");
            run_until_shutdown(Dispatcher::new(server, method_table(), settings.rpc.pool_capacity)).await;
        }
        Driver::Brokered => {
            let server = Arc::new(
                rpc_brokered::bind_server(&settings, port)
                    .await
                    .context("binding BROKERED server")?,
            );
            tracing::info!(bound_url = server.bound_url(), "rpc-demo server listening (BROKERED)");
            run_until_shutdown(Dispatcher::new(server, method_table(), settings.rpc.pool_capacity)).await;
        }
    }

    Ok(())
}
