//! A small CLI exercising one `call` or `send` against a running
//! `rpc-demo-server`, for manual testing of either backend (§10.5).
//!
//! Usage: `rpc-demo-client <function> [arg]`, with `RPC_DEMO_SEND=1` to
//! fire-and-forget instead of waiting for a reply.

use anyhow::{bail, Context, Result};
use rpc_core::transport::{Client, ClientAddr, Driver};
use rpc_core::wire::Value;
use std::collections::HashMap;

async fn run(client: &dyn Client, function: &str, args: Vec<Value>, fire_and_forget: bool) -> Result<()> {
    if fire_and_forget {
        client.send(function, args, HashMap::new()).await.context("send failed")?;
        println!("sent {function} (no reply expected)");
        Ok(())
    } else {
        match client.call(function, args, HashMap::new()).await {
            Ok(value) => {
                println!("{function} -> {value:?}");
                Ok(())
            }
            Err(e) => bail!("rpc call failed: {e}"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = rpc_core::config::load("rpc-demo").context("loading configuration")?;
    rpc_core::logging::setup(&settings.common);

    let mut cli_args = std::env::args().skip(1);
    let function = cli_args.next().unwrap_or_else(|| "echo".to_string());
    let call_args = cli_args.next().map(|a| vec![Value::Str(a)]).unwrap_or_default();

    let port: u16 = std::env::var("RPC_DEMO_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(5555);
    let fire_and_forget = std::env::var("RPC_DEMO_SEND").ok().as_deref() == Some("1");
    let addr = ClientAddr::from_ip_port(settings.rpc.ip.clone(), port);
    let driver = Driver::parse(&settings.rpc.driver).context("parsing rpc.driver")?;

    match driver {
        Driver::Direct => {
            let client = rpc_direct::connect_client(&settings, addr).context("connecting DIRECT client")?;
            run(&client, &function, call_args, fire_and_forget).await
        }
        Driver::Brokered => {
            let client = rpc_brokered::connect_client(&settings, addr)
                .await
                .context("connecting BROKERED client")?;
            run(&client, &function, call_args, fire_and_forget).await
        }
    }
}
