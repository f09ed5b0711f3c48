use rpc_core::config::Settings;
use rpc_core::transport::{Client, ClientAddr, Server};
use rpc_core::wire::Value;
use std::collections::HashMap;
use std::net::TcpListener;

fn free_port() -> u16 {
    TcpListener::bind(("127.0.0.1", 0))
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[tokio::test]
async fn round_trip_call_returns_handler_value() {
    let mut settings = Settings::default();
    settings.rpc.send_timeout = 1;
    settings.rpc.rcv_timeout = 5;
    let port = free_port();

    let server = rpc_direct::bind_server(&settings, port).expect("bind server");
    let bound_url = server.bound_url().to_string();

    tokio::spawn(async move {
        let request = server.get_request().await.expect("get_request");
        assert_eq!(request.function, "echo");
        server
            .send_reply(request.reply_to.as_deref().expect("reply_to"), Value::Str("pong".into()))
            .await
            .expect("send_reply");
    });

    let client = rpc_direct::connect_client(&settings, ClientAddr::from_url(bound_url)).expect("connect client");
    let reply = client.call("echo", vec![], HashMap::new()).await.expect("call");
    assert_eq!(reply, Value::Str("pong".into()));
}

#[tokio::test]
async fn call_against_nothing_listening_times_out() {
    let mut settings = Settings::default();
    settings.rpc.rcv_timeout = 1;
    let port = free_port();

    // Nobody ever binds a pull socket on this reply address's peer port,
    // so the push side connects happily (push/pull sockets queue until a
    // peer shows up) but no reply ever arrives.
    let dead_url = rpc_core::url::build_url(&settings.rpc.url_pattern, &settings.rpc.ip, Some(port));
    let client = rpc_direct::connect_client(&settings, ClientAddr::from_url(dead_url)).expect("connect client");

    let result = client.call("echo", vec![], HashMap::new()).await;
    assert!(matches!(result, Err(rpc_core::error::RpcError::Timeout)));
}

#[tokio::test]
async fn send_is_fire_and_forget() {
    let settings = Settings::default();
    let port = free_port();

    let server = rpc_direct::bind_server(&settings, port).expect("bind server");
    let bound_url = server.bound_url().to_string();

    tokio::spawn(async move {
        let request = server.get_request().await.expect("get_request");
        assert_eq!(request.function, "log");
        assert!(request.reply_to.is_none());
    });

    let client = rpc_direct::connect_client(&settings, ClientAddr::from_url(bound_url)).expect("connect client");
    client
        .send("log", vec![Value::Str("hi".into())], HashMap::new())
        .await
        .expect("send");

    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
}
