//! Echo server and client - simple request/response example.
//!
//! This example demonstrates:
//! - Registering a typed method handler with the server builder
//! - Serving it over TCP with the connection driver
//! - Calling it from a client, including an application error
//!
//! # Running
//!
//! ```text
//! RUST_LOG=framewire=debug cargo run --example echo
//! ```

use std::sync::Arc;

use framewire::{driver, CodecConfig, FramewireError, Message, Server};
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Input structure for the echo method.
#[derive(Serialize, Deserialize, Default, Debug)]
struct EchoRequest {
    #[serde(rename = "Msg")]
    msg: String,
}

impl Message for EchoRequest {}

/// Output structure for the echo method.
#[derive(Serialize, Deserialize, Default, Debug)]
struct EchoReply {
    #[serde(rename = "Msg")]
    msg: String,
}

impl Message for EchoReply {}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let server = Server::builder()
        .handle("Echo.Echo", |req: EchoRequest| async move {
            if req.msg.is_empty() {
                return Err("empty message".to_string());
            }
            Ok(EchoReply { msg: req.msg })
        })
        .build();

    let listener = driver::listen("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(driver::serve(listener, Arc::new(server)));

    let client = driver::dial(addr, &CodecConfig::default()).await?;

    let reply: EchoReply = client
        .call(
            "Echo.Echo",
            &EchoRequest {
                msg: "hello".to_string(),
            },
        )
        .await?;
    println!("reply: {}", reply.msg);

    match client
        .call::<_, EchoReply>("Echo.Echo", &EchoRequest::default())
        .await
    {
        Err(FramewireError::Remote(msg)) => println!("remote error: {msg}"),
        other => println!("unexpected: {other:?}"),
    }

    client.close().await?;
    Ok(())
}
