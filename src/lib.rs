//! # framewire
//!
//! Framed MessagePack RPC transport over a single persistent duplex stream.
//!
//! A client invokes a named remote method (`"Service.Method"`) and receives
//! a typed reply or an application error string. Every logical message is
//! two length-prefixed frames on the wire:
//!
//! ```text
//! ┌────────┬──────────────┬────────┬──────────────┐
//! │ uvarint│ header bytes │ uvarint│ body bytes   │
//! └────────┴──────────────┴────────┴──────────────┘
//! ```
//!
//! ## Layers
//!
//! - [`transport`] - frame reader/writer over buffered tokio streams
//! - [`codec`] - marshal helper and the client/server codecs
//! - [`protocol`] - request/response headers and varints
//! - [`rpc`] - a minimal dispatch runtime on top of the codecs
//! - [`driver`] - TCP accept loop and dial helpers
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use framewire::{driver, CodecConfig, Server};
//!
//! #[tokio::main]
//! async fn main() -> framewire::Result<()> {
//!     let server = Server::builder()
//!         .handle("Echo.Echo", |msg: String| async move { Ok::<_, String>(msg) })
//!         .build();
//!     tokio::spawn(driver::listen_and_serve("127.0.0.1:7000", Arc::new(server)));
//!
//!     let client = driver::dial("127.0.0.1:7000", &CodecConfig::default()).await?;
//!     let reply: String = client.call("Echo.Echo", &"hello".to_string()).await?;
//!     assert_eq!(reply, "hello");
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod driver;
pub mod error;
pub mod protocol;
pub mod rpc;
pub mod transport;

pub use codec::Message;
pub use config::CodecConfig;
pub use error::{FramewireError, Result};
pub use rpc::{Client, Server};
