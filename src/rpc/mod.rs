//! Reference dispatch runtime built on the codec traits.
//!
//! - [`Server`] - owns a [`HandlerRegistry`] and serves connections
//! - [`Client`] - sequence numbering and the pending-call table
//! - [`IntoDomain`] / [`FromDomain`] - wire/domain conversion for handlers
//!
//! The runtime talks to connections only through
//! [`RequestReader`](crate::codec::RequestReader),
//! [`ResponseWriter`](crate::codec::ResponseWriter),
//! [`RequestWriter`](crate::codec::RequestWriter) and
//! [`ResponseReader`](crate::codec::ResponseReader). There are no timeouts
//! or retries at this level.

mod client;
mod convert;
mod registry;
mod server;

pub use client::Client;
pub use convert::{FromDomain, IntoDomain};
pub use registry::{BoxFuture, Handler, HandlerRegistry, HandlerResult, Invocation, TypedHandler};
pub use server::{Server, ServerBuilder};
