//! Handler registry for dispatching requests by method name.
//!
//! The registry maps `"Service.Method"` names to type-erased handlers. A
//! handler is split in two steps so the codec can decode straight into the
//! handler's own argument value:
//!
//! 1. [`Handler::prepare`] allocates an [`Invocation`] holding a default
//!    argument value.
//! 2. The server decodes the request body into [`Invocation::args`], then
//!    runs [`Invocation::invoke`] on its own task.
//!
//! # Example
//!
//! ```
//! use framewire::rpc::HandlerRegistry;
//!
//! let mut registry = HandlerRegistry::new();
//!
//! registry.register("Echo.Echo", |msg: String| async move { Ok::<_, String>(msg) });
//!
//! assert!(registry.get_handler("Echo.Echo").is_some());
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::Arc;

use crate::codec::{Decode, Encode, Message};

/// Outcome of a handler: the reply, or the error string sent to the caller.
pub type HandlerResult = std::result::Result<Box<dyn Encode>, String>;

/// Boxed future for handler results.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A registered method.
pub trait Handler: Send + Sync + 'static {
    /// Start a call: allocate the argument value the body is decoded into.
    fn prepare(&self) -> Box<dyn Invocation>;
}

/// One pending call of a [`Handler`].
pub trait Invocation: Send {
    /// Decode target for the request body.
    fn args(&mut self) -> &mut dyn Decode;

    /// Run the handler with the decoded arguments.
    fn invoke(self: Box<Self>) -> BoxFuture<'static, HandlerResult>;
}

/// Wrapper that adapts a typed async function to [`Handler`].
pub struct TypedHandler<F, A, R, Fut> {
    handler: Arc<F>,
    _phantom: PhantomData<fn(A) -> (R, Fut)>,
}

impl<F, A, R, Fut> TypedHandler<F, A, R, Fut>
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    A: Message + Default + 'static,
    R: Message + 'static,
    Fut: Future<Output = std::result::Result<R, String>> + Send + 'static,
{
    /// Create a new typed handler.
    pub fn new(handler: F) -> Self {
        Self {
            handler: Arc::new(handler),
            _phantom: PhantomData,
        }
    }
}

impl<F, A, R, Fut> Handler for TypedHandler<F, A, R, Fut>
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    A: Message + Default + 'static,
    R: Message + 'static,
    Fut: Future<Output = std::result::Result<R, String>> + Send + 'static,
{
    fn prepare(&self) -> Box<dyn Invocation> {
        Box::new(TypedInvocation {
            handler: Arc::clone(&self.handler),
            args: A::default(),
            _phantom: PhantomData::<fn() -> (R, Fut)>,
        })
    }
}

struct TypedInvocation<F, A, R, Fut> {
    handler: Arc<F>,
    args: A,
    _phantom: PhantomData<fn() -> (R, Fut)>,
}

impl<F, A, R, Fut> Invocation for TypedInvocation<F, A, R, Fut>
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    A: Message + Default + 'static,
    R: Message + 'static,
    Fut: Future<Output = std::result::Result<R, String>> + Send + 'static,
{
    fn args(&mut self) -> &mut dyn Decode {
        &mut self.args
    }

    fn invoke(self: Box<Self>) -> BoxFuture<'static, HandlerResult> {
        let TypedInvocation { handler, args, .. } = *self;
        let fut = (*handler)(args);
        Box::pin(async move { fut.await.map(|reply| Box::new(reply) as Box<dyn Encode>) })
    }
}

/// Registry mapping method names to handlers.
#[derive(Default)]
pub struct HandlerRegistry {
    methods: HashMap<String, Box<dyn Handler>>,
}

impl HandlerRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a method handler.
    ///
    /// The handler receives the decoded arguments and returns the reply or
    /// an error string. Registering a name twice replaces the earlier
    /// handler.
    pub fn register<F, A, R, Fut>(&mut self, name: &str, handler: F)
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        A: Message + Default + 'static,
        R: Message + 'static,
        Fut: Future<Output = std::result::Result<R, String>> + Send + 'static,
    {
        self.methods
            .insert(name.to_string(), Box::new(TypedHandler::new(handler)));
    }

    /// Get a handler by method name.
    pub fn get_handler(&self, name: &str) -> Option<&dyn Handler> {
        self.methods.get(name).map(|h| h.as_ref())
    }

    /// Registered method names, in no particular order.
    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.keys().map(String::as_str)
    }

    /// Number of registered methods.
    pub fn len(&self) -> usize {
        self.methods.len()
    }

    /// Check if no methods are registered.
    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}
