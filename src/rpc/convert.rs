//! Conversion between wire messages and domain types.
//!
//! Wire messages are flat, serializable records. Handlers often want richer
//! domain types instead (parsed timestamps, validated identifiers, decimal
//! amounts). [`HandlerRegistry::register_converted`] puts a conversion step
//! on both sides of a domain handler, so the codec only ever sees wire
//! messages.
//!
//! ```text
//! body ──decode──► A ──into_domain──► A::Domain ──handler──► R::Domain
//! R::Domain ──from_domain──► R ──encode──► body
//! ```
//!
//! A failed `into_domain` becomes the response error; the handler never
//! runs.

use std::future::Future;

use super::HandlerRegistry;
use crate::codec::Message;

/// Wire message that converts into a domain value.
pub trait IntoDomain {
    /// The domain type.
    type Domain;

    /// Convert, or explain why the wire value is not acceptable.
    fn into_domain(self) -> std::result::Result<Self::Domain, String>;
}

/// Wire message built from a domain value.
pub trait FromDomain {
    /// The domain type.
    type Domain;

    /// Build the wire value.
    fn from_domain(value: Self::Domain) -> Self;
}

impl HandlerRegistry {
    /// Register a handler written against domain types.
    ///
    /// `A` and `R` are the wire argument and reply messages; they usually
    /// need to be named explicitly:
    ///
    /// ```ignore
    /// registry.register_converted::<CostRequest, CostReply, _, _>(
    ///     "Responder.GetCost",
    ///     |req: CostQuery| async move { responder.get_cost(req).await },
    /// );
    /// ```
    pub fn register_converted<A, R, F, Fut>(&mut self, name: &str, handler: F)
    where
        A: Message + Default + IntoDomain + 'static,
        R: Message + FromDomain + 'static,
        F: Fn(A::Domain) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R::Domain, String>> + Send + 'static,
    {
        self.register(name, move |args: A| {
            let pending = args.into_domain().map(&handler);
            async move {
                match pending {
                    Ok(fut) => fut.await.map(R::from_domain),
                    Err(e) => Err(e),
                }
            }
        });
    }
}
