//! Event listeners

use crate::events::Event;
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

/// Receives dispatched events
///
/// An error is logged by the dispatcher and does not affect other listeners.
#[async_trait]
pub trait Listener: Send + Sync + 'static {
    async fn on_event(&self, event: Arc<Event>) -> anyhow::Result<()>;
}

#[async_trait]
impl<F, Fut> Listener for F
where
    F: Fn(Arc<Event>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    async fn on_event(&self, event: Arc<Event>) -> anyhow::Result<()> {
        (self)(event).await
    }
}
