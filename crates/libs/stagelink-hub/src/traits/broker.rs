use async_trait::async_trait;

use crate::error::HubError;

/// An inbound listening service accepting messages on registered channels.
///
/// Only the local transport hosts its own broker; the cloud side's broker
/// is the managed service itself.
#[async_trait]
pub trait HubBroker: Send + Sync {
    /// Begins serving. The returned future resolves only once the broker
    /// is stopped or fails to bind/listen.
    async fn start(&self) -> Result<(), HubError>;

    /// Signals the serving loop to terminate. Best-effort with respect to
    /// in-flight message dispatch; a no-op `Ok(())` when the broker never
    /// started.
    async fn stop(&self) -> Result<(), HubError>;
}
