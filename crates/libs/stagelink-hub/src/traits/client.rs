use async_trait::async_trait;

use crate::error::HubError;
use crate::types::{Channel, Payload};

/// An outbound pub/sub endpoint on one of the two transports.
///
/// `connect` must succeed exactly once before `publish` or `subscribe` are
/// meaningful; both return typed errors on an unconnected client. A client
/// may hold a peer `Arc<dyn HubClient>` from the other transport and relay
/// inbound messages to it — peers are set once at construction and never
/// exchanged afterwards.
///
/// Implementations must be safe to share across tasks: concurrent
/// `publish` calls on the same client are relayed from the peer transport's
/// dispatch context.
#[async_trait]
pub trait HubClient: Send + Sync {
    /// Establishes the transport session against the configured endpoint.
    async fn connect(&self) -> Result<(), HubError>;

    /// Tears down the session. A no-op `Ok(())` when nothing was ever
    /// connected, so teardown paths can run unconditionally.
    async fn disconnect(&self) -> Result<(), HubError>;

    /// Sends `payload` on `channel`, normalizing the payload to this
    /// transport's native representation first.
    async fn publish(&self, channel: &str, payload: Payload) -> Result<(), HubError>;

    /// Registers interest in `channels`, in order, binding each to the
    /// client's inbound-message callback. Fail-fast: the first failing
    /// channel aborts registration of the remainder; channels already
    /// registered stay registered.
    async fn subscribe(&self, channels: &[Channel]) -> Result<(), HubError>;
}
