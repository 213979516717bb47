//! Cloud transport client for the stagelink bridge.
//!
//! [`IotClient`] implements [`stagelink_hub::HubClient`] over MQTT with the
//! operating profile of a managed IoT broker: TLS against a provided CA
//! file, credential passthrough, QoS 1 on every publish and subscribe,
//! bounded-doubling reconnect backoff, and offline publish queueing with a
//! drain throttle. Inbound messages on subscribed topics are relayed to an
//! optional peer client from the local transport.

pub mod client;
pub mod credentials;

pub use client::IotClient;
pub use credentials::Credentials;
