//! Contract layer for the stagelink bridge.
//!
//! This crate defines the transport-agnostic half of the bridge between the
//! cloud message network (MQTT/IoT) and the local device network (OSC over
//! UDP). It provides:
//!
//! - **Boundary types** — [`Endpoint`], [`Channel`], the [`Arg`] scalar
//!   model and the two-representation [`Payload`]
//! - **Async trait definitions** — [`HubClient`] for outbound endpoints,
//!   [`HubBroker`] for inbound listening services
//! - **[`HubError`]** — the full error taxonomy shared by both transports
//! - **Payload translation** — [`payload::encode_args`] /
//!   [`payload::decode_args`], the JSON-text ⇄ argument-list conversion
//!   applied when a message crosses from one transport to the other
//!
//! Concrete transports live in `stagelink-iot` (cloud) and `stagelink-osc`
//! (local). Either side may hold an `Arc<dyn HubClient>` peer from the
//! other side; inbound messages are relayed through it.

pub mod error;
pub mod payload;
pub mod traits;
pub mod types;

pub use error::HubError;
pub use traits::{HubBroker, HubClient};
pub use types::{Arg, Channel, Endpoint, Payload};
