//! Local transport for the stagelink bridge.
//!
//! The local device network has no central broker: publishing is a direct
//! (possibly broadcast) UDP send of an OSC message, and receiving is a
//! self-hosted listening service. Accordingly this crate provides two
//! halves:
//!
//! - [`OscClient`] — publish-only [`stagelink_hub::HubClient`] over a
//!   broadcast-capable UDP send socket
//! - [`OscBroker`] — [`stagelink_hub::HubBroker`] binding a UDP socket,
//!   matching inbound message addresses against configured channel
//!   patterns, and relaying matches to an optional cloud-transport peer

pub mod broker;
pub mod client;
mod convert;

pub use broker::OscBroker;
pub use client::OscClient;
