mod broker;
mod client;

pub use broker::HubBroker;
pub use client::HubClient;
