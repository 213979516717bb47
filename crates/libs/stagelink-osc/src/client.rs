use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rosc::{OscMessage, OscPacket};
use tokio::net::UdpSocket;

use stagelink_hub::{payload, Channel, Endpoint, HubClient, HubError, Payload};

use crate::convert::arg_to_osc;

/// Publish-only client for the local OSC network.
///
/// `connect` binds an ephemeral UDP socket with broadcast enabled — there
/// is no broker to hold a session with, so the endpoint is simply where
/// every publish is sent. Receiving is [`crate::OscBroker`]'s job;
/// `subscribe` reports an unsupported operation.
pub struct OscClient {
    endpoint: Endpoint,
    socket: Mutex<Option<Arc<UdpSocket>>>,
}

impl OscClient {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            socket: Mutex::new(None),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn sender(&self) -> Option<Arc<UdpSocket>> {
        self.socket.lock().unwrap().clone()
    }
}

#[async_trait]
impl HubClient for OscClient {
    async fn connect(&self) -> Result<(), HubError> {
        if self.socket.lock().unwrap().is_some() {
            return Err(HubError::connection("already connected"));
        }

        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|err| HubError::connection(format!("cannot bind send socket: {err}")))?;
        socket
            .set_broadcast(true)
            .map_err(|err| HubError::connection(format!("cannot enable broadcast: {err}")))?;

        log::info!("osc: send socket up for {}", self.endpoint);
        *self.socket.lock().unwrap() = Some(Arc::new(socket));
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), HubError> {
        // Dropping the socket is the whole teardown; absent socket included.
        self.socket.lock().unwrap().take();
        Ok(())
    }

    async fn publish(&self, channel: &str, payload: Payload) -> Result<(), HubError> {
        let socket = self
            .sender()
            .ok_or_else(|| HubError::publish(channel, "not connected"))?;

        let args = match payload {
            Payload::Args(args) => args,
            Payload::Text(text) => payload::decode_args(&text)?,
        };

        let message = OscPacket::Message(OscMessage {
            addr: channel.to_string(),
            args: args.iter().map(arg_to_osc).collect(),
        });
        let frame = rosc::encoder::encode(&message)
            .map_err(|err| HubError::publish(channel, format!("encode failed: {err:?}")))?;

        log::trace!("osc: tx >> {channel} ({} bytes)", frame.len());
        socket
            .send_to(&frame, (self.endpoint.host(), self.endpoint.port()))
            .await
            .map_err(|err| HubError::publish(channel, err))?;
        Ok(())
    }

    async fn subscribe(&self, _channels: &[Channel]) -> Result<(), HubError> {
        Err(HubError::unsupported("subscribe on the local transport"))
    }
}
