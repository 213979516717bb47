use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rosc::address::{Matcher, OscAddress};
use rosc::{OscMessage, OscPacket};
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

use stagelink_hub::{Arg, Channel, Endpoint, HubBroker, HubClient, HubError, Payload};

use crate::convert::osc_to_arg;

/// Largest payload a UDP datagram can carry.
const MAX_DATAGRAM: usize = 65_507;

struct BrokerHandle {
    cancel: CancellationToken,
    local_addr: SocketAddr,
}

/// Listening service for the local OSC network.
///
/// `start` compiles the configured channel patterns into address matchers,
/// binds a UDP socket on the endpoint, and serves until stopped. Each
/// message whose address matches a registered pattern is dispatched on its
/// own task; with a cloud-transport peer configured, dispatch relays the
/// message through `peer.publish` with the concrete address as channel.
pub struct OscBroker {
    endpoint: Endpoint,
    channels: Vec<Channel>,
    peer: Option<Arc<dyn HubClient>>,
    handle: Mutex<Option<BrokerHandle>>,
}

impl OscBroker {
    pub fn new(endpoint: Endpoint, channels: Vec<Channel>) -> Self {
        Self {
            endpoint,
            channels,
            peer: None,
            handle: Mutex::new(None),
        }
    }

    /// Sets the cloud-transport peer that matching messages are relayed to.
    pub fn with_peer(mut self, peer: Arc<dyn HubClient>) -> Self {
        self.peer = Some(peer);
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn channels(&self) -> &[Channel] {
        &self.channels
    }

    /// The bound address while serving. With a port-0 endpoint this is how
    /// the chosen port is learned.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.handle.lock().unwrap().as_ref().map(|h| h.local_addr)
    }

    fn dispatch_datagram(&self, matchers: &[(Channel, Matcher)], data: &[u8], from: SocketAddr) {
        let packet = match rosc::decoder::decode_udp(data) {
            Ok((_, packet)) => packet,
            Err(err) => {
                // Malformed datagrams cost nothing but this log line.
                log::warn!("osc: malformed datagram from {from}: {err:?}");
                return;
            }
        };

        let mut messages = Vec::new();
        collect_messages(packet, &mut messages);

        for message in messages {
            let address = match OscAddress::new(message.addr.clone()) {
                Ok(address) => address,
                Err(err) => {
                    log::warn!("osc: malformed address {:?} from {from}: {err:?}", message.addr);
                    continue;
                }
            };

            if !matchers.iter().any(|(_, m)| m.match_address(&address)) {
                log::trace!("osc: no channel registered for {}", message.addr);
                continue;
            }

            self.dispatch_message(message);
        }
    }

    fn dispatch_message(&self, message: OscMessage) {
        let Some(peer) = &self.peer else {
            log::debug!("osc: message on {}, no peer configured", message.addr);
            return;
        };

        let mut args: Vec<Arg> = Vec::with_capacity(message.args.len());
        for osc in &message.args {
            match osc_to_arg(osc) {
                Some(arg) => args.push(arg),
                None => log::warn!("osc: skipping non-scalar argument on {}", message.addr),
            }
        }

        let peer = Arc::clone(peer);
        let channel = message.addr;
        tokio::spawn(async move {
            log::trace!("osc: rx << {channel} ({} args)", args.len());
            if let Err(err) = peer.publish(&channel, Payload::Args(args)).await {
                // Isolated per message so one bad forward cannot take the
                // listening service down with it.
                log::warn!("osc: forwarding on {channel} failed: {err}");
            }
        });
    }
}

#[async_trait]
impl HubBroker for OscBroker {
    async fn start(&self) -> Result<(), HubError> {
        if self.handle.lock().unwrap().is_some() {
            return Err(HubError::start("already started"));
        }

        let mut matchers = Vec::with_capacity(self.channels.len());
        for channel in &self.channels {
            let matcher = Matcher::new(channel).map_err(|err| {
                HubError::start(format!("invalid channel pattern {channel:?}: {err:?}"))
            })?;
            matchers.push((channel.clone(), matcher));
        }

        let socket = UdpSocket::bind((self.endpoint.host(), self.endpoint.port()))
            .await
            .map_err(|err| {
                HubError::start(format!("cannot bind {}: {err}", self.endpoint))
            })?;
        let local_addr = socket
            .local_addr()
            .map_err(|err| HubError::start(err.to_string()))?;

        let cancel = CancellationToken::new();
        *self.handle.lock().unwrap() = Some(BrokerHandle {
            cancel: cancel.clone(),
            local_addr,
        });

        log::info!(
            "osc: broker bound to {local_addr}, {} channel(s) registered",
            matchers.len()
        );

        let mut buf = vec![0u8; MAX_DATAGRAM];
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                received = socket.recv_from(&mut buf) => match received {
                    Ok((len, from)) => self.dispatch_datagram(&matchers, &buf[..len], from),
                    Err(err) => log::warn!("osc: receive error: {err}"),
                },
            }
        }

        self.handle.lock().unwrap().take();
        log::info!("osc: broker on {local_addr} stopped");
        Ok(())
    }

    /// Best-effort: in-flight dispatch tasks are not drained.
    async fn stop(&self) -> Result<(), HubError> {
        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle.cancel.cancel();
        }
        Ok(())
    }
}

fn collect_messages(packet: OscPacket, out: &mut Vec<OscMessage>) {
    match packet {
        OscPacket::Message(message) => out.push(message),
        OscPacket::Bundle(bundle) => {
            for inner in bundle.content {
                collect_messages(inner, out);
            }
        }
    }
}
