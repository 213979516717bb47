mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use stagelink_hub::{HubBroker, HubClient};
use stagelink_iot::{Credentials, IotClient};
use stagelink_osc::{OscBroker, OscClient};

use crate::config::BridgeConfig;

#[derive(Parser, Debug)]
#[command(name = "stagelinkd", about = "stagelink bridge daemon", version)]
struct Args {
    #[arg(long, default_value = "stagelink.toml")]
    config: PathBuf,

    /// Default log filter; RUST_LOG overrides it.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(args.log_level.as_str()),
    )
    .init();

    let config = BridgeConfig::from_path(&args.config)
        .with_context(|| format!("cannot load config {:?}", args.config))?;
    run(config).await
}

async fn run(config: BridgeConfig) -> anyhow::Result<()> {
    let BridgeConfig { cloud, local } = config;

    // Wiring order follows the forwarding direction: the local client has
    // no peer, the cloud client may relay to it, and the broker may relay
    // to the cloud client.
    let local_client = local.client.map(|cfg| Arc::new(OscClient::new(cfg.endpoint())));
    if let Some(client) = &local_client {
        client.connect().await.context("local client connect")?;
    }

    let iot_client = match &cloud {
        Some(cfg) => {
            let mut built = IotClient::new(
                cfg.endpoint(),
                Credentials::new(&cfg.access_key, &cfg.secret_key),
                &cfg.ca_path,
                &cfg.client_id,
            );
            if let Some(peer) = &local_client {
                built = built.with_peer(peer.clone() as Arc<dyn HubClient>);
            }
            let client = Arc::new(built);
            client.connect().await.context("cloud client connect")?;
            if !cfg.channels.is_empty() {
                client
                    .subscribe(&cfg.channels)
                    .await
                    .context("cloud subscribe")?;
            }
            Some(client)
        }
        None => None,
    };

    let broker = local.broker.map(|cfg| {
        let mut built = OscBroker::new(cfg.endpoint(), cfg.channels);
        if let Some(peer) = &iot_client {
            built = built.with_peer(peer.clone() as Arc<dyn HubClient>);
        }
        Arc::new(built)
    });

    match &broker {
        Some(broker) => {
            let mut serve = tokio::spawn({
                let broker = Arc::clone(broker);
                async move { broker.start().await }
            });
            tokio::select! {
                // The serve loop only returns early on a start failure.
                result = &mut serve => result?.context("broker serve")?,
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    log::info!("stagelinkd: shutting down");
                    broker.stop().await.context("broker stop")?;
                    serve.await?.context("broker serve")?;
                }
            }
        }
        None => {
            tokio::signal::ctrl_c().await?;
            log::info!("stagelinkd: shutting down");
        }
    }

    if let Some(client) = &iot_client {
        client.disconnect().await.context("cloud disconnect")?;
    }
    if let Some(client) = &local_client {
        client.disconnect().await.context("local disconnect")?;
    }
    Ok(())
}
