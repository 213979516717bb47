use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use stagelink_hub::Endpoint;

/// Daemon configuration. Every section is optional: with no `[cloud]` the
/// broker runs as a passthrough logger, with no `[local.broker]` the
/// bridge is cloud→local only, and so on.
#[derive(Debug, Deserialize)]
pub struct BridgeConfig {
    pub cloud: Option<CloudConfig>,
    #[serde(default)]
    pub local: LocalConfig,
}

#[derive(Debug, Default, Deserialize)]
pub struct LocalConfig {
    pub broker: Option<LocalBrokerConfig>,
    pub client: Option<LocalClientConfig>,
}

#[derive(Debug, Deserialize)]
pub struct CloudConfig {
    pub host: String,
    pub port: u16,
    pub access_key: String,
    pub secret_key: String,
    pub ca_path: PathBuf,
    pub client_id: String,
    /// Cloud topics to subscribe to for cloud→local forwarding.
    #[serde(default)]
    pub channels: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct LocalBrokerConfig {
    pub host: String,
    pub port: u16,
    /// OSC address patterns to listen on.
    pub channels: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct LocalClientConfig {
    pub host: String,
    pub port: u16,
}

impl BridgeConfig {
    pub fn from_toml(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    }
}

impl CloudConfig {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(&self.host, self.port)
    }
}

impl LocalBrokerConfig {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(&self.host, self.port)
    }
}

impl LocalClientConfig {
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(&self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const FULL: &str = r#"
        [cloud]
        host = "example.iot.us-east-1.amazonaws.com"
        port = 8883
        access_key = "AKIA123"
        secret_key = "s3cr3t"
        ca_path = "/etc/stagelink/root-ca.pem"
        client_id = "bridge-01"
        channels = ["cmd/reset"]

        [local.broker]
        host = "0.0.0.0"
        port = 9000
        channels = ["/device/temp", "/device/*/status"]

        [local.client]
        host = "192.168.1.255"
        port = 9001
    "#;

    #[test]
    fn full_config_parses_both_directions() {
        let config = BridgeConfig::from_toml(FULL).unwrap();
        let cloud = config.cloud.unwrap();
        assert_eq!(cloud.endpoint().to_string(), "example.iot.us-east-1.amazonaws.com:8883");
        assert_eq!(cloud.channels, vec!["cmd/reset"]);

        let broker = config.local.broker.unwrap();
        assert_eq!(broker.endpoint().port(), 9000);
        assert_eq!(broker.channels.len(), 2);

        let client = config.local.client.unwrap();
        assert_eq!(client.endpoint().to_string(), "192.168.1.255:9001");
    }

    #[test]
    fn sections_are_optional() {
        let config = BridgeConfig::from_toml(
            r#"
            [local.broker]
            host = "0.0.0.0"
            port = 9000
            channels = ["/device/temp"]
            "#,
        )
        .unwrap();
        assert!(config.cloud.is_none());
        assert!(config.local.client.is_none());
        assert!(config.local.broker.is_some());

        let empty = BridgeConfig::from_toml("").unwrap();
        assert!(empty.cloud.is_none());
        assert!(empty.local.broker.is_none());
    }

    #[test]
    fn from_path_reads_a_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(FULL.as_bytes()).unwrap();
        let config = BridgeConfig::from_path(file.path()).unwrap();
        assert!(config.cloud.is_some());
    }

    #[test]
    fn invalid_toml_is_an_invalid_data_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"[cloud\nhost=").unwrap();
        let err = BridgeConfig::from_path(file.path()).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
