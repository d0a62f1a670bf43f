use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use super::types::{Config, SessionConfig};
use crate::pdu::version;

impl Config {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        debug!(path = %path.display(), "loading configuration");

        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        Self::from_yaml(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)
            .context("failed to parse YAML configuration")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.server.is_none() && self.clients.is_empty() {
            anyhow::bail!("at least one of server or clients must be defined");
        }

        if let Some(server) = &self.server {
            if server.system_id.is_empty() {
                anyhow::bail!("server '{}' has an empty system_id", server.name);
            }
            if server.default_window_size == 0 {
                anyhow::bail!("server '{}' default_window_size must be at least 1", server.name);
            }
            if server.max_connections == 0 {
                anyhow::bail!("server '{}' max_connections must be at least 1", server.name);
            }
            check_version(&server.name, server.interface_version)?;
            if let Some(tls) = &server.tls {
                if tls.cert.is_none() || tls.key.is_none() {
                    anyhow::bail!("server '{}' tls requires cert and key", server.name);
                }
            }
        }

        let mut client_names = std::collections::HashSet::new();
        for client in &self.clients {
            if !client_names.insert(&client.name) {
                anyhow::bail!("duplicate client name: {}", client.name);
            }
            validate_session(client)?;
        }

        info!("configuration validated successfully");
        Ok(())
    }
}

fn validate_session(session: &SessionConfig) -> Result<()> {
    if session.system_id.is_empty() {
        anyhow::bail!("client '{}' has an empty system_id", session.name);
    }
    if session.window_size == 0 {
        anyhow::bail!("client '{}' window_size must be at least 1", session.name);
    }
    check_version(&session.name, session.interface_version)
}

fn check_version(name: &str, interface_version: u8) -> Result<()> {
    match interface_version {
        0x00..=version::VERSION_3_4 | version::VERSION_5_0 => Ok(()),
        other => anyhow::bail!("'{}' has unknown interface_version 0x{:02X}", name, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::BindType;
    use std::time::Duration;

    #[test]
    fn test_minimal_server_config() {
        let yaml = r#"
server:
  address: "127.0.0.1:2775"
"#;

        let config = Config::from_yaml(yaml).unwrap();
        let server = config.server.unwrap();
        assert_eq!(server.system_id, "smpp");
        assert_eq!(server.interface_version, 0x34);
        assert!(server.auto_negotiate_interface_version);
        assert_eq!(server.max_connections, 100);
        assert_eq!(server.bind_timeout, Duration::from_secs(5));
        assert_eq!(server.default_window_size, 1);
        assert!(config.clients.is_empty());
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn test_client_config() {
        let yaml = r#"
clients:
  - name: smsc-a
    host: smsc.example.com
    port: 2776
    system_id: user
    password: secret
    bind_type: transmitter
    interface_version: 52
    window_size: 10
    window_wait_timeout: 2s
    request_expiry_timeout: 30s
    window_monitor_interval: 5s
    enquire_link_interval: 30s
    address_range:
      ton: 1
      npi: 1
      range: "^44"
"#;

        let config = Config::from_yaml(yaml).unwrap();
        let client = &config.clients[0];
        assert_eq!(client.bind_type, BindType::Transmitter);
        assert_eq!(client.address(), "smsc.example.com:2776");
        assert_eq!(client.window_size, 10);
        assert_eq!(client.window_wait_timeout, Duration::from_secs(2));
        assert_eq!(client.request_expiry_timeout, Some(Duration::from_secs(30)));
        assert_eq!(client.bind_timeout, Duration::from_secs(5));
        assert_eq!(client.address_range.range, "^44");
        assert!(client.write_timeout.is_none());
    }

    #[test]
    fn test_empty_config_rejected() {
        let result = Config::from_yaml("clients: []\n");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("at least one of"));
    }

    #[test]
    fn test_duplicate_client_names() {
        let yaml = r#"
clients:
  - name: a
    system_id: one
  - name: a
    system_id: two
"#;

        let result = Config::from_yaml(yaml);
        assert!(result.unwrap_err().to_string().contains("duplicate client name"));
    }

    #[test]
    fn test_zero_window_rejected() {
        let yaml = r#"
clients:
  - system_id: user
    window_size: 0
"#;

        let result = Config::from_yaml(yaml);
        assert!(result.unwrap_err().to_string().contains("window_size"));
    }

    #[test]
    fn test_unknown_version_rejected() {
        let yaml = r#"
clients:
  - system_id: user
    interface_version: 64
"#;

        let result = Config::from_yaml(yaml);
        assert!(result.unwrap_err().to_string().contains("interface_version"));
    }
}
