use serde::Deserialize;
use std::net::SocketAddr;
use std::time::Duration;

use crate::pdu::{version, Address, BindType};

/// Root configuration for the smpp-session binary
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Inbound SMPP server
    pub server: Option<ServerConfig>,

    /// Outbound client sessions
    #[serde(default)]
    pub clients: Vec<SessionConfig>,

    /// Logging settings
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Per-session configuration.
///
/// Used as-is by clients; the server derives one per accepted bind from
/// its [`ServerConfig`] defaults and the bind request.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Session name (for logging)
    #[serde(default = "default_session_name")]
    pub name: String,

    /// Bind variant
    #[serde(default)]
    pub bind_type: BindType,

    /// Remote host
    #[serde(default = "default_host")]
    pub host: String,

    /// Remote port
    #[serde(default = "default_port")]
    pub port: u16,

    pub system_id: String,

    #[serde(default)]
    pub password: String,

    #[serde(default)]
    pub system_type: String,

    /// Requested interface version (0x34 = SMPP 3.4)
    #[serde(default = "default_interface_version")]
    pub interface_version: u8,

    #[serde(default)]
    pub address_range: AddressRange,

    /// Maximum outstanding requests
    #[serde(default = "default_window_size")]
    pub window_size: usize,

    /// How long a send waits for a free window slot
    #[serde(default = "default_window_wait_timeout", with = "humantime_serde")]
    pub window_wait_timeout: Duration,

    #[serde(default = "default_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    /// How long to wait for the bind response
    #[serde(default = "default_bind_timeout", with = "humantime_serde")]
    pub bind_timeout: Duration,

    /// Upper bound on a single write to the transport
    #[serde(default, with = "humantime_serde")]
    pub write_timeout: Option<Duration>,

    /// Requests without a response after this long are expired
    #[serde(default, with = "humantime_serde")]
    pub request_expiry_timeout: Option<Duration>,

    /// Expiry sweep period (defaults to the expiry timeout)
    #[serde(default, with = "humantime_serde")]
    pub window_monitor_interval: Option<Duration>,

    /// Keep per-session traffic counters
    #[serde(default)]
    pub counters_enabled: bool,

    /// Keepalive period used by the binary
    #[serde(default, with = "humantime_serde")]
    pub enquire_link_interval: Option<Duration>,

    /// TLS configuration
    pub tls: Option<TlsConfig>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            name: default_session_name(),
            bind_type: BindType::default(),
            host: default_host(),
            port: default_port(),
            system_id: String::new(),
            password: String::new(),
            system_type: String::new(),
            interface_version: default_interface_version(),
            address_range: AddressRange::default(),
            window_size: default_window_size(),
            window_wait_timeout: default_window_wait_timeout(),
            connect_timeout: default_connect_timeout(),
            bind_timeout: default_bind_timeout(),
            write_timeout: None,
            request_expiry_timeout: None,
            window_monitor_interval: None,
            counters_enabled: false,
            enquire_link_interval: None,
            tls: None,
        }
    }
}

impl SessionConfig {
    /// `host:port` to connect to.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// address_range of a bind request
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct AddressRange {
    #[serde(default)]
    pub ton: u8,
    #[serde(default)]
    pub npi: u8,
    #[serde(default)]
    pub range: String,
}

impl From<&AddressRange> for Address {
    fn from(range: &AddressRange) -> Self {
        Address::new(range.ton, range.npi, range.range.clone())
    }
}

impl From<&Address> for AddressRange {
    fn from(address: &Address) -> Self {
        Self {
            ton: address.ton,
            npi: address.npi,
            range: address.address.clone(),
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Server name (for logging)
    #[serde(default = "default_server_name")]
    pub name: String,

    /// Bind address
    pub address: SocketAddr,

    /// system_id returned in bind responses
    #[serde(default = "default_server_system_id")]
    pub system_id: String,

    /// Highest interface version the server speaks
    #[serde(default = "default_interface_version")]
    pub interface_version: u8,

    /// Normalize the client's requested version to 3.3 or 3.4
    #[serde(default = "default_true")]
    pub auto_negotiate_interface_version: bool,

    /// Maximum concurrent connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Time an accepted connection has to send its bind
    #[serde(default = "default_bind_timeout", with = "humantime_serde")]
    pub bind_timeout: Duration,

    #[serde(default = "default_window_size")]
    pub default_window_size: usize,

    #[serde(default = "default_window_wait_timeout", with = "humantime_serde")]
    pub default_window_wait_timeout: Duration,

    #[serde(default, with = "humantime_serde")]
    pub default_request_expiry_timeout: Option<Duration>,

    #[serde(default, with = "humantime_serde")]
    pub default_window_monitor_interval: Option<Duration>,

    #[serde(default, with = "humantime_serde")]
    pub default_write_timeout: Option<Duration>,

    #[serde(default)]
    pub counters_enabled: bool,

    /// TLS configuration
    pub tls: Option<TlsConfig>,
}

impl ServerConfig {
    /// Server config listening on `address` with every other field defaulted.
    pub fn new(address: SocketAddr) -> Self {
        Self {
            name: default_server_name(),
            address,
            system_id: default_server_system_id(),
            interface_version: default_interface_version(),
            auto_negotiate_interface_version: true,
            max_connections: default_max_connections(),
            bind_timeout: default_bind_timeout(),
            default_window_size: default_window_size(),
            default_window_wait_timeout: default_window_wait_timeout(),
            default_request_expiry_timeout: None,
            default_window_monitor_interval: None,
            default_write_timeout: None,
            counters_enabled: false,
            tls: None,
        }
    }
}

/// TLS configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM), server side
    pub cert: Option<String>,

    /// Path to private key file (PEM), server side
    pub key: Option<String>,

    /// Path to CA bundle used to verify the server, client side
    pub ca: Option<String>,

    /// Name to verify the server certificate against (defaults to host)
    pub server_name: Option<String>,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    /// Default log filter (overridden by RUST_LOG)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Emit JSON log lines
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

fn default_session_name() -> String {
    "default".to_string()
}

fn default_server_name() -> String {
    "smpp-server".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    2775
}

fn default_server_system_id() -> String {
    "smpp".to_string()
}

fn default_interface_version() -> u8 {
    version::VERSION_3_4
}

fn default_window_size() -> usize {
    1
}

fn default_window_wait_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_bind_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_max_connections() -> usize {
    100
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}
