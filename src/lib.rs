//! SMPP session engine.
//!
//! Bind handshake, sequence allocation, request/response correlation over
//! a bounded window, request expiry and channel teardown for both the
//! client (ESME) and server (SMSC) side of a connection.

pub mod client;
pub mod config;
pub mod pdu;
pub mod server;
pub mod session;
pub mod telemetry;
pub mod tls;

pub use client::SmppClient;
pub use config::{Config, ServerConfig, SessionConfig};
pub use pdu::{Body, CommandId, Pdu, Status};
pub use server::{ServerHandler, SmppServer};
pub use session::{Session, SessionError, SessionHandler, SessionState};
