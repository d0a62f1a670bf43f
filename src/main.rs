use anyhow::Result;
use async_trait::async_trait;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use smpp_session::config::{Config, SessionConfig};
use smpp_session::server::{ServerHandler, SmppServer};
use smpp_session::session::{DefaultSessionHandler, Session, SessionId};
use smpp_session::telemetry::{self, init_tracing, TracingConfig};
use smpp_session::{Pdu, SmppClient};

const UNBIND_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "smpp-session")]
#[command(author, version, about = "SMPP session endpoint")]
struct Args {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Validate config and exit
    #[arg(long)]
    validate: bool,
}

/// Accepts every bind and acknowledges every request.
struct AcceptAll;

#[async_trait]
impl ServerHandler for AcceptAll {
    async fn on_session_created(&self, session_id: SessionId, session: Session, _resp: Pdu) {
        if let Err(e) = session.server_ready(Arc::new(DefaultSessionHandler)).await {
            warn!(%session_id, error = %e, "failed to complete bind");
            session.destroy().await;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration first (to get log settings)
    let config = Config::load(&args.config)?;

    init_tracing(&TracingConfig::from(&config.telemetry))?;
    telemetry::counters::init(&opentelemetry::global::meter("smpp-session"));

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %args.config.display(),
        server = config.server.is_some(),
        clients = config.clients.len(),
        "configuration loaded"
    );

    if args.validate {
        info!("configuration is valid");
        return Ok(());
    }

    let server = match config.server.clone() {
        Some(server_config) => {
            let server = SmppServer::new(server_config, Arc::new(AcceptAll))?;
            let address = server.start().await?;
            info!(%address, "listening");
            Some(server)
        }
        None => None,
    };

    let client = SmppClient::new();
    let mut sessions = Vec::new();
    for session_config in config.clients.iter().cloned() {
        let name = session_config.name.clone();
        match client
            .bind(session_config.clone(), Arc::new(DefaultSessionHandler))
            .await
        {
            Ok(session) => {
                if let Some(interval) = session_config.enquire_link_interval {
                    tokio::spawn(keepalive(session.clone(), interval));
                }
                sessions.push(session);
            }
            Err(e) => error!(session = %name, error = %e, "bind failed"),
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("shutting down");

    for session in sessions {
        if let Err(e) = session.unbind(UNBIND_TIMEOUT).await {
            warn!(session = session.name(), error = %e, "unbind failed");
        }
        session.destroy().await;
    }
    if let Some(server) = server {
        server.stop().await;
    }

    Ok(())
}

/// Send enquire_link every `interval` until the session closes.
async fn keepalive(session: Session, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = session.closed() => return,
            _ = ticker.tick() => {}
        }
        if let Err(e) = session.enquire_link(timeout_for(session.config(), interval)).await {
            warn!(session = session.name(), error = %e, "enquire_link failed");
            if e.is_channel_error() {
                return;
            }
        }
    }
}

fn timeout_for(config: &SessionConfig, interval: Duration) -> Duration {
    config.request_expiry_timeout.unwrap_or(interval)
}
