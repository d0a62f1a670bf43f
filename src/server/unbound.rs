//! Pre-bind handling of an accepted connection.
//!
//! Until a bind arrives only enquire_link is answered; anything else, a
//! decode failure, or the bind timeout closes the connection.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, info, warn};

use crate::pdu::{Body, CommandId, Decoded, Pdu, Status};
use crate::session::{
    bind, framed, BoxedIo, PduReader, PduWriter, Session, SessionId, SessionParts, SessionRole,
    SessionState,
};
use crate::telemetry::counters as metrics;

use super::{ServerInner, ServerLink};

pub(super) async fn serve(
    server: Arc<ServerInner>,
    session_id: SessionId,
    io: BoxedIo,
    peer: SocketAddr,
    permit: OwnedSemaphorePermit,
) {
    let (mut reader, mut writer) = framed(io);
    let mut shutdown = server.shutdown.subscribe();
    let deadline = tokio::time::sleep(server.config.bind_timeout);
    tokio::pin!(deadline);

    loop {
        let next = tokio::select! {
            biased;

            _ = shutdown.wait_for(|stopped| *stopped) => {
                debug!("server stopping, closing unbound connection");
                return;
            }

            _ = &mut deadline => {
                warn!(timeout = ?server.config.bind_timeout, "no bind request in time, closing");
                server.counters.inc_bind_timeouts();
                metrics::server_bind_timeout(&server.config.name);
                return;
            }

            next = reader.next() => next,
        };

        let pdu = match next {
            Some(Ok(Decoded::Pdu(pdu))) => pdu,
            Some(Ok(Decoded::Recoverable(e))) => {
                warn!(error = %e, "undecodable pdu before bind, closing");
                return;
            }
            Some(Err(e)) => {
                warn!(error = %e, "read error before bind, closing");
                return;
            }
            None => {
                debug!("peer closed before binding");
                return;
            }
        };

        if matches!(pdu.body, Body::Bind(_)) {
            bind_requested(server, session_id, pdu, peer, reader, writer, permit).await;
            return;
        }

        if pdu.command_id() != CommandId::EnquireLink {
            warn!(command = pdu.name(), "only bind or enquire_link allowed before bind, closing");
            return;
        }
        let Some(response) = pdu.create_response() else {
            return;
        };
        if let Err(e) = writer.send(response).await {
            debug!(error = %e, "failed to answer enquire_link");
            return;
        }
    }
}

async fn bind_requested(
    server: Arc<ServerInner>,
    session_id: SessionId,
    bind_request: Pdu,
    peer: SocketAddr,
    reader: PduReader,
    mut writer: PduWriter,
    permit: OwnedSemaphorePermit,
) {
    server.counters.inc_bind_requests();

    let Body::Bind(request) = &bind_request.body else {
        return;
    };
    let Some(mut config) = bind::derive_session_config(&server.config, &bind_request, peer) else {
        return;
    };
    let bind_type = request.bind_type.as_str();
    info!(
        system_id = %request.system_id,
        bind_type,
        interface_version = format_args!("0x{:02X}", request.interface_version),
        "bind requested"
    );

    if let Err(rejection) = server
        .handler
        .on_bind_requested(session_id, &mut config, &bind_request)
        .await
    {
        warn!(status = %rejection.status, reason = %rejection.message, "bind rejected");
        server.counters.inc_sessions_rejected();
        metrics::server_bind(&server.config.name, bind_type, "rejected");

        let status = if rejection.status.is_ok() {
            Status::BINDFAIL
        } else {
            rejection.status
        };
        if let Some(response) = bind::build_bind_response(
            &bind_request,
            &server.config.system_id,
            server.config.interface_version,
            status,
        ) {
            if let Err(e) = writer.send(response).await {
                debug!(error = %e, "failed to send bind rejection");
            }
        }
        return;
    }

    let negotiated = bind::negotiate_server_version(
        request.interface_version,
        server.config.auto_negotiate_interface_version,
    );
    let Some(prepared) = bind::build_bind_response(
        &bind_request,
        &server.config.system_id,
        server.config.interface_version,
        Status::OK,
    ) else {
        return;
    };

    let session = Session::spawn(
        SessionParts {
            id: session_id,
            role: SessionRole::Server,
            config,
            state: SessionState::Binding,
            readable: false,
            handler: None,
            observers: Vec::new(),
            interface_version: Some(negotiated),
            prepared_bind_response: Some(prepared.clone()),
            destroy_listener: Some(Arc::new(ServerLink(Arc::downgrade(&server)))),
            permit: Some(permit),
        },
        reader,
        writer,
    );

    server.register(session.clone()).await;
    metrics::server_bind(&server.config.name, bind_type, "ok");
    info!(
        interface_version = format_args!("0x{:02X}", negotiated),
        "session created"
    );

    server
        .handler
        .on_session_created(session_id, session, prepared)
        .await;
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use tokio::net::TcpStream;
    use tokio_util::codec::Framed;

    use super::*;
    use crate::config::ServerConfig;
    use crate::pdu::SmppCodec;
    use crate::server::{ServerHandler, SmppServer};

    struct Accept;

    #[async_trait]
    impl ServerHandler for Accept {
        async fn on_session_created(&self, _id: SessionId, session: Session, _resp: Pdu) {
            session
                .server_ready(Arc::new(crate::session::DefaultSessionHandler))
                .await
                .unwrap();
        }
    }

    async fn start(bind_timeout: Duration) -> (SmppServer, Framed<TcpStream, SmppCodec>) {
        let config = ServerConfig {
            bind_timeout,
            ..ServerConfig::new("127.0.0.1:0".parse().unwrap())
        };
        let server = SmppServer::new(config, Arc::new(Accept)).unwrap();
        let addr = server.start().await.unwrap();
        let stream = TcpStream::connect(addr).await.unwrap();
        (server, Framed::new(stream, SmppCodec::new()))
    }

    async fn expect_closed(peer: &mut Framed<TcpStream, SmppCodec>) {
        let next = tokio::time::timeout(Duration::from_secs(2), peer.next())
            .await
            .expect("connection should close");
        assert!(next.is_none() || matches!(next, Some(Err(_))));
    }

    #[tokio::test]
    async fn test_enquire_link_answered_before_bind() {
        let (server, mut peer) = start(Duration::from_secs(5)).await;
        peer.send(Pdu::enquire_link().with_sequence(11)).await.unwrap();

        match peer.next().await {
            Some(Ok(Decoded::Pdu(resp))) => {
                assert_eq!(resp.command_id(), CommandId::EnquireLinkResp);
                assert_eq!(resp.sequence_number, Some(11));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(server.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_other_requests_close_before_bind() {
        let (server, mut peer) = start(Duration::from_secs(5)).await;
        peer.send(Pdu::submit_sm(Default::default()).with_sequence(1))
            .await
            .unwrap();

        expect_closed(&mut peer).await;
        assert_eq!(server.counters().snapshot().bind_requests, 0);
    }

    #[tokio::test]
    async fn test_bind_timeout_closes_and_counts() {
        let (server, mut peer) = start(Duration::from_millis(50)).await;

        expect_closed(&mut peer).await;
        assert_eq!(server.counters().snapshot().bind_timeouts, 1);
        assert_eq!(server.counters().snapshot().sessions_created, 0);
    }
}
