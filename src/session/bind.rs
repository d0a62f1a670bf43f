//! Bind handshake helpers shared by the client and server sides.

use std::net::SocketAddr;

use crate::config::{AddressRange, ServerConfig, SessionConfig};
use crate::pdu::{tags, version, Bind, BindResp, Body, Pdu, Status, Tlv};

/// Bind request for `config`, without a sequence number.
pub fn build_bind_request(config: &SessionConfig) -> Pdu {
    Pdu::new(Body::Bind(Bind {
        bind_type: config.bind_type,
        system_id: config.system_id.clone(),
        password: config.password.clone(),
        system_type: config.system_type.clone(),
        interface_version: config.interface_version,
        address_range: (&config.address_range).into(),
    }))
}

/// Version a client settles on after a successful bind response.
///
/// An `sc_interface_version` of 0x34 or more means 3.4; any other value, or
/// no parameter at all, means 3.3.
pub fn negotiated_version_from_response(response: &Pdu) -> u8 {
    match response
        .optional_parameter(tags::SC_INTERFACE_VERSION)
        .and_then(Tlv::value_u8)
    {
        Some(v) if v >= version::VERSION_3_4 => version::VERSION_3_4,
        _ => version::VERSION_3_3,
    }
}

/// Version a server settles on for a requested one.
pub fn negotiate_server_version(requested: u8, auto_negotiate: bool) -> u8 {
    if !auto_negotiate {
        requested
    } else if requested >= version::VERSION_3_4 {
        version::VERSION_3_4
    } else {
        version::VERSION_3_3
    }
}

/// Response to `bind_request` carrying the server's system id.
///
/// `sc_interface_version` is attached only when both the server and the
/// client speak 3.4 or later. Returns `None` if `bind_request` is not a bind.
pub fn build_bind_response(
    bind_request: &Pdu,
    server_system_id: &str,
    server_version: u8,
    status: Status,
) -> Option<Pdu> {
    let Body::Bind(bind) = &bind_request.body else {
        return None;
    };

    let mut response = Pdu::new(Body::BindResp(BindResp {
        bind_type: bind.bind_type,
        system_id: server_system_id.to_string(),
    }))
    .with_status(status);
    response.sequence_number = bind_request.sequence_number;

    if status.is_ok()
        && server_version >= version::VERSION_3_4
        && bind.interface_version >= version::VERSION_3_4
    {
        response = response.with_tlv(Tlv::from_u8(tags::SC_INTERFACE_VERSION, server_version));
    }
    Some(response)
}

/// Session configuration for an inbound bind, seeded from the server's
/// defaults. Returns `None` if `bind_request` is not a bind.
pub fn derive_session_config(
    server: &ServerConfig,
    bind_request: &Pdu,
    peer: SocketAddr,
) -> Option<SessionConfig> {
    let Body::Bind(bind) = &bind_request.body else {
        return None;
    };

    Some(SessionConfig {
        name: format!("{}.{}.{}", server.name, bind.system_id, bind.system_type),
        bind_type: bind.bind_type,
        host: peer.ip().to_string(),
        port: peer.port(),
        system_id: bind.system_id.clone(),
        password: bind.password.clone(),
        system_type: bind.system_type.clone(),
        interface_version: bind.interface_version,
        address_range: AddressRange::from(&bind.address_range),
        window_size: server.default_window_size,
        window_wait_timeout: server.default_window_wait_timeout,
        bind_timeout: server.bind_timeout,
        write_timeout: server.default_write_timeout,
        request_expiry_timeout: server.default_request_expiry_timeout,
        window_monitor_interval: server.default_window_monitor_interval,
        counters_enabled: server.counters_enabled,
        ..SessionConfig::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::{BindType, CommandId};

    fn bind(interface_version: u8) -> Pdu {
        build_bind_request(&SessionConfig {
            system_id: "esme".into(),
            password: "pw".into(),
            interface_version,
            ..Default::default()
        })
        .with_sequence(1)
    }

    #[test]
    fn test_bind_request_from_config() {
        let config = SessionConfig {
            bind_type: BindType::Receiver,
            system_id: "esme".into(),
            system_type: "vma".into(),
            address_range: AddressRange {
                ton: 1,
                npi: 1,
                range: "44".into(),
            },
            ..Default::default()
        };
        let pdu = build_bind_request(&config);
        assert_eq!(pdu.command_id(), CommandId::BindReceiver);
        assert!(!pdu.has_sequence_number());
        let Body::Bind(b) = &pdu.body else { panic!("not a bind") };
        assert_eq!(b.system_type, "vma");
        assert_eq!(b.interface_version, 0x34);
        assert_eq!(b.address_range.address, "44");
    }

    #[test]
    fn test_server_version_negotiation() {
        assert_eq!(negotiate_server_version(0x34, true), 0x34);
        assert_eq!(negotiate_server_version(0x50, true), 0x34);
        assert_eq!(negotiate_server_version(0x33, true), 0x33);
        assert_eq!(negotiate_server_version(0x31, true), 0x33);
        assert_eq!(negotiate_server_version(0x31, false), 0x31);
        assert_eq!(negotiate_server_version(0x50, false), 0x50);
    }

    #[test]
    fn test_client_version_from_response() {
        let resp = bind(0x34).create_response().unwrap();
        assert_eq!(negotiated_version_from_response(&resp), 0x33);

        let with = resp.clone().with_tlv(Tlv::from_u8(tags::SC_INTERFACE_VERSION, 0x34));
        assert_eq!(negotiated_version_from_response(&with), 0x34);

        let newer = resp.clone().with_tlv(Tlv::from_u8(tags::SC_INTERFACE_VERSION, 0x50));
        assert_eq!(negotiated_version_from_response(&newer), 0x34);

        let older = resp.with_tlv(Tlv::from_u8(tags::SC_INTERFACE_VERSION, 0x33));
        assert_eq!(negotiated_version_from_response(&older), 0x33);
    }

    #[test]
    fn test_bind_response_interface_version_parameter() {
        let resp = build_bind_response(&bind(0x34), "smsc", 0x34, Status::OK).unwrap();
        assert_eq!(resp.command_id(), CommandId::BindTransceiverResp);
        assert_eq!(resp.sequence_number, Some(1));
        assert_eq!(
            resp.optional_parameter(tags::SC_INTERFACE_VERSION)
                .and_then(Tlv::value_u8),
            Some(0x34)
        );

        let resp = build_bind_response(&bind(0x31), "smsc", 0x34, Status::OK).unwrap();
        assert!(resp.tlvs.is_empty());

        let resp = build_bind_response(&bind(0x34), "smsc", 0x33, Status::OK).unwrap();
        assert!(resp.tlvs.is_empty());
    }

    #[test]
    fn test_rejection_response() {
        let resp = build_bind_response(&bind(0x34), "smsc", 0x34, Status::INVSYSID).unwrap();
        assert_eq!(resp.command_status, Status::INVSYSID);
        assert!(resp.tlvs.is_empty());
        assert!(build_bind_response(&Pdu::enquire_link(), "smsc", 0x34, Status::OK).is_none());
    }

    #[test]
    fn test_derived_config() {
        let server = ServerConfig {
            default_window_size: 8,
            counters_enabled: true,
            ..ServerConfig::new("127.0.0.1:0".parse().unwrap())
        };
        let peer: SocketAddr = "10.0.0.7:40000".parse().unwrap();
        let config = derive_session_config(&server, &bind(0x34), peer).unwrap();
        assert_eq!(config.system_id, "esme");
        assert_eq!(config.password, "pw");
        assert_eq!(config.host, "10.0.0.7");
        assert_eq!(config.port, 40000);
        assert_eq!(config.window_size, 8);
        assert!(config.counters_enabled);
        assert_eq!(config.bind_type, BindType::Transceiver);
    }
}
