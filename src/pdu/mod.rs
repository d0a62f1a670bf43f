//! SMPP protocol data units.
//!
//! A [`Pdu`] is a command status, an optional sequence number, a typed
//! [`Body`] and a list of optional parameters. The command id is derived
//! from the body so the two can never disagree. Encoding and decoding live
//! in [`codec`].

pub mod codec;
mod command;
mod status;
mod tlv;

use bytes::Bytes;

pub use codec::{Decoded, PduError, RecoverablePduError, SmppCodec, DEFAULT_MAX_PDU_LENGTH};
pub use command::{CommandId, RESPONSE_MASK};
pub use status::Status;
pub use tlv::{tags, Tlv};

/// Length of the fixed PDU header.
pub const HEADER_LENGTH: usize = 16;

/// Raw PDU header as read off the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub command_length: u32,
    pub command_id: u32,
    pub command_status: u32,
    pub sequence_number: u32,
}

impl Header {
    pub fn is_response(&self) -> bool {
        self.command_id & RESPONSE_MASK != 0
    }
}

/// SMPP interface versions.
pub mod version {
    pub const VERSION_3_3: u8 = 0x33;
    pub const VERSION_3_4: u8 = 0x34;
    pub const VERSION_5_0: u8 = 0x50;
}

/// Bind variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindType {
    Transmitter,
    Receiver,
    #[default]
    Transceiver,
}

impl BindType {
    pub fn request_id(self) -> CommandId {
        match self {
            BindType::Transmitter => CommandId::BindTransmitter,
            BindType::Receiver => CommandId::BindReceiver,
            BindType::Transceiver => CommandId::BindTransceiver,
        }
    }

    pub fn response_id(self) -> CommandId {
        match self {
            BindType::Transmitter => CommandId::BindTransmitterResp,
            BindType::Receiver => CommandId::BindReceiverResp,
            BindType::Transceiver => CommandId::BindTransceiverResp,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BindType::Transmitter => "transmitter",
            BindType::Receiver => "receiver",
            BindType::Transceiver => "transceiver",
        }
    }
}

/// TON/NPI qualified address.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Address {
    pub ton: u8,
    pub npi: u8,
    pub address: String,
}

impl Address {
    pub fn new(ton: u8, npi: u8, address: impl Into<String>) -> Self {
        Self {
            ton,
            npi,
            address: address.into(),
        }
    }
}

/// Body of bind_transmitter / bind_receiver / bind_transceiver.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bind {
    pub bind_type: BindType,
    pub system_id: String,
    pub password: String,
    pub system_type: String,
    pub interface_version: u8,
    pub address_range: Address,
}

/// Body of the three bind responses.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BindResp {
    pub bind_type: BindType,
    pub system_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Outbind {
    pub system_id: String,
    pub password: String,
}

/// Shared body layout of submit_sm and deliver_sm.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShortMessage {
    pub service_type: String,
    pub source: Address,
    pub destination: Address,
    pub esm_class: u8,
    pub protocol_id: u8,
    pub priority_flag: u8,
    pub schedule_delivery_time: String,
    pub validity_period: String,
    pub registered_delivery: u8,
    pub replace_if_present: u8,
    pub data_coding: u8,
    pub sm_default_msg_id: u8,
    pub short_message: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataSm {
    pub service_type: String,
    pub source: Address,
    pub destination: Address,
    pub esm_class: u8,
    pub registered_delivery: u8,
    pub data_coding: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuerySm {
    pub message_id: String,
    pub source: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct QuerySmResp {
    pub message_id: String,
    pub final_date: String,
    pub message_state: u8,
    pub error_code: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CancelSm {
    pub service_type: String,
    pub message_id: String,
    pub source: Address,
    pub destination: Address,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AlertNotification {
    pub source: Address,
    pub esme: Address,
}

/// Typed PDU body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    GenericNack,
    Bind(Bind),
    BindResp(BindResp),
    Outbind(Outbind),
    Unbind,
    UnbindResp,
    EnquireLink,
    EnquireLinkResp,
    SubmitSm(Box<ShortMessage>),
    SubmitSmResp { message_id: String },
    DeliverSm(Box<ShortMessage>),
    DeliverSmResp { message_id: String },
    DataSm(DataSm),
    DataSmResp { message_id: String },
    QuerySm(QuerySm),
    QuerySmResp(QuerySmResp),
    CancelSm(CancelSm),
    CancelSmResp,
    AlertNotification(AlertNotification),
}

impl Body {
    pub fn command_id(&self) -> CommandId {
        match self {
            Body::GenericNack => CommandId::GenericNack,
            Body::Bind(b) => b.bind_type.request_id(),
            Body::BindResp(b) => b.bind_type.response_id(),
            Body::Outbind(_) => CommandId::Outbind,
            Body::Unbind => CommandId::Unbind,
            Body::UnbindResp => CommandId::UnbindResp,
            Body::EnquireLink => CommandId::EnquireLink,
            Body::EnquireLinkResp => CommandId::EnquireLinkResp,
            Body::SubmitSm(_) => CommandId::SubmitSm,
            Body::SubmitSmResp { .. } => CommandId::SubmitSmResp,
            Body::DeliverSm(_) => CommandId::DeliverSm,
            Body::DeliverSmResp { .. } => CommandId::DeliverSmResp,
            Body::DataSm(_) => CommandId::DataSm,
            Body::DataSmResp { .. } => CommandId::DataSmResp,
            Body::QuerySm(_) => CommandId::QuerySm,
            Body::QuerySmResp(_) => CommandId::QuerySmResp,
            Body::CancelSm(_) => CommandId::CancelSm,
            Body::CancelSmResp => CommandId::CancelSmResp,
            Body::AlertNotification(_) => CommandId::AlertNotification,
        }
    }

    /// Empty response body for a request body, `None` for responses and
    /// for requests that have no response.
    fn empty_response(&self) -> Option<Body> {
        let body = match self {
            Body::Bind(b) => Body::BindResp(BindResp {
                bind_type: b.bind_type,
                system_id: String::new(),
            }),
            Body::Unbind => Body::UnbindResp,
            Body::EnquireLink => Body::EnquireLinkResp,
            Body::SubmitSm(_) => Body::SubmitSmResp {
                message_id: String::new(),
            },
            Body::DeliverSm(_) => Body::DeliverSmResp {
                message_id: String::new(),
            },
            Body::DataSm(_) => Body::DataSmResp {
                message_id: String::new(),
            },
            Body::QuerySm(q) => Body::QuerySmResp(QuerySmResp {
                message_id: q.message_id.clone(),
                ..Default::default()
            }),
            Body::CancelSm(_) => Body::CancelSmResp,
            _ => return None,
        };
        Some(body)
    }
}

/// One SMPP message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    pub command_status: Status,
    pub sequence_number: Option<u32>,
    pub body: Body,
    pub tlvs: Vec<Tlv>,
    /// The mandatory body is absent on the wire. Set by the decoder for
    /// error responses that carry only a header; such a PDU encodes back
    /// to the bare header.
    pub body_omitted: bool,
}

impl Pdu {
    /// A new PDU with status OK and no sequence number assigned.
    pub fn new(body: Body) -> Self {
        Self {
            command_status: Status::OK,
            sequence_number: None,
            body,
            tlvs: Vec::new(),
            body_omitted: false,
        }
    }

    pub fn with_sequence(mut self, sequence_number: u32) -> Self {
        self.sequence_number = Some(sequence_number);
        self
    }

    pub fn with_status(mut self, status: Status) -> Self {
        self.command_status = status;
        self
    }

    pub fn with_tlv(mut self, tlv: Tlv) -> Self {
        self.tlvs.push(tlv);
        self
    }

    pub fn enquire_link() -> Self {
        Self::new(Body::EnquireLink)
    }

    pub fn unbind() -> Self {
        Self::new(Body::Unbind)
    }

    pub fn submit_sm(message: ShortMessage) -> Self {
        Self::new(Body::SubmitSm(Box::new(message)))
    }

    pub fn deliver_sm(message: ShortMessage) -> Self {
        Self::new(Body::DeliverSm(Box::new(message)))
    }

    /// A generic_nack answering `sequence_number` with `status`.
    pub fn generic_nack(sequence_number: u32, status: Status) -> Self {
        Self::new(Body::GenericNack)
            .with_sequence(sequence_number)
            .with_status(status)
    }

    pub fn command_id(&self) -> CommandId {
        self.body.command_id()
    }

    pub fn name(&self) -> &'static str {
        self.command_id().name()
    }

    pub fn is_request(&self) -> bool {
        self.command_id().is_request()
    }

    pub fn is_response(&self) -> bool {
        self.command_id().is_response()
    }

    pub fn has_sequence_number(&self) -> bool {
        self.sequence_number.is_some()
    }

    /// Sequence number, 0 when none has been assigned yet.
    pub fn sequence(&self) -> u32 {
        self.sequence_number.unwrap_or(0)
    }

    pub fn set_sequence_number(&mut self, sequence_number: u32) {
        self.sequence_number = Some(sequence_number);
    }

    pub fn optional_parameter(&self, tag: u16) -> Option<&Tlv> {
        self.tlvs.iter().find(|t| t.tag == tag)
    }

    /// Matching empty response (same sequence number, status OK).
    /// Returns `None` for responses and for requests without a response.
    pub fn create_response(&self) -> Option<Pdu> {
        let body = self.body.empty_response()?;
        let mut resp = Pdu::new(body);
        resp.sequence_number = self.sequence_number;
        Some(resp)
    }

    /// generic_nack for this PDU's sequence number.
    pub fn create_generic_nack(&self, status: Status) -> Pdu {
        Pdu::generic_nack(self.sequence(), status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_response_keeps_sequence() {
        let req = Pdu::submit_sm(ShortMessage::default()).with_sequence(0x1000);
        let resp = req.create_response().unwrap();
        assert_eq!(resp.command_id(), CommandId::SubmitSmResp);
        assert_eq!(resp.sequence_number, Some(0x1000));
        assert!(resp.command_status.is_ok());
    }

    #[test]
    fn test_bind_response_follows_bind_type() {
        let req = Pdu::new(Body::Bind(Bind {
            bind_type: BindType::Receiver,
            ..Default::default()
        }));
        let resp = req.create_response().unwrap();
        assert_eq!(resp.command_id(), CommandId::BindReceiverResp);
    }

    #[test]
    fn test_no_response_for_responses() {
        let resp = Pdu::new(Body::EnquireLinkResp);
        assert!(resp.create_response().is_none());
        assert!(Pdu::new(Body::AlertNotification(Default::default()))
            .create_response()
            .is_none());
    }
}
