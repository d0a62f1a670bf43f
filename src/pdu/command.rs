//! SMPP command identifiers.

use std::fmt;

/// Bit 31 of the command id marks a response.
pub const RESPONSE_MASK: u32 = 0x8000_0000;

/// Command identifiers understood by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum CommandId {
    GenericNack = 0x8000_0000,
    BindReceiver = 0x0000_0001,
    BindReceiverResp = 0x8000_0001,
    BindTransmitter = 0x0000_0002,
    BindTransmitterResp = 0x8000_0002,
    QuerySm = 0x0000_0003,
    QuerySmResp = 0x8000_0003,
    SubmitSm = 0x0000_0004,
    SubmitSmResp = 0x8000_0004,
    DeliverSm = 0x0000_0005,
    DeliverSmResp = 0x8000_0005,
    Unbind = 0x0000_0006,
    UnbindResp = 0x8000_0006,
    CancelSm = 0x0000_0008,
    CancelSmResp = 0x8000_0008,
    BindTransceiver = 0x0000_0009,
    BindTransceiverResp = 0x8000_0009,
    Outbind = 0x0000_000B,
    EnquireLink = 0x0000_0015,
    EnquireLinkResp = 0x8000_0015,
    AlertNotification = 0x0000_0102,
    DataSm = 0x0000_0103,
    DataSmResp = 0x8000_0103,
}

impl CommandId {
    /// Map a raw command id, `None` if the codec does not know it.
    pub fn from_u32(value: u32) -> Option<Self> {
        use CommandId::*;
        let id = match value {
            0x8000_0000 => GenericNack,
            0x0000_0001 => BindReceiver,
            0x8000_0001 => BindReceiverResp,
            0x0000_0002 => BindTransmitter,
            0x8000_0002 => BindTransmitterResp,
            0x0000_0003 => QuerySm,
            0x8000_0003 => QuerySmResp,
            0x0000_0004 => SubmitSm,
            0x8000_0004 => SubmitSmResp,
            0x0000_0005 => DeliverSm,
            0x8000_0005 => DeliverSmResp,
            0x0000_0006 => Unbind,
            0x8000_0006 => UnbindResp,
            0x0000_0008 => CancelSm,
            0x8000_0008 => CancelSmResp,
            0x0000_0009 => BindTransceiver,
            0x8000_0009 => BindTransceiverResp,
            0x0000_000B => Outbind,
            0x0000_0015 => EnquireLink,
            0x8000_0015 => EnquireLinkResp,
            0x0000_0102 => AlertNotification,
            0x0000_0103 => DataSm,
            0x8000_0103 => DataSmResp,
            _ => return None,
        };
        Some(id)
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn is_response(self) -> bool {
        self.as_u32() & RESPONSE_MASK != 0
    }

    pub fn is_request(self) -> bool {
        !self.is_response()
    }

    /// The response id paired with a request id. Requests without a
    /// response (outbind, alert_notification) return `None`.
    pub fn response_id(self) -> Option<Self> {
        match self {
            CommandId::Outbind | CommandId::AlertNotification => None,
            id if id.is_request() => Self::from_u32(id.as_u32() | RESPONSE_MASK),
            _ => None,
        }
    }

    /// Protocol name, as used in logs and counters.
    pub fn name(self) -> &'static str {
        use CommandId::*;
        match self {
            GenericNack => "generic_nack",
            BindReceiver => "bind_receiver",
            BindReceiverResp => "bind_receiver_resp",
            BindTransmitter => "bind_transmitter",
            BindTransmitterResp => "bind_transmitter_resp",
            QuerySm => "query_sm",
            QuerySmResp => "query_sm_resp",
            SubmitSm => "submit_sm",
            SubmitSmResp => "submit_sm_resp",
            DeliverSm => "deliver_sm",
            DeliverSmResp => "deliver_sm_resp",
            Unbind => "unbind",
            UnbindResp => "unbind_resp",
            CancelSm => "cancel_sm",
            CancelSmResp => "cancel_sm_resp",
            BindTransceiver => "bind_transceiver",
            BindTransceiverResp => "bind_transceiver_resp",
            Outbind => "outbind",
            EnquireLink => "enquire_link",
            EnquireLinkResp => "enquire_link_resp",
            AlertNotification => "alert_notification",
            DataSm => "data_sm",
            DataSmResp => "data_sm_resp",
        }
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
