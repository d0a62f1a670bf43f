//! Binary encoding of SMPP PDUs, framed for `tokio_util::codec`.
//!
//! Decoding distinguishes two failure classes. A bad `command_length`
//! means framing is lost: the decoder returns [`PduError`] and the stream
//! ends. Anything wrong inside a correctly framed PDU (unknown command id,
//! truncated body, broken TLV stream) consumes the frame and yields
//! [`Decoded::Recoverable`] so the session can answer with a generic_nack.

use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use super::{
    Address, AlertNotification, Bind, BindResp, BindType, Body, CancelSm, CommandId, DataSm,
    Header, Outbind, Pdu, QuerySm, QuerySmResp, ShortMessage, Status, Tlv, HEADER_LENGTH,
};

/// Largest PDU accepted by default.
pub const DEFAULT_MAX_PDU_LENGTH: usize = 64 * 1024;

/// Unrecoverable codec error.
#[derive(Debug, Error)]
pub enum PduError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid command_length {length} (allowed {min}..={max})")]
    InvalidCommandLength { length: u32, min: usize, max: usize },

    #[error("short_message of {0} bytes exceeds 255, use message_payload")]
    ShortMessageTooLong(usize),
}

/// A framed PDU that could not be fully decoded.
#[derive(Debug, Clone, Error)]
#[error("recoverable PDU error, {status}: {reason}")]
pub struct RecoverablePduError {
    /// Header of the offending PDU.
    pub header: Header,
    /// Best-effort partial PDU, `None` when the command id is unknown.
    pub partial: Option<Pdu>,
    /// Status to report back to the peer.
    pub status: Status,
    pub reason: String,
}

impl RecoverablePduError {
    /// generic_nack answering the offending PDU.
    pub fn generic_nack(&self) -> Pdu {
        Pdu::generic_nack(self.header.sequence_number, self.status)
    }
}

/// Decoder output.
#[derive(Debug, Clone)]
pub enum Decoded {
    Pdu(Pdu),
    Recoverable(RecoverablePduError),
}

/// Stateless SMPP codec.
#[derive(Debug, Clone)]
pub struct SmppCodec {
    max_pdu_length: usize,
}

impl Default for SmppCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl SmppCodec {
    pub fn new() -> Self {
        Self {
            max_pdu_length: DEFAULT_MAX_PDU_LENGTH,
        }
    }

    pub fn with_max_pdu_length(max_pdu_length: usize) -> Self {
        Self { max_pdu_length }
    }

    /// Encode a PDU into a standalone buffer.
    pub fn encode_pdu(pdu: &Pdu) -> Result<Bytes, PduError> {
        let mut buf = BytesMut::with_capacity(HEADER_LENGTH + 64);
        write_pdu(pdu, &mut buf)?;
        Ok(buf.freeze())
    }

    /// Decode exactly one complete PDU from `frame`.
    pub fn decode_frame(frame: &[u8]) -> Result<Pdu, RecoverablePduError> {
        let header = read_header(frame);
        decode_body(header, &frame[HEADER_LENGTH..])
    }
}

impl Decoder for SmppCodec {
    type Item = Decoded;
    type Error = PduError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 4 {
            return Ok(None);
        }

        let length = u32::from_be_bytes([src[0], src[1], src[2], src[3]]);
        if (length as usize) < HEADER_LENGTH || length as usize > self.max_pdu_length {
            return Err(PduError::InvalidCommandLength {
                length,
                min: HEADER_LENGTH,
                max: self.max_pdu_length,
            });
        }

        if src.len() < length as usize {
            src.reserve(length as usize - src.len());
            return Ok(None);
        }

        let frame = src.split_to(length as usize);
        let decoded = match Self::decode_frame(&frame) {
            Ok(pdu) => Decoded::Pdu(pdu),
            Err(e) => Decoded::Recoverable(e),
        };
        Ok(Some(decoded))
    }
}

impl Encoder<Pdu> for SmppCodec {
    type Error = PduError;

    fn encode(&mut self, pdu: Pdu, dst: &mut BytesMut) -> Result<(), Self::Error> {
        write_pdu(&pdu, dst)
    }
}

/// Pre-encoded PDUs pass through unchanged.
impl Encoder<Bytes> for SmppCodec {
    type Error = PduError;

    fn encode(&mut self, bytes: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        dst.extend_from_slice(&bytes);
        Ok(())
    }
}

fn read_header(frame: &[u8]) -> Header {
    let mut buf = &frame[..HEADER_LENGTH];
    Header {
        command_length: buf.get_u32(),
        command_id: buf.get_u32(),
        command_status: buf.get_u32(),
        sequence_number: buf.get_u32(),
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn u8(&mut self) -> Result<u8, String> {
        if self.buf.is_empty() {
            return Err("unexpected end of body".into());
        }
        Ok(self.buf.get_u8())
    }

    fn u16(&mut self) -> Result<u16, String> {
        if self.buf.len() < 2 {
            return Err("unexpected end of body".into());
        }
        Ok(self.buf.get_u16())
    }

    fn bytes(&mut self, n: usize) -> Result<Bytes, String> {
        if self.buf.len() < n {
            return Err(format!("need {} bytes, {} left", n, self.buf.len()));
        }
        let (head, tail) = self.buf.split_at(n);
        self.buf = tail;
        Ok(Bytes::copy_from_slice(head))
    }

    fn cstring(&mut self) -> Result<String, String> {
        let nul = self
            .buf
            .iter()
            .position(|b| *b == 0)
            .ok_or_else(|| "unterminated C-octet string".to_string())?;
        let value = std::str::from_utf8(&self.buf[..nul])
            .map_err(|e| format!("C-octet string is not valid UTF-8: {}", e))?
            .to_owned();
        self.buf = &self.buf[nul + 1..];
        Ok(value)
    }

    fn address(&mut self) -> Result<Address, String> {
        Ok(Address {
            ton: self.u8()?,
            npi: self.u8()?,
            address: self.cstring()?,
        })
    }
}

fn decode_body(header: Header, body: &[u8]) -> Result<Pdu, RecoverablePduError> {
    let fail = |status: Status, partial: Option<Pdu>, reason: String| RecoverablePduError {
        header,
        partial,
        status,
        reason,
    };

    let Some(command_id) = CommandId::from_u32(header.command_id) else {
        return Err(fail(
            Status::INVCMDID,
            None,
            format!("unknown command id 0x{:08X}", header.command_id),
        ));
    };

    let skeleton = |body: Body| Pdu {
        command_status: Status(header.command_status),
        sequence_number: Some(header.sequence_number),
        body,
        tlvs: Vec::new(),
        body_omitted: false,
    };

    // Error responses frequently omit the mandatory body.
    if body.is_empty() && command_id.is_response() && has_mandatory_body(command_id) {
        let mut pdu = skeleton(default_body(command_id));
        pdu.body_omitted = true;
        return Ok(pdu);
    }

    let mut reader = Reader { buf: body };
    let parsed = match read_body(command_id, &mut reader) {
        Ok(b) => b,
        Err(reason) => {
            return Err(fail(
                Status::INVMSGLEN,
                Some(skeleton(default_body(command_id))),
                reason,
            ))
        }
    };

    let mut pdu = skeleton(parsed);
    while reader.remaining() > 0 {
        match read_tlv(&mut reader) {
            Ok(tlv) => pdu.tlvs.push(tlv),
            Err(reason) => {
                pdu.tlvs.clear();
                return Err(fail(Status::INVOPTPARSTREAM, Some(pdu), reason));
            }
        }
    }

    Ok(pdu)
}

fn read_tlv(r: &mut Reader<'_>) -> Result<Tlv, String> {
    if r.remaining() < 4 {
        return Err(format!("{} trailing bytes do not form a TLV", r.remaining()));
    }
    let tag = r.u16()?;
    let len = r.u16()? as usize;
    let value = r
        .bytes(len)
        .map_err(|e| format!("TLV 0x{:04X}: {}", tag, e))?;
    Ok(Tlv { tag, value })
}

fn read_body(id: CommandId, r: &mut Reader<'_>) -> Result<Body, String> {
    let body = match id {
        CommandId::GenericNack => Body::GenericNack,
        CommandId::BindTransmitter | CommandId::BindReceiver | CommandId::BindTransceiver => Body::Bind(Bind {
            bind_type: bind_type_of(id),
            system_id: r.cstring()?,
            password: r.cstring()?,
            system_type: r.cstring()?,
            interface_version: r.u8()?,
            address_range: r.address()?,
        }),
        CommandId::BindTransmitterResp | CommandId::BindReceiverResp | CommandId::BindTransceiverResp => Body::BindResp(BindResp {
            bind_type: bind_type_of(id),
            system_id: r.cstring()?,
        }),
        CommandId::Outbind => Body::Outbind(Outbind {
            system_id: r.cstring()?,
            password: r.cstring()?,
        }),
        CommandId::Unbind => Body::Unbind,
        CommandId::UnbindResp => Body::UnbindResp,
        CommandId::EnquireLink => Body::EnquireLink,
        CommandId::EnquireLinkResp => Body::EnquireLinkResp,
        CommandId::SubmitSm => Body::SubmitSm(Box::new(read_short_message(r)?)),
        CommandId::SubmitSmResp => Body::SubmitSmResp {
            message_id: r.cstring()?,
        },
        CommandId::DeliverSm => Body::DeliverSm(Box::new(read_short_message(r)?)),
        CommandId::DeliverSmResp => Body::DeliverSmResp {
            message_id: r.cstring()?,
        },
        CommandId::DataSm => Body::DataSm(DataSm {
            service_type: r.cstring()?,
            source: r.address()?,
            destination: r.address()?,
            esm_class: r.u8()?,
            registered_delivery: r.u8()?,
            data_coding: r.u8()?,
        }),
        CommandId::DataSmResp => Body::DataSmResp {
            message_id: r.cstring()?,
        },
        CommandId::QuerySm => Body::QuerySm(QuerySm {
            message_id: r.cstring()?,
            source: r.address()?,
        }),
        CommandId::QuerySmResp => Body::QuerySmResp(QuerySmResp {
            message_id: r.cstring()?,
            final_date: r.cstring()?,
            message_state: r.u8()?,
            error_code: r.u8()?,
        }),
        CommandId::CancelSm => Body::CancelSm(CancelSm {
            service_type: r.cstring()?,
            message_id: r.cstring()?,
            source: r.address()?,
            destination: r.address()?,
        }),
        CommandId::CancelSmResp => Body::CancelSmResp,
        CommandId::AlertNotification => Body::AlertNotification(AlertNotification {
            source: r.address()?,
            esme: r.address()?,
        }),
    };
    Ok(body)
}

fn read_short_message(r: &mut Reader<'_>) -> Result<ShortMessage, String> {
    let mut sm = ShortMessage {
        service_type: r.cstring()?,
        source: r.address()?,
        destination: r.address()?,
        esm_class: r.u8()?,
        protocol_id: r.u8()?,
        priority_flag: r.u8()?,
        schedule_delivery_time: r.cstring()?,
        validity_period: r.cstring()?,
        registered_delivery: r.u8()?,
        replace_if_present: r.u8()?,
        data_coding: r.u8()?,
        sm_default_msg_id: r.u8()?,
        short_message: Bytes::new(),
    };
    let sm_length = r.u8()? as usize;
    sm.short_message = r.bytes(sm_length)?;
    Ok(sm)
}

fn bind_type_of(id: CommandId) -> BindType {
    match id {
        CommandId::BindTransmitter | CommandId::BindTransmitterResp => BindType::Transmitter,
        CommandId::BindReceiver | CommandId::BindReceiverResp => BindType::Receiver,
        _ => BindType::Transceiver,
    }
}

fn has_mandatory_body(id: CommandId) -> bool {
    !matches!(
        id,
        CommandId::GenericNack
            | CommandId::Unbind
            | CommandId::UnbindResp
            | CommandId::EnquireLink
            | CommandId::EnquireLinkResp
            | CommandId::CancelSmResp
    )
}

fn default_body(id: CommandId) -> Body {
    match id {
        CommandId::GenericNack => Body::GenericNack,
        CommandId::BindTransmitter | CommandId::BindReceiver | CommandId::BindTransceiver => Body::Bind(Bind {
            bind_type: bind_type_of(id),
            ..Default::default()
        }),
        CommandId::BindTransmitterResp | CommandId::BindReceiverResp | CommandId::BindTransceiverResp => Body::BindResp(BindResp {
            bind_type: bind_type_of(id),
            system_id: String::new(),
        }),
        CommandId::Outbind => Body::Outbind(Outbind::default()),
        CommandId::Unbind => Body::Unbind,
        CommandId::UnbindResp => Body::UnbindResp,
        CommandId::EnquireLink => Body::EnquireLink,
        CommandId::EnquireLinkResp => Body::EnquireLinkResp,
        CommandId::SubmitSm => Body::SubmitSm(Box::default()),
        CommandId::SubmitSmResp => Body::SubmitSmResp {
            message_id: String::new(),
        },
        CommandId::DeliverSm => Body::DeliverSm(Box::default()),
        CommandId::DeliverSmResp => Body::DeliverSmResp {
            message_id: String::new(),
        },
        CommandId::DataSm => Body::DataSm(DataSm::default()),
        CommandId::DataSmResp => Body::DataSmResp {
            message_id: String::new(),
        },
        CommandId::QuerySm => Body::QuerySm(QuerySm::default()),
        CommandId::QuerySmResp => Body::QuerySmResp(QuerySmResp::default()),
        CommandId::CancelSm => Body::CancelSm(CancelSm::default()),
        CommandId::CancelSmResp => Body::CancelSmResp,
        CommandId::AlertNotification => Body::AlertNotification(AlertNotification::default()),
    }
}

// ---------------------------------------------------------------------------
// Encoding
// ---------------------------------------------------------------------------

fn write_pdu(pdu: &Pdu, dst: &mut BytesMut) -> Result<(), PduError> {
    let start = dst.len();
    dst.put_u32(0); // patched below
    dst.put_u32(pdu.command_id().as_u32());
    dst.put_u32(pdu.command_status.as_u32());
    dst.put_u32(pdu.sequence());

    if !pdu.body_omitted {
        if let Err(e) = write_body(&pdu.body, dst) {
            dst.truncate(start);
            return Err(e);
        }
    }
    for tlv in &pdu.tlvs {
        dst.put_u16(tlv.tag);
        dst.put_u16(tlv.value.len() as u16);
        dst.extend_from_slice(&tlv.value);
    }

    let length = (dst.len() - start) as u32;
    dst[start..start + 4].copy_from_slice(&length.to_be_bytes());
    Ok(())
}

fn put_cstring(dst: &mut BytesMut, value: &str) {
    dst.extend_from_slice(value.as_bytes());
    dst.put_u8(0);
}

fn put_address(dst: &mut BytesMut, address: &Address) {
    dst.put_u8(address.ton);
    dst.put_u8(address.npi);
    put_cstring(dst, &address.address);
}

fn write_body(body: &Body, dst: &mut BytesMut) -> Result<(), PduError> {
    match body {
        Body::GenericNack
        | Body::Unbind
        | Body::UnbindResp
        | Body::EnquireLink
        | Body::EnquireLinkResp
        | Body::CancelSmResp => {}
        Body::Bind(b) => {
            put_cstring(dst, &b.system_id);
            put_cstring(dst, &b.password);
            put_cstring(dst, &b.system_type);
            dst.put_u8(b.interface_version);
            put_address(dst, &b.address_range);
        }
        Body::BindResp(b) => put_cstring(dst, &b.system_id),
        Body::Outbind(o) => {
            put_cstring(dst, &o.system_id);
            put_cstring(dst, &o.password);
        }
        Body::SubmitSm(sm) | Body::DeliverSm(sm) => {
            put_cstring(dst, &sm.service_type);
            put_address(dst, &sm.source);
            put_address(dst, &sm.destination);
            dst.put_u8(sm.esm_class);
            dst.put_u8(sm.protocol_id);
            dst.put_u8(sm.priority_flag);
            put_cstring(dst, &sm.schedule_delivery_time);
            put_cstring(dst, &sm.validity_period);
            dst.put_u8(sm.registered_delivery);
            dst.put_u8(sm.replace_if_present);
            dst.put_u8(sm.data_coding);
            dst.put_u8(sm.sm_default_msg_id);
            let len = u8::try_from(sm.short_message.len())
                .map_err(|_| PduError::ShortMessageTooLong(sm.short_message.len()))?;
            dst.put_u8(len);
            dst.extend_from_slice(&sm.short_message);
        }
        Body::SubmitSmResp { message_id }
        | Body::DeliverSmResp { message_id }
        | Body::DataSmResp { message_id } => put_cstring(dst, message_id),
        Body::DataSm(d) => {
            put_cstring(dst, &d.service_type);
            put_address(dst, &d.source);
            put_address(dst, &d.destination);
            dst.put_u8(d.esm_class);
            dst.put_u8(d.registered_delivery);
            dst.put_u8(d.data_coding);
        }
        Body::QuerySm(q) => {
            put_cstring(dst, &q.message_id);
            put_address(dst, &q.source);
        }
        Body::QuerySmResp(q) => {
            put_cstring(dst, &q.message_id);
            put_cstring(dst, &q.final_date);
            dst.put_u8(q.message_state);
            dst.put_u8(q.error_code);
        }
        Body::CancelSm(c) => {
            put_cstring(dst, &c.service_type);
            put_cstring(dst, &c.message_id);
            put_address(dst, &c.source);
            put_address(dst, &c.destination);
        }
        Body::AlertNotification(a) => {
            put_address(dst, &a.source);
            put_address(dst, &a.esme);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdu::tags;

    fn decode_one(bytes: &[u8]) -> Decoded {
        let mut codec = SmppCodec::new();
        let mut buf = BytesMut::from(bytes);
        codec.decode(&mut buf).unwrap().unwrap()
    }

    #[test]
    fn test_enquire_link_wire_format() {
        let pdu = Pdu::enquire_link().with_sequence(7);
        let bytes = SmppCodec::encode_pdu(&pdu).unwrap();
        assert_eq!(
            &bytes[..],
            &[0, 0, 0, 16, 0, 0, 0, 0x15, 0, 0, 0, 0, 0, 0, 0, 7]
        );
    }

    #[test]
    fn test_bind_round_trip_with_tlv() {
        let pdu = Pdu::new(Body::BindResp(BindResp {
            bind_type: BindType::Transceiver,
            system_id: "smsc".into(),
        }))
        .with_sequence(1)
        .with_tlv(Tlv::from_u8(tags::SC_INTERFACE_VERSION, 0x34));

        let bytes = SmppCodec::encode_pdu(&pdu).unwrap();
        match decode_one(&bytes) {
            Decoded::Pdu(decoded) => {
                assert_eq!(decoded, pdu);
                assert_eq!(SmppCodec::encode_pdu(&decoded).unwrap(), bytes);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_sequence_number_preserved_verbatim() {
        for seq in [0u32, 1, 0x7FFF_FFFF, 0xFFFF_FFFF] {
            let pdu = Pdu::enquire_link().with_sequence(seq);
            match decode_one(&SmppCodec::encode_pdu(&pdu).unwrap()) {
                Decoded::Pdu(decoded) => assert_eq!(decoded.sequence_number, Some(seq)),
                other => panic!("unexpected {:?}", other),
            }
        }
    }

    #[test]
    fn test_partial_frame_needs_more_bytes() {
        let bytes = SmppCodec::encode_pdu(&Pdu::enquire_link().with_sequence(1)).unwrap();
        let mut codec = SmppCodec::new();
        let mut buf = BytesMut::from(&bytes[..10]);
        assert!(codec.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(&bytes[10..]);
        assert!(matches!(codec.decode(&mut buf).unwrap(), Some(Decoded::Pdu(_))));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_bad_length_is_unrecoverable() {
        let mut codec = SmppCodec::new();
        let mut buf = BytesMut::from(&[0u8, 0, 0, 8, 0, 0, 0, 0x15][..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(PduError::InvalidCommandLength { length: 8, .. })
        ));
    }

    #[test]
    fn test_unknown_command_is_recoverable() {
        let bytes = [0u8, 0, 0, 16, 0, 0, 0, 0x07, 0, 0, 0, 0, 0, 0, 0, 9];
        match decode_one(&bytes) {
            Decoded::Recoverable(e) => {
                assert_eq!(e.status, Status::INVCMDID);
                assert!(e.partial.is_none());
                let nack = e.generic_nack();
                assert_eq!(nack.sequence_number, Some(9));
                assert_eq!(nack.command_status, Status::INVCMDID);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_truncated_body_is_recoverable_with_partial() {
        // submit_sm whose body stops after service_type
        let bytes = [0u8, 0, 0, 18, 0, 0, 0, 0x04, 0, 0, 0, 0, 0, 0, 0, 3, b'a', 0];
        match decode_one(&bytes) {
            Decoded::Recoverable(e) => {
                assert_eq!(e.status, Status::INVMSGLEN);
                let partial = e.partial.unwrap();
                assert_eq!(partial.command_id(), CommandId::SubmitSm);
                assert_eq!(partial.sequence_number, Some(3));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_error_response_without_body() {
        let bytes = [0u8, 0, 0, 16, 0x80, 0, 0, 0x09, 0, 0, 0, 0x0F, 0, 0, 0, 1];
        match decode_one(&bytes) {
            Decoded::Pdu(pdu) => {
                assert_eq!(pdu.command_id(), CommandId::BindTransceiverResp);
                assert_eq!(pdu.command_status, Status::INVSYSID);
                assert!(pdu.body_omitted);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_error_response_without_body_encodes_header_only() {
        // submit_sm_resp, THROTTLED, sequence 9
        let bytes = [0u8, 0, 0, 16, 0x80, 0, 0, 0x04, 0, 0, 0, 0x58, 0, 0, 0, 9];
        let pdu = match decode_one(&bytes) {
            Decoded::Pdu(pdu) => pdu,
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(pdu.command_status, Status::THROTTLED);
        assert_eq!(&SmppCodec::encode_pdu(&pdu).unwrap()[..], &bytes[..]);

        // the same response built locally carries its empty message_id
        let built = Pdu::new(Body::SubmitSmResp {
            message_id: String::new(),
        })
        .with_status(Status::THROTTLED)
        .with_sequence(9);
        assert_eq!(SmppCodec::encode_pdu(&built).unwrap().len(), 17);
    }

    #[test]
    fn test_empty_body_response_is_not_marked_omitted() {
        let pdu = Pdu::new(Body::EnquireLinkResp).with_sequence(4);
        match decode_one(&SmppCodec::encode_pdu(&pdu).unwrap()) {
            Decoded::Pdu(decoded) => assert_eq!(decoded, pdu),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_non_utf8_cstring_is_recoverable() {
        // submit_sm_resp whose message_id is 0xE9 'A'
        let bytes = [0u8, 0, 0, 19, 0x80, 0, 0, 0x04, 0, 0, 0, 0, 0, 0, 0, 2, 0xE9, b'A', 0];
        match decode_one(&bytes) {
            Decoded::Recoverable(e) => {
                assert_eq!(e.status, Status::INVMSGLEN);
                assert!(e.reason.contains("UTF-8"));
                assert_eq!(e.header.sequence_number, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_oversized_short_message_rejected() {
        let message = |len: usize| {
            Pdu::submit_sm(ShortMessage {
                short_message: Bytes::from(vec![b'x'; len]),
                ..Default::default()
            })
            .with_sequence(1)
        };

        let encoded = SmppCodec::encode_pdu(&message(255)).unwrap();
        match decode_one(&encoded) {
            Decoded::Pdu(decoded) => match decoded.body {
                Body::SubmitSm(sm) => assert_eq!(sm.short_message.len(), 255),
                other => panic!("unexpected {:?}", other),
            },
            other => panic!("unexpected {:?}", other),
        }

        assert!(matches!(
            SmppCodec::encode_pdu(&message(256)),
            Err(PduError::ShortMessageTooLong(256))
        ));

        let mut codec = SmppCodec::new();
        let mut dst = BytesMut::from(&b"prefix"[..]);
        assert!(codec.encode(message(300), &mut dst).is_err());
        assert_eq!(&dst[..], b"prefix");
    }
}
