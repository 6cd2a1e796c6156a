//! # MQTT Packet Structures and Serialization
//!
//! The subset of MQTT 3.1.1 a device-side session needs: the packets a client
//! sends are encoded, the packets a broker sends back are decoded. Decoding is
//! bounds-checked throughout and reports malformed input as an error.

use crate::error::{CodecError, MqttError, ProtocolError};
use crate::util::{
    read_u16, read_utf8_string, read_variable_byte_integer, write_u16, write_utf8_string,
    write_variable_byte_integer,
};

/// Protocol level byte for MQTT 3.1.1.
const PROTOCOL_LEVEL: u8 = 4;

/// Bytes reserved in front of a packet body for the fixed header.
const FIXED_HEADER_RESERVE: usize = 5;

/// Represents the Quality of Service (QoS) levels for MQTT messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum QoS {
    AtMostOnce = 0,
    AtLeastOnce = 1,
    ExactlyOnce = 2,
}

/// A trait for packets that can be encoded into a byte buffer.
pub trait EncodePacket {
    /// Encodes the full packet at the start of `buf` and returns its length.
    fn encode(&self, buf: &mut [u8]) -> Result<usize, CodecError>;
}

/// Packets a broker sends to a client.
#[derive(Debug, PartialEq)]
pub enum MqttPacket<'a> {
    ConnAck(ConnAck),
    Publish(Publish<'a>),
    PubAck(u16),
    SubAck(SubAck),
    UnsubAck(u16),
    PingResp,
}

/// Writes the fixed header and a body produced by `body` into `buf`.
///
/// The body is written after a worst-case header reserve and then moved down
/// so the packet starts at offset zero.
fn encode_frame<F>(buf: &mut [u8], header: u8, body: F) -> Result<usize, CodecError>
where
    F: FnOnce(&mut [u8]) -> Result<usize, CodecError>,
{
    let body_len = body(
        buf.get_mut(FIXED_HEADER_RESERVE..)
            .ok_or(MqttError::BufferTooSmall)?,
    )?;

    let mut len_bytes = [0u8; 4];
    let len_size = write_variable_byte_integer(&mut len_bytes, body_len)?;
    let header_len = 1 + len_size;

    buf.copy_within(
        FIXED_HEADER_RESERVE..FIXED_HEADER_RESERVE + body_len,
        header_len,
    );
    buf[0] = header;
    buf[1..header_len].copy_from_slice(&len_bytes[..len_size]);
    Ok(header_len + body_len)
}

/// Appends raw bytes to `buf` at `cursor`.
fn put(buf: &mut [u8], cursor: &mut usize, bytes: &[u8]) -> Result<(), CodecError> {
    buf.get_mut(*cursor..*cursor + bytes.len())
        .ok_or(MqttError::BufferTooSmall)?
        .copy_from_slice(bytes);
    *cursor += bytes.len();
    Ok(())
}

/// Appends a length-prefixed string to `buf` at `cursor`.
fn put_str(buf: &mut [u8], cursor: &mut usize, s: &str) -> Result<(), CodecError> {
    let tail = buf.get_mut(*cursor..).ok_or(MqttError::BufferTooSmall)?;
    *cursor += write_utf8_string(tail, s)?;
    Ok(())
}

/// Decodes one complete packet from the start of `buf`.
///
/// Returns `Ok(None)` for an empty buffer.
pub fn decode(buf: &[u8]) -> Result<Option<MqttPacket<'_>>, CodecError> {
    let Some(&first) = buf.first() else {
        return Ok(None);
    };
    let packet_type = first >> 4;
    let flags = first & 0x0F;

    let mut cursor = 1;
    let remaining_len = read_variable_byte_integer(&mut cursor, buf)?;
    let body = buf
        .get(cursor..cursor + remaining_len)
        .ok_or(MqttError::Protocol(ProtocolError::MalformedPacket))?;

    let packet = match packet_type {
        2 => MqttPacket::ConnAck(ConnAck::decode(body)?),
        3 => MqttPacket::Publish(Publish::decode(flags, body)?),
        4 => MqttPacket::PubAck(read_u16(&mut 0, body)?),
        9 => MqttPacket::SubAck(SubAck::decode(body)?),
        11 => MqttPacket::UnsubAck(read_u16(&mut 0, body)?),
        13 => MqttPacket::PingResp,
        _ => {
            return Err(MqttError::Protocol(ProtocolError::InvalidPacketType(
                packet_type,
            )));
        }
    };

    Ok(Some(packet))
}

// --- CONNECT Packet ---
#[derive(Debug)]
pub struct Connect<'a> {
    pub clean_session: bool,
    pub keep_alive: u16,
    pub client_id: &'a str,
    pub username: Option<&'a str>,
}

impl<'a> Connect<'a> {
    pub fn new(client_id: &'a str, keep_alive: u16, clean_session: bool) -> Self {
        Self {
            client_id,
            keep_alive,
            clean_session,
            username: None,
        }
    }

    pub fn with_username(mut self, username: &'a str) -> Self {
        self.username = Some(username);
        self
    }
}

impl EncodePacket for Connect<'_> {
    fn encode(&self, buf: &mut [u8]) -> Result<usize, CodecError> {
        encode_frame(buf, 0x10, |body| {
            let mut cursor = write_utf8_string(body, "MQTT")?;

            let mut flags = 0;
            if self.clean_session {
                flags |= 0x02;
            }
            if self.username.is_some() {
                flags |= 0x80;
            }
            put(body, &mut cursor, &[PROTOCOL_LEVEL, flags])?;
            put(body, &mut cursor, &self.keep_alive.to_be_bytes())?;

            put_str(body, &mut cursor, self.client_id)?;
            if let Some(username) = self.username {
                put_str(body, &mut cursor, username)?;
            }
            Ok(cursor)
        })
    }
}

// --- CONNACK Packet ---
#[derive(Debug, PartialEq, Eq)]
pub struct ConnAck {
    pub session_present: bool,
    pub return_code: u8,
}

impl ConnAck {
    fn decode(body: &[u8]) -> Result<Self, CodecError> {
        match body {
            [ack_flags, return_code] => Ok(Self {
                session_present: (ack_flags & 0x01) != 0,
                return_code: *return_code,
            }),
            _ => Err(MqttError::Protocol(ProtocolError::MalformedPacket)),
        }
    }
}

// --- PUBLISH Packet ---
#[derive(Debug, PartialEq)]
pub struct Publish<'a> {
    pub topic: &'a str,
    pub qos: QoS,
    pub retain: bool,
    pub payload: &'a [u8],
    pub packet_id: Option<u16>,
}

impl<'a> Publish<'a> {
    /// A QoS 0, non-retained publish.
    pub fn new(topic: &'a str, payload: &'a [u8]) -> Self {
        Self {
            topic,
            qos: QoS::AtMostOnce,
            retain: false,
            payload,
            packet_id: None,
        }
    }

    fn decode(flags: u8, body: &'a [u8]) -> Result<Self, CodecError> {
        let qos = match (flags >> 1) & 0x03 {
            0 => QoS::AtMostOnce,
            1 => QoS::AtLeastOnce,
            2 => QoS::ExactlyOnce,
            _ => return Err(MqttError::Protocol(ProtocolError::MalformedPacket)),
        };

        let mut cursor = 0;
        let topic = read_utf8_string(&mut cursor, body)?;

        let packet_id = if qos != QoS::AtMostOnce {
            Some(read_u16(&mut cursor, body)?)
        } else {
            None
        };

        Ok(Publish {
            topic,
            qos,
            retain: (flags & 0x01) != 0,
            payload: &body[cursor..],
            packet_id,
        })
    }
}

impl EncodePacket for Publish<'_> {
    fn encode(&self, buf: &mut [u8]) -> Result<usize, CodecError> {
        // Fixed header: PUBLISH packet type (3) with QoS and retain flags
        let header = 0x30 | ((self.qos as u8) << 1) | u8::from(self.retain);

        encode_frame(buf, header, |body| {
            let mut cursor = write_utf8_string(body, self.topic)?;

            // Packet ID (only for QoS > 0)
            if self.qos != QoS::AtMostOnce {
                let id = self
                    .packet_id
                    .ok_or(MqttError::Protocol(ProtocolError::MalformedPacket))?;
                put(body, &mut cursor, &id.to_be_bytes())?;
            }

            put(body, &mut cursor, self.payload)?;
            Ok(cursor)
        })
    }
}

// --- PUBACK Packet ---
#[derive(Debug)]
pub struct PubAck {
    pub packet_id: u16,
}

impl EncodePacket for PubAck {
    fn encode(&self, buf: &mut [u8]) -> Result<usize, CodecError> {
        encode_frame(buf, 0x40, |body| write_u16(body, self.packet_id))
    }
}

// --- SUBSCRIBE Packet ---
#[derive(Debug)]
pub struct Subscribe<'a> {
    pub packet_id: u16,
    pub topic: &'a str,
    pub qos: QoS,
}

impl<'a> Subscribe<'a> {
    /// Creates a new Subscribe packet with a single topic.
    pub fn new(packet_id: u16, topic: &'a str, qos: QoS) -> Self {
        Self {
            packet_id,
            topic,
            qos,
        }
    }
}

impl EncodePacket for Subscribe<'_> {
    fn encode(&self, buf: &mut [u8]) -> Result<usize, CodecError> {
        // Fixed header: SUBSCRIBE packet type (8) with reserved bits (0x02)
        encode_frame(buf, 0x82, |body| {
            let mut cursor = write_u16(body, self.packet_id)?;
            put_str(body, &mut cursor, self.topic)?;
            put(body, &mut cursor, &[self.qos as u8])?;
            Ok(cursor)
        })
    }
}

// --- SUBACK Packet ---
/// Acknowledgement of a single-topic `SUBSCRIBE`.
#[derive(Debug, PartialEq, Eq)]
pub struct SubAck {
    pub packet_id: u16,
    pub return_code: u8,
}

impl SubAck {
    /// Return code a broker uses to refuse a subscription.
    pub const FAILURE: u8 = 0x80;

    fn decode(body: &[u8]) -> Result<Self, CodecError> {
        match body {
            [id_hi, id_lo, return_code] => Ok(SubAck {
                packet_id: u16::from_be_bytes([*id_hi, *id_lo]),
                return_code: *return_code,
            }),
            _ => Err(MqttError::Protocol(ProtocolError::MalformedPacket)),
        }
    }
}

// --- UNSUBSCRIBE Packet ---
#[derive(Debug)]
pub struct Unsubscribe<'a> {
    pub packet_id: u16,
    pub topic: &'a str,
}

impl EncodePacket for Unsubscribe<'_> {
    fn encode(&self, buf: &mut [u8]) -> Result<usize, CodecError> {
        // Fixed header: UNSUBSCRIBE packet type (10) with reserved bits (0x02)
        encode_frame(buf, 0xA2, |body| {
            let mut cursor = write_u16(body, self.packet_id)?;
            put_str(body, &mut cursor, self.topic)?;
            Ok(cursor)
        })
    }
}

// --- PINGREQ Packet ---
#[derive(Debug)]
pub struct PingReq;

impl EncodePacket for PingReq {
    fn encode(&self, buf: &mut [u8]) -> Result<usize, CodecError> {
        put(buf, &mut 0, &[0xC0, 0x00])?;
        Ok(2)
    }
}

// --- DISCONNECT Packet ---
#[derive(Debug)]
pub struct Disconnect;

impl EncodePacket for Disconnect {
    fn encode(&self, buf: &mut [u8]) -> Result<usize, CodecError> {
        put(buf, &mut 0, &[0xE0, 0x00])?;
        Ok(2)
    }
}
