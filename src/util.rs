//! # MQTT Serialization Utilities
//!
//! This module provides helper functions for reading and writing MQTT-specific data types
//! from and to byte buffers, such as variable-byte integers and length-prefixed strings.

use crate::error::{CodecError, MqttError, ProtocolError};

/// Largest value a variable-byte integer can carry.
pub const MAX_VARIABLE_BYTE_INTEGER: usize = 268_435_455;

/// Reads a variable-byte integer from the buffer, advancing the cursor.
///
/// This is a common encoding scheme in MQTT for packet lengths.
pub fn read_variable_byte_integer(cursor: &mut usize, buf: &[u8]) -> Result<usize, CodecError> {
    let mut multiplier = 1;
    let mut value = 0;
    let mut i = 0;
    loop {
        let encoded_byte = buf
            .get(*cursor + i)
            .ok_or(MqttError::Protocol(ProtocolError::MalformedPacket))?;
        value += (encoded_byte & 127) as usize * multiplier;
        if (encoded_byte & 128) == 0 {
            break;
        }
        multiplier *= 128;
        i += 1;
        if i >= 4 {
            return Err(MqttError::Protocol(ProtocolError::MalformedPacket));
        }
    }
    *cursor += i + 1;
    Ok(value)
}

/// Writes a variable-byte integer at the start of `buf` and returns the byte count.
pub fn write_variable_byte_integer(buf: &mut [u8], mut val: usize) -> Result<usize, CodecError> {
    if val > MAX_VARIABLE_BYTE_INTEGER {
        return Err(MqttError::Protocol(ProtocolError::PayloadTooLarge));
    }
    let mut i = 0;
    loop {
        let mut encoded_byte = (val % 128) as u8;
        val /= 128;
        if val > 0 {
            encoded_byte |= 128;
        }
        *buf.get_mut(i).ok_or(MqttError::BufferTooSmall)? = encoded_byte;
        i += 1;
        if val == 0 {
            break;
        }
    }
    Ok(i)
}

/// Reads a big-endian `u16`, advancing the cursor.
pub fn read_u16(cursor: &mut usize, buf: &[u8]) -> Result<u16, CodecError> {
    let bytes = buf
        .get(*cursor..*cursor + 2)
        .ok_or(MqttError::Protocol(ProtocolError::MalformedPacket))?;
    *cursor += 2;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

/// Writes a big-endian `u16` at the start of `buf` and returns the byte count.
pub fn write_u16(buf: &mut [u8], val: u16) -> Result<usize, CodecError> {
    buf.get_mut(0..2)
        .ok_or(MqttError::BufferTooSmall)?
        .copy_from_slice(&val.to_be_bytes());
    Ok(2)
}

/// Reads a UTF-8 encoded string (prefixed with a 2-byte length) from the buffer.
pub fn read_utf8_string<'a>(cursor: &mut usize, buf: &'a [u8]) -> Result<&'a str, CodecError> {
    let len = read_u16(cursor, buf)? as usize;
    let s = core::str::from_utf8(
        buf.get(*cursor..*cursor + len)
            .ok_or(MqttError::Protocol(ProtocolError::MalformedPacket))?,
    )
    .map_err(|_| MqttError::Protocol(ProtocolError::InvalidUtf8String))?;
    *cursor += len;
    Ok(s)
}

/// Writes a UTF-8 encoded string (prefixed with a 2-byte length) to the buffer.
pub fn write_utf8_string(buf: &mut [u8], s: &str) -> Result<usize, CodecError> {
    let len = s.len();
    if len > u16::MAX as usize {
        return Err(MqttError::Protocol(ProtocolError::PayloadTooLarge));
    }
    let len_bytes = (len as u16).to_be_bytes();

    let required_space = 2 + len;
    let slice = buf
        .get_mut(0..required_space)
        .ok_or(MqttError::BufferTooSmall)?;

    slice[0..2].copy_from_slice(&len_bytes);
    slice[2..].copy_from_slice(s.as_bytes());
    Ok(required_space)
}
