//! # Error Types
//!
//! Two layers of errors live here. [`ClientError`] is what the public client
//! surface returns; it wraps whatever error the configured broker session
//! produces. [`MqttError`] belongs to the bundled MQTT 3.1.1 session and its
//! packet codec.

use core::convert::Infallible;

use crate::transport::TransportError;

/// Errors returned by the client's publish, subscribe and connect operations.
///
/// `E` is the error type of the broker session in use.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ClientError<E> {
    /// The broker session rejected or failed the operation.
    Transport(E),
    /// A broker connect was requested while the network link is down.
    NetworkDown,
    /// The rendered topic does not fit the topic buffer.
    TopicTooLong,
    /// The rendered payload does not fit the payload buffer.
    PayloadTooLarge,
}

impl<E> From<E> for ClientError<E>
where
    E: TransportError,
{
    fn from(err: E) -> Self {
        ClientError::Transport(err)
    }
}

/// Errors produced by the bundled MQTT session.
///
/// It is generic over the byte transport's error type `T`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MqttError<T> {
    /// An error occurred in the underlying transport layer.
    Transport(T),
    /// The peer violated the MQTT 3.1.1 wire format.
    Protocol(ProtocolError),
    /// The broker refused the connection. The enclosed code provides the reason.
    ConnectionRefused(ConnectReasonCode),
    /// The session is not connected to the broker.
    NotConnected,
    /// `connect` was called before `begin` supplied an endpoint.
    NotConfigured,
    /// The packet buffer is too small for the packet being encoded or read.
    BufferTooSmall,
    /// The broker stopped answering keep-alive pings.
    Timeout,
}

/// Error type of the packet codec, which never touches a transport.
pub type CodecError = MqttError<Infallible>;

impl CodecError {
    /// Widens a codec error into the error type of a concrete transport.
    pub fn widen<T>(self) -> MqttError<T> {
        match self {
            MqttError::Transport(never) => match never {},
            MqttError::Protocol(p) => MqttError::Protocol(p),
            MqttError::ConnectionRefused(c) => MqttError::ConnectionRefused(c),
            MqttError::NotConnected => MqttError::NotConnected,
            MqttError::NotConfigured => MqttError::NotConfigured,
            MqttError::BufferTooSmall => MqttError::BufferTooSmall,
            MqttError::Timeout => MqttError::Timeout,
        }
    }
}

impl<T: core::fmt::Debug> TransportError for MqttError<T> {
    fn is_timeout(&self) -> bool {
        matches!(self, MqttError::Timeout)
    }
}

/// Return codes carried by a `CONNACK` packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectReasonCode {
    /// The connection was accepted.
    Success,
    /// The broker does not support the requested MQTT protocol version.
    UnacceptableProtocolVersion,
    /// The client identifier is not valid.
    IdentifierRejected,
    /// The broker is unavailable.
    ServerUnavailable,
    /// The username or password is not valid.
    BadUserNameOrPassword,
    /// The client is not authorized to connect.
    NotAuthorized,
    /// A return code outside the MQTT 3.1.1 table.
    Other(u8),
}

impl From<u8> for ConnectReasonCode {
    fn from(val: u8) -> Self {
        match val {
            0 => Self::Success,
            1 => Self::UnacceptableProtocolVersion,
            2 => Self::IdentifierRejected,
            3 => Self::ServerUnavailable,
            4 => Self::BadUserNameOrPassword,
            5 => Self::NotAuthorized,
            _ => Self::Other(val),
        }
    }
}

/// Enumerates specific MQTT protocol errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    /// An invalid packet type was received.
    InvalidPacketType(u8),
    /// The broker answered with a packet that does not fit the exchange.
    InvalidResponse,
    /// The connection was closed by the broker.
    ConnectionClosed,
    /// A packet was received that was not correctly formed.
    MalformedPacket,
    /// A topic or payload exceeds what the wire format can carry.
    PayloadTooLarge,
    /// A string was not valid UTF-8.
    InvalidUtf8String,
}
