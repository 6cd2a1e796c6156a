//! # Transport Abstractions
//!
//! The client talks to the outside world through three seams:
//!
//! - [`NetworkLink`]: the board's network association (Wi-Fi, Ethernet, ...).
//! - [`BrokerSession`]: a publish/subscribe session with the cloud broker.
//! - [`MqttTransport`]: the byte stream the bundled [`crate::session::MqttSession`]
//!   runs on. [`TcpTransport`] implements it on top of `embassy-net`.
//!
//! With the Rust 2024 Edition these traits use native `async fn`, removing the
//! need for the `#[async_trait]` macro.

use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::{ConnectError, Error as TcpError, TcpSocket};
use embassy_net::{IpEndpoint, Stack};
use embassy_time::{Duration, Timer};
use embedded_io_async::Write;

use crate::config::BrokerEndpoint;
use crate::fmt::{debug, warn};

/// A marker trait for transport-related errors.
pub trait TransportError: core::fmt::Debug {
    /// Whether the error only means "nothing arrived in time".
    ///
    /// Sessions use this to tell an idle link apart from a broken one.
    fn is_timeout(&self) -> bool {
        false
    }
}

/// Association state reported by a [`NetworkLink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LinkStatus {
    /// No attach has been requested yet.
    Idle,
    /// The requested network could not be found.
    NoNetworkAvailable,
    /// Attach is in progress.
    Connecting,
    /// The link is up and has an address.
    Connected,
    /// The last attach attempt failed.
    ConnectFailed,
    /// The link was up and dropped.
    ConnectionLost,
    /// The link was detached on request.
    Disconnected,
}

/// The board's network association.
///
/// Implementations are board specific and provided by the application.
pub trait NetworkLink {
    /// Starts attaching to the given network. Must not block until the link is up.
    fn attach(&mut self, ssid: &str, password: &str);

    /// Current association state.
    fn status(&self) -> LinkStatus;

    /// `true` when the link can carry traffic.
    fn is_up(&self) -> bool {
        self.status() == LinkStatus::Connected
    }

    /// Hardware address of the network interface.
    fn mac_address(&self) -> [u8; 6];

    /// Tears the association down.
    fn detach(&mut self);
}

/// Receiver for messages delivered by a [`BrokerSession`].
///
/// This trait is object safe so sessions can take `&mut dyn InboundHandler`.
pub trait InboundHandler {
    /// Called once per inbound message, in delivery order.
    fn on_message(&mut self, topic: &str, payload: &[u8]);
}

/// A publish/subscribe session with the cloud broker.
///
/// Every operation reports failure through its own result; the session
/// never panics on transport trouble.
#[allow(async_fn_in_trait)]
pub trait BrokerSession {
    /// The error type returned by the session.
    type Error: TransportError + Clone;

    /// Sets the broker the next `connect` should reach.
    fn begin(&mut self, endpoint: &BrokerEndpoint);

    /// Performs one connect handshake.
    async fn connect(&mut self, client_id: &str, username: &str) -> Result<(), Self::Error>;

    /// Whether the session currently reports a live broker connection.
    fn is_connected(&self) -> bool;

    /// Publishes `payload` on `topic` without the retain flag.
    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error>;

    /// Subscribes to a single exact topic.
    async fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error>;

    /// Removes a subscription made with [`BrokerSession::subscribe`].
    async fn unsubscribe(&mut self, topic: &str) -> Result<(), Self::Error>;

    /// Services the inbound queue and keep-alive timers.
    ///
    /// Messages that arrive are handed to `handler` synchronously, in order.
    async fn poll(&mut self, handler: &mut dyn InboundHandler) -> Result<(), Self::Error>;

    /// Closes the session. Calling it on a closed session does nothing.
    async fn disconnect(&mut self);
}

/// A byte stream carrying MQTT packets.
#[allow(async_fn_in_trait)]
pub trait MqttTransport {
    /// The error type returned by the transport.
    type Error: TransportError + Clone;

    /// Opens the stream to `host:port`.
    async fn open(&mut self, host: &str, port: u16) -> Result<(), Self::Error>;

    /// Sends a buffer of data over the transport.
    async fn send(&mut self, buf: &[u8]) -> Result<(), Self::Error>;

    /// Receives data from the transport into a buffer.
    ///
    /// Returns the number of bytes read.
    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error>;

    /// Closes the stream. Closing a closed stream does nothing.
    fn close(&mut self);
}

/// Errors reported by [`TcpTransport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TcpTransportError {
    /// The broker host name could not be resolved.
    Dns,
    /// The TCP connect failed.
    Connect(ConnectError),
    /// A read or write on the socket failed.
    Io(TcpError),
    /// The peer closed the connection.
    Closed,
    /// Nothing arrived before the read timeout.
    Timeout,
}

impl TransportError for TcpTransportError {
    fn is_timeout(&self) -> bool {
        matches!(self, TcpTransportError::Timeout)
    }
}

/// TCP transport implementation using `embassy-net`.
pub struct TcpTransport<'a> {
    stack: Stack<'a>,
    socket: TcpSocket<'a>,
    timeout: Duration,
}

impl<'a> TcpTransport<'a> {
    /// Creates a new `TcpTransport` with the given stack, socket and read timeout.
    ///
    /// The read timeout doubles as the keep-alive tick of the session.
    pub fn new(stack: Stack<'a>, socket: TcpSocket<'a>, timeout: Duration) -> Self {
        Self {
            stack,
            socket,
            timeout,
        }
    }

    /// A helper function to perform a read with a timeout.
    async fn read_with_timeout(&mut self, buf: &mut [u8]) -> Result<usize, TcpTransportError> {
        // Use `select` to race the read operation against a timer.
        let read_fut = self.socket.read(buf);
        let timer = Timer::after(self.timeout);

        match futures::future::select(core::pin::pin!(read_fut), core::pin::pin!(timer)).await {
            futures::future::Either::Left((Ok(0), _)) => {
                // If the peer closes the connection, read returns 0.
                warn!("tcp connection closed by peer");
                Err(TcpTransportError::Closed)
            }
            futures::future::Either::Left((Ok(n), _)) => Ok(n),
            futures::future::Either::Left((Err(e), _)) => {
                warn!("tcp read failed");
                Err(TcpTransportError::Io(e))
            }
            futures::future::Either::Right(((), _)) => Err(TcpTransportError::Timeout),
        }
    }
}

impl<'a> MqttTransport for TcpTransport<'a> {
    type Error = TcpTransportError;

    async fn open(&mut self, host: &str, port: u16) -> Result<(), Self::Error> {
        self.socket.abort();

        let address = self
            .stack
            .dns_query(host, DnsQueryType::A)
            .await
            .map_err(|_| TcpTransportError::Dns)?
            .first()
            .copied()
            .ok_or(TcpTransportError::Dns)?;

        debug!("tcp connecting to {}:{}", host, port);
        self.socket
            .connect(IpEndpoint::new(address, port))
            .await
            .map_err(TcpTransportError::Connect)
    }

    async fn send(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        self.socket
            .write_all(buf)
            .await
            .map_err(TcpTransportError::Io)?;

        // Flush to ensure data is actually sent to the network
        self.socket.flush().await.map_err(TcpTransportError::Io)
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.read_with_timeout(buf).await
    }

    fn close(&mut self) {
        self.socket.close();
    }
}
