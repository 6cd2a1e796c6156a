//! # Bundled Broker Session
//!
//! [`MqttSession`] implements [`BrokerSession`] with MQTT 3.1.1 at QoS 0 on
//! top of any [`MqttTransport`]. It owns a single packet buffer and keeps no
//! outgoing queue.
//!
//! Keep-alive follows the interval announced in `CONNECT`. Every `poll`
//! first checks the clock: after a full interval without outbound traffic it
//! sends `PINGREQ`, and when a ping goes a full interval without `PINGRESP`
//! the broker is considered gone. A read timeout on its own only means the
//! link is idle.

use embassy_time::{Duration, Instant};

use crate::config::BrokerEndpoint;
use crate::error::{ConnectReasonCode, MqttError, ProtocolError};
use crate::fmt::{debug, trace, warn};
use crate::packet::{
    self, Connect, Disconnect, EncodePacket, MqttPacket, PingReq, PubAck, Publish, QoS, SubAck,
    Subscribe, Unsubscribe,
};
use crate::transport::{BrokerSession, InboundHandler, MqttTransport, TransportError};

/// Keep-alive announced in `CONNECT`, in seconds.
pub const DEFAULT_KEEP_ALIVE_SECS: u16 = 60;

/// How long `connect` waits for `CONNACK`.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// An MQTT 3.1.1 session over a byte transport.
///
/// `BUF_SIZE` bounds both outgoing and incoming packets.
pub struct MqttSession<T: MqttTransport, const BUF_SIZE: usize> {
    transport: T,
    endpoint: Option<BrokerEndpoint>,
    keep_alive_secs: u16,
    connect_timeout: Duration,
    clock: fn() -> Instant,
    connected: bool,
    next_packet_id: u16,
    last_sent: Instant,
    ping_sent_at: Option<Instant>,
    buf: [u8; BUF_SIZE],
}

impl<T: MqttTransport, const BUF_SIZE: usize> MqttSession<T, BUF_SIZE> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            endpoint: None,
            keep_alive_secs: DEFAULT_KEEP_ALIVE_SECS,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            clock: Instant::now,
            connected: false,
            next_packet_id: 1,
            last_sent: Instant::from_ticks(0),
            ping_sent_at: None,
            buf: [0; BUF_SIZE],
        }
    }

    /// Sets the keep-alive interval. Zero turns keep-alive off.
    pub fn with_keep_alive(mut self, secs: u16) -> Self {
        self.keep_alive_secs = secs;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Replaces the time source. Defaults to [`Instant::now`].
    pub fn with_clock(mut self, clock: fn() -> Instant) -> Self {
        self.clock = clock;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn now(&self) -> Instant {
        (self.clock)()
    }

    fn packet_id(&mut self) -> u16 {
        let id = self.next_packet_id;
        self.next_packet_id = self.next_packet_id.checked_add(1).unwrap_or(1);
        id
    }

    fn ensure_connected(&self) -> Result<(), MqttError<T::Error>> {
        if self.connected {
            Ok(())
        } else {
            Err(MqttError::NotConnected)
        }
    }

    /// Marks the session down and closes the transport.
    fn drop_connection(&mut self) {
        if self.connected {
            debug!("broker session dropped");
        }
        self.connected = false;
        self.ping_sent_at = None;
        self.transport.close();
    }

    async fn send_packet(&mut self, packet: &impl EncodePacket) -> Result<(), MqttError<T::Error>> {
        let len = packet.encode(&mut self.buf).map_err(|e| e.widen())?;
        if let Err(err) = self.transport.send(&self.buf[..len]).await {
            self.drop_connection();
            return Err(MqttError::Transport(err));
        }
        self.last_sent = self.now();
        Ok(())
    }

    async fn read_exact(&mut self, start: usize, end: usize) -> Result<(), MqttError<T::Error>> {
        let mut pos = start;
        while pos < end {
            let n = self
                .transport
                .recv(&mut self.buf[pos..end])
                .await
                .map_err(MqttError::Transport)?;
            if n == 0 {
                return Err(MqttError::Protocol(ProtocolError::ConnectionClosed));
            }
            pos += n;
        }
        Ok(())
    }

    /// Reads one whole packet into the buffer and returns its length.
    ///
    /// A transport timeout before the first byte is passed through as is. A
    /// timeout once the packet has started is reported as [`MqttError::Timeout`].
    async fn read_packet(&mut self) -> Result<usize, MqttError<T::Error>> {
        if BUF_SIZE < 5 {
            return Err(MqttError::BufferTooSmall);
        }
        self.read_exact(0, 1).await?;

        self.read_rest().await.map_err(|err| match err {
            MqttError::Transport(e) if e.is_timeout() => MqttError::Timeout,
            other => other,
        })
    }

    async fn read_rest(&mut self) -> Result<usize, MqttError<T::Error>> {
        let mut header_len = 1;
        loop {
            self.read_exact(header_len, header_len + 1).await?;
            header_len += 1;
            if self.buf[header_len - 1] & 0x80 == 0 {
                break;
            }
            if header_len == 5 {
                return Err(MqttError::Protocol(ProtocolError::MalformedPacket));
            }
        }

        let mut cursor = 1;
        let remaining = crate::util::read_variable_byte_integer(&mut cursor, &self.buf[..header_len])
            .map_err(|e| e.widen())?;
        let total = header_len + remaining;
        if total > BUF_SIZE {
            return Err(MqttError::BufferTooSmall);
        }

        self.read_exact(header_len, total).await?;
        Ok(total)
    }

    /// Waits for `CONNACK` until the connect deadline passes.
    async fn read_connack(&mut self) -> Result<(), MqttError<T::Error>> {
        let started = self.now();
        let len = loop {
            match self.read_packet().await {
                Ok(len) => break len,
                Err(MqttError::Transport(err)) if err.is_timeout() => {
                    if self.now().saturating_duration_since(started) >= self.connect_timeout {
                        warn!("no CONNACK before the connect deadline");
                        return Err(MqttError::Timeout);
                    }
                }
                Err(err) => return Err(err),
            }
        };

        match packet::decode(&self.buf[..len]) {
            Ok(Some(MqttPacket::ConnAck(ack))) => match ConnectReasonCode::from(ack.return_code) {
                ConnectReasonCode::Success => Ok(()),
                code => Err(MqttError::ConnectionRefused(code)),
            },
            Ok(_) => Err(MqttError::Protocol(ProtocolError::InvalidResponse)),
            Err(err) => Err(err.widen()),
        }
    }

    /// Sends `PINGREQ` after a quiet interval and detects a silent broker.
    async fn service_keep_alive(&mut self) -> Result<(), MqttError<T::Error>> {
        if self.keep_alive_secs == 0 {
            return Ok(());
        }
        let keep_alive = Duration::from_secs(u64::from(self.keep_alive_secs));
        let now = self.now();

        match self.ping_sent_at {
            Some(sent_at) if now.saturating_duration_since(sent_at) >= keep_alive => {
                warn!("no PINGRESP within {} s", self.keep_alive_secs);
                self.drop_connection();
                Err(MqttError::Timeout)
            }
            Some(_) => Ok(()),
            None if now.saturating_duration_since(self.last_sent) >= keep_alive => {
                trace!("sending ping");
                self.send_packet(&PingReq).await?;
                self.ping_sent_at = Some(now);
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl<T: MqttTransport, const BUF_SIZE: usize> BrokerSession for MqttSession<T, BUF_SIZE> {
    type Error = MqttError<T::Error>;

    fn begin(&mut self, endpoint: &BrokerEndpoint) {
        self.endpoint = Some(*endpoint);
    }

    async fn connect(&mut self, client_id: &str, username: &str) -> Result<(), Self::Error> {
        let endpoint = self.endpoint.ok_or(MqttError::NotConfigured)?;
        self.drop_connection();

        self.transport
            .open(endpoint.host, endpoint.port)
            .await
            .map_err(MqttError::Transport)?;

        let connect = Connect::new(client_id, self.keep_alive_secs, true).with_username(username);
        self.send_packet(&connect).await?;

        let result = self.read_connack().await;
        match result {
            Ok(()) => {
                self.connected = true;
                self.ping_sent_at = None;
            }
            Err(_) => self.drop_connection(),
        }
        result
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error> {
        self.ensure_connected()?;
        self.send_packet(&Publish::new(topic, payload)).await
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        self.ensure_connected()?;
        let packet_id = self.packet_id();
        self.send_packet(&Subscribe::new(packet_id, topic, QoS::AtMostOnce))
            .await
    }

    async fn unsubscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        self.ensure_connected()?;
        let packet_id = self.packet_id();
        self.send_packet(&Unsubscribe { packet_id, topic }).await
    }

    async fn poll(&mut self, handler: &mut dyn InboundHandler) -> Result<(), Self::Error> {
        self.ensure_connected()?;
        self.service_keep_alive().await?;

        let len = match self.read_packet().await {
            Ok(len) => len,
            Err(MqttError::Transport(err)) if err.is_timeout() => return Ok(()),
            Err(err) => {
                self.drop_connection();
                return Err(err);
            }
        };

        let mut ack = None;
        match packet::decode(&self.buf[..len]) {
            Ok(Some(MqttPacket::Publish(publish))) => {
                if publish.qos == QoS::AtLeastOnce {
                    ack = publish.packet_id;
                }
                handler.on_message(publish.topic, publish.payload);
            }
            Ok(Some(MqttPacket::PingResp)) => self.ping_sent_at = None,
            Ok(Some(MqttPacket::SubAck(suback))) if suback.return_code == SubAck::FAILURE => {
                warn!("broker refused subscription {}", suback.packet_id);
            }
            Ok(Some(_)) | Ok(None) => {}
            Err(err) => {
                self.drop_connection();
                return Err(err.widen());
            }
        }

        if let Some(packet_id) = ack {
            self.send_packet(&PubAck { packet_id }).await?;
        }
        Ok(())
    }

    async fn disconnect(&mut self) {
        if self.connected {
            let _ = self.send_packet(&Disconnect).await;
        }
        self.drop_connection();
    }
}
