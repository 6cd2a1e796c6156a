//! Scripted stand-ins for the transport seams, shared by the unit tests.

use std::cell::Cell;
use std::collections::VecDeque;
use std::string::{String, ToString};
use std::vec::Vec;

use embedded_hal_async::delay::DelayNs;

use crate::config::BrokerEndpoint;
use crate::transport::{
    BrokerSession, InboundHandler, LinkStatus, MqttTransport, NetworkLink, TransportError,
};

/// A network link whose state is set by the test.
pub struct MockNetwork {
    up: bool,
    /// Number of status checks that still report `Connecting` before the
    /// link comes up.
    pending_checks: Cell<u32>,
    pub attached_to: Option<String>,
    pub detach_calls: u32,
}

impl MockNetwork {
    pub fn up() -> Self {
        Self::up_after(0)
    }

    pub fn down() -> Self {
        Self {
            up: false,
            pending_checks: Cell::new(0),
            attached_to: None,
            detach_calls: 0,
        }
    }

    pub fn up_after(checks: u32) -> Self {
        Self {
            up: true,
            pending_checks: Cell::new(checks),
            ..Self::down()
        }
    }

    pub fn set_up(&mut self, up: bool) {
        self.up = up;
        self.pending_checks.set(0);
    }
}

impl NetworkLink for MockNetwork {
    fn attach(&mut self, ssid: &str, _password: &str) {
        self.attached_to = Some(ssid.to_string());
    }

    fn status(&self) -> LinkStatus {
        if !self.up {
            return LinkStatus::Disconnected;
        }
        match self.pending_checks.get() {
            0 => LinkStatus::Connected,
            n => {
                self.pending_checks.set(n - 1);
                LinkStatus::Connecting
            }
        }
    }

    fn mac_address(&self) -> [u8; 6] {
        [0x02, 0x00, 0x00, 0x00, 0x00, 0x01]
    }

    fn detach(&mut self) {
        self.detach_calls += 1;
        self.up = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MockError {
    Refused,
    NotConnected,
    Dropped,
}

impl TransportError for MockError {}

/// A broker session that records every call and replays queued messages.
#[derive(Default)]
pub struct MockBroker {
    pub endpoint: Option<BrokerEndpoint>,
    pub connected: bool,
    pub rejections_left: u32,
    pub fail_poll: bool,
    pub connect_calls: Vec<(String, String)>,
    pub published: Vec<(String, Vec<u8>)>,
    pub subscribe_calls: Vec<String>,
    pub unsubscribe_calls: Vec<String>,
    pub disconnect_calls: u32,
    pub inbound: VecDeque<(String, Vec<u8>)>,
}

impl MockBroker {
    pub fn accepting() -> Self {
        Self::default()
    }

    /// Refuses the first `count` connect attempts.
    pub fn rejecting(count: u32) -> Self {
        Self {
            rejections_left: count,
            ..Self::default()
        }
    }

    pub fn queue_inbound(&mut self, topic: &str, payload: &[u8]) {
        self.inbound.push_back((topic.to_string(), payload.to_vec()));
    }

    fn require_connected(&self) -> Result<(), MockError> {
        if self.connected {
            Ok(())
        } else {
            Err(MockError::NotConnected)
        }
    }
}

impl BrokerSession for MockBroker {
    type Error = MockError;

    fn begin(&mut self, endpoint: &BrokerEndpoint) {
        self.endpoint = Some(*endpoint);
    }

    async fn connect(&mut self, client_id: &str, username: &str) -> Result<(), Self::Error> {
        self.connect_calls
            .push((client_id.to_string(), username.to_string()));
        if self.rejections_left > 0 {
            self.rejections_left -= 1;
            return Err(MockError::Refused);
        }
        self.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), Self::Error> {
        self.require_connected()?;
        self.published.push((topic.to_string(), payload.to_vec()));
        Ok(())
    }

    async fn subscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        self.require_connected()?;
        self.subscribe_calls.push(topic.to_string());
        Ok(())
    }

    async fn unsubscribe(&mut self, topic: &str) -> Result<(), Self::Error> {
        self.require_connected()?;
        self.unsubscribe_calls.push(topic.to_string());
        Ok(())
    }

    async fn poll(&mut self, handler: &mut dyn InboundHandler) -> Result<(), Self::Error> {
        if self.fail_poll {
            self.connected = false;
            return Err(MockError::Dropped);
        }
        while let Some((topic, payload)) = self.inbound.pop_front() {
            handler.on_message(&topic, &payload);
        }
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.connected = false;
        self.disconnect_calls += 1;
    }
}

/// Collects every message it is handed.
#[derive(Default)]
pub struct RecordingHandler {
    pub messages: Vec<(String, Vec<u8>)>,
}

impl InboundHandler for RecordingHandler {
    fn on_message(&mut self, topic: &str, payload: &[u8]) {
        self.messages.push((topic.to_string(), payload.to_vec()));
    }
}

/// A delay that returns immediately and remembers what it was asked for.
#[derive(Default)]
pub struct MockDelay {
    pub calls_ms: Vec<u32>,
}

impl DelayNs for MockDelay {
    async fn delay_ns(&mut self, ns: u32) {
        self.calls_ms.push(ns / 1_000_000);
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.calls_ms.push(ms);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireError {
    Refused,
    Timeout,
    Closed,
}

impl TransportError for WireError {
    fn is_timeout(&self) -> bool {
        matches!(self, WireError::Timeout)
    }
}

/// A byte transport fed from a script of inbound chunks.
///
/// Each queued entry is returned by one `recv` call; an exhausted script
/// reads as a timeout.
#[derive(Default)]
pub struct MockWire {
    pub opened: Option<(String, u16)>,
    pub refuse_open: bool,
    pub fail_send: bool,
    pub closed: u32,
    pub sent: Vec<Vec<u8>>,
    pub inbound: VecDeque<Result<Vec<u8>, WireError>>,
}

impl MockWire {
    pub fn queue(&mut self, bytes: &[u8]) {
        self.inbound.push_back(Ok(bytes.to_vec()));
    }

    pub fn queue_error(&mut self, err: WireError) {
        self.inbound.push_back(Err(err));
    }
}

impl MqttTransport for MockWire {
    type Error = WireError;

    async fn open(&mut self, host: &str, port: u16) -> Result<(), Self::Error> {
        if self.refuse_open {
            return Err(WireError::Refused);
        }
        self.opened = Some((host.to_string(), port));
        Ok(())
    }

    async fn send(&mut self, buf: &[u8]) -> Result<(), Self::Error> {
        if self.fail_send {
            return Err(WireError::Closed);
        }
        self.sent.push(buf.to_vec());
        Ok(())
    }

    async fn recv(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let Some(mut chunk) = self.inbound.pop_front() else {
            return Err(WireError::Timeout);
        };
        if let Ok(bytes) = &mut chunk {
            if bytes.len() > buf.len() {
                let rest = bytes.split_off(buf.len());
                self.inbound.push_front(Ok(rest));
            }
        }
        let bytes = chunk?;
        buf[..bytes.len()].copy_from_slice(&bytes);
        Ok(bytes.len())
    }

    fn close(&mut self) {
        self.closed += 1;
    }
}
