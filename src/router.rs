//! Inbound message routing.
//!
//! The router sits behind [`InboundHandler`]: the broker session hands it
//! every message, the router classifies the topic and calls at most one
//! handler. Anything it cannot place is dropped without an error.

use crate::fmt::trace;
use crate::payload::parse_number;
use crate::topic::{self, Family};
use crate::transport::InboundHandler;

/// Receives values published to the board's data slots.
pub trait DataHandler {
    fn on_data(&mut self, slot: u8, value: f64);
}

impl<F: FnMut(u8, f64)> DataHandler for F {
    fn on_data(&mut self, slot: u8, value: f64) {
        self(slot, value)
    }
}

/// Receives states published to the board's control slots.
pub trait ControlHandler {
    fn on_control(&mut self, slot: u8, state: &str);
}

impl<F: FnMut(u8, &str)> ControlHandler for F {
    fn on_control(&mut self, slot: u8, state: &str) {
        self(slot, state)
    }
}

/// Dispatches inbound messages to the registered data or control handler.
///
/// Each family holds at most one handler; registering again replaces it.
/// Dispatch takes `&mut self`, so a handler can never re-enter the router.
#[derive(Default)]
pub struct MessageRouter<'h> {
    data: Option<&'h mut dyn DataHandler>,
    control: Option<&'h mut dyn ControlHandler>,
}

impl<'h> MessageRouter<'h> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_data_handler(&mut self, handler: &'h mut dyn DataHandler) {
        self.data = Some(handler);
    }

    pub fn set_control_handler(&mut self, handler: &'h mut dyn ControlHandler) {
        self.control = Some(handler);
    }

    pub fn clear_data_handler(&mut self) {
        self.data = None;
    }

    pub fn clear_control_handler(&mut self) {
        self.control = None;
    }

    pub fn has_data_handler(&self) -> bool {
        self.data.is_some()
    }

    pub fn has_control_handler(&self) -> bool {
        self.control.is_some()
    }
}

impl InboundHandler for MessageRouter<'_> {
    fn on_message(&mut self, topic: &str, payload: &[u8]) {
        let Some(decoded) = topic::decode(topic) else {
            trace!("dropping message on unrouted topic {}", topic);
            return;
        };

        match decoded.family {
            Family::Data => match self.data.as_deref_mut() {
                Some(handler) => handler.on_data(decoded.slot, parse_number(payload)),
                None => trace!("no data handler for slot {}", decoded.slot),
            },
            Family::Control => {
                let Some(handler) = self.control.as_deref_mut() else {
                    trace!("no control handler for slot {}", decoded.slot);
                    return;
                };
                match core::str::from_utf8(payload) {
                    Ok(state) => handler.on_control(decoded.slot, state),
                    Err(_) => trace!("control payload for slot {} is not utf-8", decoded.slot),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_message_reaches_data_handler_once() {
        let mut seen = Vec::new();
        {
            let mut on_data = |slot: u8, value: f64| seen.push((slot, value));
            let mut router = MessageRouter::new();
            router.set_data_handler(&mut on_data);
            router.on_message("data/key/3", b"12.5000");
        }
        assert_eq!(seen, vec![(3, 12.5)]);
    }

    #[test]
    fn control_message_passes_raw_text() {
        let mut seen = Vec::new();
        {
            let mut on_control = |slot: u8, state: &str| seen.push((slot, state.to_string()));
            let mut router = MessageRouter::new();
            router.set_control_handler(&mut on_control);
            router.on_message("control/key/9", b"on");
            router.on_message("control/key/1", b" 1.5 ");
        }
        assert_eq!(
            seen,
            vec![(9, "on".to_string()), (1, " 1.5 ".to_string())]
        );
    }

    #[test]
    fn unparsable_data_reads_as_zero() {
        let mut seen = Vec::new();
        {
            let mut on_data = |slot: u8, value: f64| seen.push((slot, value));
            let mut router = MessageRouter::new();
            router.set_data_handler(&mut on_data);
            router.on_message("data/key/4", b"off");
        }
        assert_eq!(seen, vec![(4, 0.0)]);
    }

    #[test]
    fn messages_without_handler_are_dropped() {
        let mut data_calls = 0;
        {
            let mut on_data = |_: u8, _: f64| data_calls += 1;
            let mut router = MessageRouter::new();
            router.set_data_handler(&mut on_data);
            router.on_message("control/key/1", b"on");
            router.on_message("retain/data/key/1", b"");
            router.on_message("dataXYZ/key/1", b"1");
            router.on_message("sys/broker", b"hello");
        }
        assert_eq!(data_calls, 0);

        let mut router = MessageRouter::new();
        router.on_message("data/key/1", b"1");
        router.on_message("control/key/1", b"on");
    }

    #[test]
    fn invalid_utf8_control_payload_is_dropped() {
        let mut control_calls = 0;
        {
            let mut on_control = |_: u8, _: &str| control_calls += 1;
            let mut router = MessageRouter::new();
            router.set_control_handler(&mut on_control);
            router.on_message("control/key/1", &[0xff, 0x00]);
        }
        assert_eq!(control_calls, 0);
    }

    #[test]
    fn later_registration_replaces_earlier_one() {
        let mut first = 0;
        let mut second = 0;
        {
            let mut on_first = |_: u8, _: f64| first += 1;
            let mut on_second = |_: u8, _: f64| second += 1;
            let mut router = MessageRouter::new();
            router.set_data_handler(&mut on_first);
            router.set_data_handler(&mut on_second);
            router.on_message("data/key/1", b"1");
        }
        assert_eq!((first, second), (0, 1));
    }

    #[test]
    fn cleared_handler_stops_receiving() {
        let mut calls = 0;
        {
            let mut on_data = |_: u8, _: f64| calls += 1;
            let mut router = MessageRouter::new();
            router.set_data_handler(&mut on_data);
            router.on_message("data/key/1", b"1");
            router.clear_data_handler();
            assert!(!router.has_data_handler());
            router.on_message("data/key/1", b"1");
        }
        assert_eq!(calls, 1);
    }

    #[test]
    fn delivery_order_is_preserved() {
        let mut seen = Vec::new();
        {
            let mut on_data = |slot: u8, _: f64| seen.push(slot);
            let mut router = MessageRouter::new();
            router.set_data_handler(&mut on_data);
            for slot in [5u8, 1, 3] {
                let topic = format!("data/key/{slot}");
                router.on_message(&topic, b"0");
            }
        }
        assert_eq!(seen, vec![5, 1, 3]);
    }
}
