//! # Slot-addressed Cloud Client for Embedded Boards
//!
//! `myrtio-slotlink` connects a network-attached sensor/actuator board to a
//! cloud MQTT broker. A board publishes numeric readings and control states to
//! numbered *slots* and receives values written to its slots by the cloud.
//!
//! ## Core Features
//!
//! - **`no_std` & `no_alloc`:** Every string has a fixed capacity (`heapless`).
//! - **Fully Async:** Built with `async/await` on the Embassy ecosystem. Setup
//!   waits pause through an injected `DelayNs` instead of spinning.
//! - **Two topic families:** `data/<device_key>/<slot>` and
//!   `control/<device_key>/<slot>`, plus their `retain/` variants.
//! - **Transport Agnostic:** The broker session sits behind the
//!   [`BrokerSession`] trait. [`MqttSession`] is a small MQTT 3.1.1 session
//!   that runs over any [`MqttTransport`], including [`TcpTransport`].
//!
//! ## Usage
//!
//! ```ignore
//! let mut client = CloudClient::new(identity, wifi, session, ClientOptions::default());
//! client.begin("ssid", "password").await;
//! client.wait_until_ready(&mut delay).await;
//!
//! client.set_data(1, 23.5).await?;      // "data/<key>/1" <- "23.5000"
//! client.set_control(2, true).await?;   // "control/<key>/2" <- "on"
//! client.subscribe_control(2).await?;
//!
//! loop {
//!     client.poll().await.ok();
//! }
//! ```
//!
//! ## Logging
//!
//! Enable one of the `log`, `defmt` or `esp32-log` features to get internal
//! logging. Without any of them logging compiles away.

#![cfg_attr(not(test), no_std)]

mod fmt;

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod identity;
pub mod packet;
pub mod payload;
mod publish;
pub mod router;
pub mod session;
pub mod topic;
pub mod transport;
pub mod util;

#[cfg(test)]
pub(crate) mod mock;

// Re-export key types for easier access at the crate root.
pub use client::CloudClient;
pub use config::{BrokerEndpoint, ClientOptions, UsernamePolicy};
pub use connection::{ConnectionManager, ConnectionState};
pub use error::{ClientError, MqttError};
pub use identity::Identity;
pub use payload::{CONTROL_OFF, CONTROL_ON, ControlValue};
pub use router::{ControlHandler, DataHandler, MessageRouter};
pub use session::MqttSession;
pub use topic::{Family, Topic};
pub use transport::{
    BrokerSession, InboundHandler, LinkStatus, MqttTransport, NetworkLink, TcpTransport,
};
