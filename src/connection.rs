//! # Connection Lifecycle
//!
//! [`ConnectionManager`] owns the network link and the broker session and
//! tracks where the board is on the way to a usable broker connection:
//!
//! ```text
//! Disconnected --begin--> NetworkAttaching --link up--> NetworkReady
//! NetworkReady --connect_broker--> BrokerConnecting --accepted--> Ready
//! BrokerConnecting --rejected--> NetworkReady
//! Ready --link lost--> NetworkAttaching
//! Ready --session lost--> NetworkReady
//! ```
//!
//! Transitions happen only inside the manager's own methods, in response to
//! what the link and the session report. Nothing here retries on its own;
//! callers drive retries through [`ConnectionManager::connect_broker`] or
//! [`ConnectionManager::wait_until_ready`].

use core::fmt::Write;

use embedded_hal_async::delay::DelayNs;
use heapless::String;

use crate::config::{ClientOptions, UsernamePolicy};
use crate::error::ClientError;
use crate::fmt::{debug, info, warn};
use crate::identity::Identity;
use crate::transport::{BrokerSession, InboundHandler, LinkStatus, NetworkLink};

/// `wf-` followed by six colon-separated hex pairs.
pub const CLIENT_ID_CAPACITY: usize = 20;

/// Owned, fixed-capacity broker client identifier.
pub type ClientId = String<CLIENT_ID_CAPACITY>;

/// Where the board is on the way to a usable broker connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    Disconnected,
    NetworkAttaching,
    NetworkReady,
    BrokerConnecting,
    Ready,
}

impl ConnectionState {
    pub const fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::NetworkAttaching => "network-attaching",
            ConnectionState::NetworkReady => "network-ready",
            ConnectionState::BrokerConnecting => "broker-connecting",
            ConnectionState::Ready => "ready",
        }
    }
}

/// Builds the broker client identifier from the interface's hardware address.
pub fn client_id(mac: [u8; 6]) -> ClientId {
    let mut id = ClientId::new();
    // Cannot fail: the rendered id is exactly `CLIENT_ID_CAPACITY` bytes.
    let _ = write!(
        id,
        "wf-{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    );
    id
}

/// Drives the network link and broker session through [`ConnectionState`].
pub struct ConnectionManager<N, B>
where
    N: NetworkLink,
    B: BrokerSession,
{
    network: N,
    session: B,
    options: ClientOptions,
    state: ConnectionState,
    last_error: Option<B::Error>,
}

impl<N, B> ConnectionManager<N, B>
where
    N: NetworkLink,
    B: BrokerSession,
{
    pub fn new(network: N, session: B, options: ClientOptions) -> Self {
        Self {
            network,
            session,
            options,
            state: ConnectionState::Disconnected,
            last_error: None,
        }
    }

    /// Starts attaching to the network and makes one broker connect attempt.
    ///
    /// Returns whether the board is ready right away. The network attach
    /// itself does not block; only the single broker attempt may.
    pub async fn begin(&mut self, identity: &Identity, ssid: &str, password: &str) -> bool {
        self.session.begin(&self.options.endpoint);
        self.network.attach(ssid, password);
        self.transition(ConnectionState::NetworkAttaching);

        if self.connect_broker(identity).await.is_err() {
            debug!("first broker connect did not succeed, retry later");
        }
        self.ready()
    }

    /// Waits until both the network and the broker session are up.
    ///
    /// Meant for setup code. Every iteration pauses through `delay` (or
    /// yields, when the retry interval is zero) so other tasks keep running.
    /// Returns `false` only when [`ClientOptions::max_ready_attempts`] runs out.
    pub async fn wait_until_ready<D: DelayNs>(
        &mut self,
        identity: &Identity,
        delay: &mut D,
    ) -> bool {
        let mut attempts: u32 = 0;

        while !self.network.is_up() {
            if !self.consume_attempt(&mut attempts) {
                return false;
            }
            self.pause(delay).await;
        }
        self.sync();

        while !self.session.is_connected() {
            if !self.consume_attempt(&mut attempts) {
                return false;
            }
            if self.connect_broker(identity).await.is_err() {
                self.pause(delay).await;
            }
        }

        self.sync();
        self.ready()
    }

    /// `true` iff the link is up and the session reports a live connection.
    pub fn ready(&self) -> bool {
        self.network.is_up() && self.session.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn network_status(&self) -> LinkStatus {
        self.network.status()
    }

    /// The most recent error reported by the broker session.
    pub fn last_error(&self) -> Option<&B::Error> {
        self.last_error.as_ref()
    }

    /// Makes a single broker connect attempt.
    ///
    /// The client id is derived from the interface's hardware address and
    /// the username from the configured [`UsernamePolicy`]. Failure is not
    /// fatal; the caller decides when to try again.
    pub async fn connect_broker(
        &mut self,
        identity: &Identity,
    ) -> Result<(), ClientError<B::Error>> {
        self.sync();
        if !self.network.is_up() {
            debug!("broker connect skipped, network is down");
            return Err(ClientError::NetworkDown);
        }

        let client_id = client_id(self.network.mac_address());
        let username = match self.options.username_policy {
            UsernamePolicy::AccountId => identity.account_id(),
            UsernamePolicy::DeviceKey => identity.device_key(),
        };

        self.transition(ConnectionState::BrokerConnecting);
        info!(
            "connecting to {}:{} as {}",
            self.options.endpoint.host,
            self.options.endpoint.port,
            client_id.as_str()
        );

        match self.session.connect(&client_id, username).await {
            Ok(()) => {
                self.transition(ConnectionState::Ready);
                Ok(())
            }
            Err(err) => {
                warn!("broker connect failed");
                self.last_error = Some(err.clone());
                self.transition(ConnectionState::NetworkReady);
                self.sync();
                Err(ClientError::Transport(err))
            }
        }
    }

    /// Services the session's inbound queue and keep-alive timers.
    ///
    /// Inbound messages go to `handler` before this returns. When the session
    /// is down this only refreshes the state.
    pub async fn service(
        &mut self,
        handler: &mut dyn InboundHandler,
    ) -> Result<(), ClientError<B::Error>> {
        self.sync();
        if !self.session.is_connected() {
            return Ok(());
        }

        let result = self.session.poll(handler).await;
        if let Err(err) = &result {
            warn!("broker session poll failed");
            self.last_error = Some(err.clone());
        }
        self.sync();
        result.map_err(ClientError::Transport)
    }

    /// Closes the broker session, then detaches the network.
    ///
    /// Calling it again once disconnected does nothing.
    pub async fn disconnect(&mut self) {
        if self.state == ConnectionState::Disconnected && !self.session.is_connected() {
            return;
        }

        if self.session.is_connected() {
            self.session.disconnect().await;
        }
        self.network.detach();
        self.transition(ConnectionState::Disconnected);
    }

    /// Publishes through the session, recording failures.
    pub(crate) async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
    ) -> Result<(), ClientError<B::Error>> {
        let result = self.session.publish(topic, payload).await;
        self.record(result)
    }

    /// Subscribes or unsubscribes through the session, recording failures.
    pub(crate) async fn set_subscription(
        &mut self,
        topic: &str,
        subscribed: bool,
    ) -> Result<(), ClientError<B::Error>> {
        let result = if subscribed {
            self.session.subscribe(topic).await
        } else {
            self.session.unsubscribe(topic).await
        };
        self.record(result)
    }

    pub fn network(&self) -> &N {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut N {
        &mut self.network
    }

    pub fn session(&self) -> &B {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut B {
        &mut self.session
    }

    fn record(&mut self, result: Result<(), B::Error>) -> Result<(), ClientError<B::Error>> {
        result.map_err(|err| {
            self.last_error = Some(err.clone());
            self.sync();
            ClientError::Transport(err)
        })
    }

    /// Applies the transitions implied by what the link and session report.
    fn sync(&mut self) {
        if self.state == ConnectionState::Disconnected {
            return;
        }

        let next = if !self.network.is_up() {
            ConnectionState::NetworkAttaching
        } else if self.session.is_connected() {
            ConnectionState::Ready
        } else {
            ConnectionState::NetworkReady
        };
        self.transition(next);
    }

    fn transition(&mut self, next: ConnectionState) {
        if self.state != next {
            debug!("connection {} -> {}", self.state.as_str(), next.as_str());
            self.state = next;
        }
    }

    fn consume_attempt(&self, attempts: &mut u32) -> bool {
        if let Some(max) = self.options.max_ready_attempts {
            if *attempts >= max {
                warn!("gave up waiting for broker after {} attempts", max);
                return false;
            }
        }
        *attempts += 1;
        true
    }

    async fn pause<D: DelayNs>(&self, delay: &mut D) {
        let millis = self.options.retry_interval.as_millis();
        if millis == 0 {
            embassy_futures::yield_now().await;
        } else {
            delay.delay_ms(u32::try_from(millis).unwrap_or(u32::MAX)).await;
        }
    }
}
