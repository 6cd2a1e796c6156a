//! # Cloud Client
//!
//! [`CloudClient`] is what application firmware holds. It ties an
//! [`Identity`], a [`ConnectionManager`] and a [`MessageRouter`] together and
//! exposes the publish surface (see the `set_*`, `retain_*` and
//! `subscribe_*` methods).
//!
//! ```ignore
//! let mut client = CloudClient::new(
//!     Identity::new("my-account", "my-device-key"),
//!     wifi,
//!     MqttSession::<_, 512>::new(TcpTransport::new(stack, socket, Duration::from_secs(5))),
//!     ClientOptions::default(),
//! );
//!
//! let mut on_control = |slot: u8, state: &str| { /* drive a relay */ };
//! client.set_control_handler(&mut on_control);
//!
//! client.begin("ssid", "password").await;
//! client.wait_until_ready(&mut Delay).await;
//! client.subscribe_control(1).await?;
//!
//! loop {
//!     client.poll().await.ok();
//!     client.set_data(1, read_temperature()).await.ok();
//! }
//! ```

use embedded_hal_async::delay::DelayNs;

use crate::config::ClientOptions;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::error::ClientError;
use crate::identity::Identity;
use crate::router::{ControlHandler, DataHandler, MessageRouter};
use crate::transport::{BrokerSession, LinkStatus, NetworkLink};

/// Device-side client for the slot-based cloud broker.
///
/// `'h` is the lifetime of the registered inbound handlers.
pub struct CloudClient<'h, N, B>
where
    N: NetworkLink,
    B: BrokerSession,
{
    pub(crate) identity: Identity,
    pub(crate) connection: ConnectionManager<N, B>,
    router: MessageRouter<'h>,
}

impl<'h, N, B> CloudClient<'h, N, B>
where
    N: NetworkLink,
    B: BrokerSession,
{
    pub fn new(identity: Identity, network: N, session: B, options: ClientOptions) -> Self {
        Self {
            identity,
            connection: ConnectionManager::new(network, session, options),
            router: MessageRouter::new(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Changes the account id used as broker username.
    ///
    /// Takes effect on the next broker connect.
    pub fn set_account_id(&mut self, account_id: &str) {
        self.identity.set_account_id(account_id);
    }

    /// Changes the device key used in every topic.
    pub fn set_device_key(&mut self, device_key: &str) {
        self.identity.set_device_key(device_key);
    }

    /// Starts the network attach and makes one broker connect attempt.
    ///
    /// Returns whether the client is ready right away.
    pub async fn begin(&mut self, ssid: &str, password: &str) -> bool {
        self.connection.begin(&self.identity, ssid, password).await
    }

    /// Waits for the network and the broker, retrying the broker connect.
    ///
    /// See [`ConnectionManager::wait_until_ready`].
    pub async fn wait_until_ready<D: DelayNs>(&mut self, delay: &mut D) -> bool {
        self.connection.wait_until_ready(&self.identity, delay).await
    }

    pub fn ready(&self) -> bool {
        self.connection.ready()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn network_status(&self) -> LinkStatus {
        self.connection.network_status()
    }

    pub fn last_error(&self) -> Option<&B::Error> {
        self.connection.last_error()
    }

    /// Makes a single broker connect attempt.
    pub async fn connect_broker(&mut self) -> Result<(), ClientError<B::Error>> {
        self.connection.connect_broker(&self.identity).await
    }

    /// Services the broker session once.
    ///
    /// Call this periodically. Inbound messages are dispatched to the
    /// registered handlers before it returns. It never reconnects; use
    /// [`CloudClient::connect_broker`] for that.
    pub async fn poll(&mut self) -> Result<(), ClientError<B::Error>> {
        self.connection.service(&mut self.router).await
    }

    /// Closes the broker session and detaches the network.
    pub async fn disconnect(&mut self) {
        self.connection.disconnect().await;
    }

    /// Registers the data handler, replacing any previous one.
    pub fn set_data_handler(&mut self, handler: &'h mut dyn DataHandler) {
        self.router.set_data_handler(handler);
    }

    /// Registers the control handler, replacing any previous one.
    pub fn set_control_handler(&mut self, handler: &'h mut dyn ControlHandler) {
        self.router.set_control_handler(handler);
    }

    pub fn clear_data_handler(&mut self) {
        self.router.clear_data_handler();
    }

    pub fn clear_control_handler(&mut self) {
        self.router.clear_control_handler();
    }

    pub fn connection(&self) -> &ConnectionManager<N, B> {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut ConnectionManager<N, B> {
        &mut self.connection
    }
}
