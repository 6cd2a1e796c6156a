//! Publish and subscription surface of [`CloudClient`].
//!
//! None of these check [`CloudClient::ready`] first. A call made while the
//! broker is away fails with whatever the session reports.

use crate::client::CloudClient;
use crate::error::ClientError;
use crate::payload::{self, ControlValue};
use crate::topic::{Family, Topic, TopicBuf};
use crate::transport::{BrokerSession, NetworkLink};

impl<N, B> CloudClient<'_, N, B>
where
    N: NetworkLink,
    B: BrokerSession,
{
    fn topic(&self, family: Family, slot: u8) -> Result<TopicBuf, ClientError<B::Error>> {
        Topic::new(family, self.identity.device_key(), slot)
            .encode()
            .map_err(|_| ClientError::TopicTooLong)
    }

    fn retained_topic(&self, family: Family, slot: u8) -> Result<TopicBuf, ClientError<B::Error>> {
        Topic::new(family, self.identity.device_key(), slot)
            .retained()
            .encode()
            .map_err(|_| ClientError::TopicTooLong)
    }

    /// Publishes `value` to data slot `slot` with four fractional digits.
    pub async fn set_data(&mut self, slot: u8, value: f64) -> Result<(), ClientError<B::Error>> {
        let topic = self.topic(Family::Data, slot)?;
        let text = payload::format_data(value).map_err(|_| ClientError::PayloadTooLarge)?;
        self.connection.publish(&topic, text.as_bytes()).await
    }

    /// Publishes a state to control slot `slot`.
    ///
    /// Text goes out verbatim. Numbers are rendered with two fractional
    /// digits, and `bool` becomes [`payload::CONTROL_ON`] or
    /// [`payload::CONTROL_OFF`].
    pub async fn set_control<'v>(
        &mut self,
        slot: u8,
        value: impl Into<ControlValue<'v>>,
    ) -> Result<(), ClientError<B::Error>> {
        let topic = self.topic(Family::Control, slot)?;
        match value.into() {
            ControlValue::Text(text) => self.connection.publish(&topic, text.as_bytes()).await,
            ControlValue::Number(number) => {
                let text =
                    payload::format_control(number).map_err(|_| ClientError::PayloadTooLarge)?;
                self.connection.publish(&topic, text.as_bytes()).await
            }
        }
    }

    /// Asks the broker to keep the last value of data slot `slot` for new subscribers.
    pub async fn retain_data(&mut self, slot: u8) -> Result<(), ClientError<B::Error>> {
        let topic = self.retained_topic(Family::Data, slot)?;
        self.connection.publish(&topic, &[]).await
    }

    /// Asks the broker to keep the last state of control slot `slot` for new subscribers.
    pub async fn retain_control(&mut self, slot: u8) -> Result<(), ClientError<B::Error>> {
        let topic = self.retained_topic(Family::Control, slot)?;
        self.connection.publish(&topic, &[]).await
    }

    pub async fn subscribe_data(&mut self, slot: u8) -> Result<(), ClientError<B::Error>> {
        let topic = self.topic(Family::Data, slot)?;
        self.connection.set_subscription(&topic, true).await
    }

    pub async fn subscribe_control(&mut self, slot: u8) -> Result<(), ClientError<B::Error>> {
        let topic = self.topic(Family::Control, slot)?;
        self.connection.set_subscription(&topic, true).await
    }

    pub async fn unsubscribe_data(&mut self, slot: u8) -> Result<(), ClientError<B::Error>> {
        let topic = self.topic(Family::Data, slot)?;
        self.connection.set_subscription(&topic, false).await
    }

    pub async fn unsubscribe_control(&mut self, slot: u8) -> Result<(), ClientError<B::Error>> {
        let topic = self.topic(Family::Control, slot)?;
        self.connection.set_subscription(&topic, false).await
    }
}

#[cfg(test)]
mod tests {
    use embassy_futures::block_on;

    use crate::client::CloudClient;
    use crate::config::{BrokerEndpoint, ClientOptions};
    use crate::connection::ConnectionState;
    use crate::error::ClientError;
    use crate::identity::Identity;
    use crate::mock::{MockBroker, MockError, MockNetwork};
    use crate::payload::ControlValue;

    type TestClient = CloudClient<'static, MockNetwork, MockBroker>;

    fn ready_client() -> TestClient {
        let mut client = client(MockNetwork::up(), MockBroker::accepting());
        assert!(block_on(client.begin("ssid", "pw")));
        client
    }

    fn client(network: MockNetwork, broker: MockBroker) -> TestClient {
        CloudClient::new(
            Identity::new("acc", "key"),
            network,
            broker,
            ClientOptions::new(BrokerEndpoint::TEST),
        )
    }

    fn published(client: &TestClient) -> Vec<(String, Vec<u8>)> {
        client.connection().session().published.clone()
    }

    #[test]
    fn set_data_publishes_every_call() {
        let mut client = ready_client();

        block_on(client.set_data(3, 1.0)).unwrap();
        block_on(client.set_data(3, 1.0)).unwrap();

        let expected = ("data/key/3".to_string(), b"1.0000".to_vec());
        assert_eq!(published(&client), vec![expected.clone(), expected]);
    }

    #[test]
    fn set_data_rounds_to_four_digits() {
        let mut client = ready_client();
        block_on(client.set_data(0, -2.123456)).unwrap();
        assert_eq!(published(&client)[0].1, b"-2.1235");
    }

    #[test]
    fn set_control_accepts_text_numbers_and_bools() {
        let mut client = ready_client();

        block_on(client.set_control(1, "dim")).unwrap();
        block_on(client.set_control(1, 0.5)).unwrap();
        block_on(client.set_control(1, true)).unwrap();
        block_on(client.set_control(1, ControlValue::OFF)).unwrap();

        let payloads: Vec<Vec<u8>> = published(&client).into_iter().map(|(_, p)| p).collect();
        assert_eq!(
            payloads,
            vec![b"dim".to_vec(), b"0.50".to_vec(), b"on".to_vec(), b"off".to_vec()]
        );
        assert!(published(&client).iter().all(|(t, _)| t == "control/key/1"));
    }

    #[test]
    fn retain_publishes_empty_body_to_retain_topic() {
        let mut client = ready_client();

        block_on(client.retain_control(2)).unwrap();
        block_on(client.retain_data(9)).unwrap();

        assert_eq!(
            published(&client),
            vec![
                ("retain/control/key/2".to_string(), Vec::new()),
                ("retain/data/key/9".to_string(), Vec::new()),
            ]
        );
    }

    #[test]
    fn subscriptions_pass_through() {
        let mut client = ready_client();

        block_on(client.subscribe_data(1)).unwrap();
        block_on(client.subscribe_control(2)).unwrap();
        block_on(client.unsubscribe_data(1)).unwrap();
        block_on(client.unsubscribe_control(2)).unwrap();

        let session = client.connection().session();
        assert_eq!(session.subscribe_calls, vec!["data/key/1", "control/key/2"]);
        assert_eq!(session.unsubscribe_calls, vec!["data/key/1", "control/key/2"]);
    }

    #[test]
    fn publish_before_ready_reports_session_failure() {
        let mut client = client(MockNetwork::down(), MockBroker::accepting());
        block_on(client.begin("ssid", "pw"));

        assert_eq!(
            block_on(client.set_data(1, 1.0)),
            Err(ClientError::Transport(MockError::NotConnected))
        );
        assert_eq!(
            block_on(client.subscribe_control(1)),
            Err(ClientError::Transport(MockError::NotConnected))
        );
        assert_eq!(client.last_error(), Some(&MockError::NotConnected));
    }

    #[test]
    fn longest_device_key_fits_every_topic() {
        let mut client = ready_client();
        client.set_device_key(&"k".repeat(64));

        block_on(client.retain_control(255)).unwrap();
        block_on(client.set_data(255, 0.0)).unwrap();

        let topics: Vec<String> = published(&client).into_iter().map(|(t, _)| t).collect();
        assert_eq!(topics[0], format!("retain/control/{}/255", "k".repeat(64)));
        assert_eq!(topics[1], format!("data/{}/255", "k".repeat(64)));
    }

    #[test]
    fn lifecycle_reject_then_retry_then_disconnect() {
        let mut client = client(MockNetwork::up(), MockBroker::rejecting(1));

        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert!(!block_on(client.begin("ssid", "pw")));
        assert_eq!(client.state(), ConnectionState::NetworkReady);

        block_on(client.poll()).unwrap();
        block_on(client.connect_broker()).unwrap();
        assert_eq!(client.state(), ConnectionState::Ready);

        block_on(client.disconnect());
        assert_eq!(client.state(), ConnectionState::Disconnected);
        block_on(client.disconnect());
        assert_eq!(client.state(), ConnectionState::Disconnected);
        assert_eq!(client.connection().session().disconnect_calls, 1);
    }
}
