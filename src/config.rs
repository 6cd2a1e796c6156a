//! Build-time and construction-time settings.
//!
//! The broker endpoint is picked once, at build time, through the
//! `test-endpoint` feature and then handed to the client as a plain value.
//! Nothing in the connection logic branches on build flags.

use embassy_time::Duration;

/// Host and port of the cloud broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BrokerEndpoint {
    pub host: &'static str,
    pub port: u16,
}

impl BrokerEndpoint {
    /// The production broker.
    pub const PRODUCTION: Self = Self {
        host: "www.sensesiot.net",
        port: 3057,
    };

    /// The staging broker used while developing firmware.
    pub const TEST: Self = Self {
        host: "test.sensesiot.net",
        port: 4057,
    };

    /// The endpoint selected by this build's features.
    pub const fn build_default() -> Self {
        if cfg!(feature = "test-endpoint") {
            Self::TEST
        } else {
            Self::PRODUCTION
        }
    }
}

impl Default for BrokerEndpoint {
    fn default() -> Self {
        Self::build_default()
    }
}

/// Which identity string is presented to the broker as the username.
///
/// Firmware generations disagree on this, so the choice is explicit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum UsernamePolicy {
    /// Use the account identifier.
    #[default]
    AccountId,
    /// Use the device key.
    DeviceKey,
}

/// Options fixed when the client is constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    pub endpoint: BrokerEndpoint,
    pub username_policy: UsernamePolicy,
    /// Pause between attempts inside `wait_until_ready`. Zero yields to the
    /// executor instead of sleeping.
    pub retry_interval: Duration,
    /// Upper bound on `wait_until_ready` iterations. `None` waits forever.
    pub max_ready_attempts: Option<u32>,
}

impl ClientOptions {
    pub const fn new(endpoint: BrokerEndpoint) -> Self {
        Self {
            endpoint,
            username_policy: UsernamePolicy::AccountId,
            retry_interval: Duration::from_millis(10),
            max_ready_attempts: None,
        }
    }

    pub const fn with_username_policy(mut self, policy: UsernamePolicy) -> Self {
        self.username_policy = policy;
        self
    }

    pub const fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub const fn with_max_ready_attempts(mut self, attempts: u32) -> Self {
        self.max_ready_attempts = Some(attempts);
        self
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::new(BrokerEndpoint::build_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_default_follows_the_endpoint_feature() {
        let expected = if cfg!(feature = "test-endpoint") {
            BrokerEndpoint::TEST
        } else {
            BrokerEndpoint::PRODUCTION
        };
        assert_eq!(BrokerEndpoint::build_default(), expected);
        assert_eq!(ClientOptions::default().endpoint, expected);
    }

    #[test]
    fn builders_override_defaults() {
        let options = ClientOptions::new(BrokerEndpoint::TEST)
            .with_username_policy(UsernamePolicy::DeviceKey)
            .with_retry_interval(Duration::from_millis(0))
            .with_max_ready_attempts(3);

        assert_eq!(options.endpoint.port, 4057);
        assert_eq!(options.username_policy, UsernamePolicy::DeviceKey);
        assert_eq!(options.retry_interval.as_millis(), 0);
        assert_eq!(options.max_ready_attempts, Some(3));
    }
}
