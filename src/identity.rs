//! Device credentials.

use heapless::String;

use crate::fmt::warn;
use crate::topic::SEPARATOR;

/// Capacity of the account identifier, in bytes.
pub const ACCOUNT_ID_CAPACITY: usize = 32;
/// Capacity of the device key, in bytes.
pub const DEVICE_KEY_CAPACITY: usize = 64;

/// The account identifier and device key a board authenticates with.
///
/// The device key is also the middle segment of every topic the board owns.
/// Values are stored verbatim. Strings longer than the capacity are cut at
/// the last char boundary that fits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Identity {
    account_id: String<ACCOUNT_ID_CAPACITY>,
    device_key: String<DEVICE_KEY_CAPACITY>,
}

impl Identity {
    pub fn new(account_id: &str, device_key: &str) -> Self {
        let mut identity = Self::default();
        identity.set_account_id(account_id);
        identity.set_device_key(device_key);
        identity
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    /// Replaces the account identifier.
    pub fn set_account_id(&mut self, account_id: &str) {
        replace_truncated(&mut self.account_id, account_id);
    }

    pub fn device_key(&self) -> &str {
        &self.device_key
    }

    /// Replaces the device key.
    pub fn set_device_key(&mut self, device_key: &str) {
        replace_truncated(&mut self.device_key, device_key);
    }

    /// `false` if either string contains the topic separator.
    ///
    /// Such identities still work for publishing but produce topics that
    /// cannot be parsed back reliably.
    pub fn is_topic_safe(&self) -> bool {
        !self.account_id.contains(SEPARATOR) && !self.device_key.contains(SEPARATOR)
    }
}

fn replace_truncated<const N: usize>(target: &mut String<N>, value: &str) {
    let mut end = value.len().min(N);
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    if end < value.len() {
        warn!("identity value truncated to {} bytes", end);
    }

    target.clear();
    // Cannot fail: `end` never exceeds the capacity.
    let _ = target.push_str(&value[..end]);
}
