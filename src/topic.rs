//! # Topic Codec
//!
//! Every topic the board owns has the shape
//!
//! ```text
//! data/<device_key>/<slot>
//! control/<device_key>/<slot>
//! retain/data/<device_key>/<slot>
//! retain/control/<device_key>/<slot>
//! ```
//!
//! The slot is always the last segment, so it can be read back by looking
//! after the final separator regardless of how many segments precede it.

use core::fmt::{self, Write};

use heapless::String;

use crate::identity::DEVICE_KEY_CAPACITY;

/// Separator between topic segments.
pub const SEPARATOR: char = '/';

const RETAIN_PREFIX: &str = "retain/";

/// Longest topic the codec produces for a device key that fits [`crate::Identity`]:
/// `retain/control/` + key + `/` + three slot digits, rounded up.
pub const TOPIC_CAPACITY: usize = 128;

const _: () =
    assert!(RETAIN_PREFIX.len() + "control/".len() + DEVICE_KEY_CAPACITY + 4 <= TOPIC_CAPACITY);

/// Owned, fixed-capacity topic string.
pub type TopicBuf = String<TOPIC_CAPACITY>;

/// The topic family, i.e. the message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Family {
    Data,
    Control,
}

impl Family {
    /// The literal first segment for this family.
    pub const fn as_str(self) -> &'static str {
        match self {
            Family::Data => "data",
            Family::Control => "control",
        }
    }

    /// The prefix an inbound topic must start with, separator included.
    const fn prefix(self) -> &'static str {
        match self {
            Family::Data => "data/",
            Family::Control => "control/",
        }
    }
}

/// A topic that does not fit [`TOPIC_CAPACITY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TopicTooLong;

/// A logical topic, ready to be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topic<'a> {
    pub family: Family,
    pub device_key: &'a str,
    pub slot: u8,
    pub retained: bool,
}

impl<'a> Topic<'a> {
    pub const fn new(family: Family, device_key: &'a str, slot: u8) -> Self {
        Self {
            family,
            device_key,
            slot,
            retained: false,
        }
    }

    pub const fn data(device_key: &'a str, slot: u8) -> Self {
        Self::new(Family::Data, device_key, slot)
    }

    pub const fn control(device_key: &'a str, slot: u8) -> Self {
        Self::new(Family::Control, device_key, slot)
    }

    /// The `retain/`-prefixed variant of this topic.
    pub const fn retained(mut self) -> Self {
        self.retained = true;
        self
    }

    /// Renders the topic into an owned buffer.
    pub fn encode(&self) -> Result<TopicBuf, TopicTooLong> {
        let mut buf = TopicBuf::new();
        write!(buf, "{}", self).map_err(|_| TopicTooLong)?;
        Ok(buf)
    }
}

impl fmt::Display for Topic<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.retained {
            f.write_str(RETAIN_PREFIX)?;
        }
        write!(
            f,
            "{}{}{}{}{}",
            self.family.as_str(),
            SEPARATOR,
            self.device_key,
            SEPARATOR,
            self.slot
        )
    }
}

/// What the router needs to know about an inbound topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Decoded {
    pub family: Family,
    pub slot: u8,
}

/// Classifies an inbound topic.
///
/// Only exact, case-sensitive `data/` and `control/` prefixes match; `data` is
/// checked first. Retained topics and anything else yield `None`.
pub fn decode(topic: &str) -> Option<Decoded> {
    let family = [Family::Data, Family::Control]
        .into_iter()
        .find(|family| topic.starts_with(family.prefix()))?;

    Some(Decoded {
        family,
        slot: slot_of(topic),
    })
}

/// Reads the slot from the segment after the last separator.
///
/// Leading ASCII whitespace and a `+` sign are skipped, then decimal digits
/// are read until the first non-digit. A topic without a separator, a segment
/// without digits or a number above 255 gives 0.
pub fn slot_of(topic: &str) -> u8 {
    let Some((_, tail)) = topic.rsplit_once(SEPARATOR) else {
        return 0;
    };

    let tail = tail.trim_start_matches(|c: char| c.is_ascii_whitespace());
    let tail = tail.strip_prefix('+').unwrap_or(tail);
    let digits = tail
        .find(|c: char| !c.is_ascii_digit())
        .map_or(tail, |end| &tail[..end]);

    digits.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_plain_and_retained_topics() {
        assert_eq!(Topic::data("abc", 3).encode().unwrap().as_str(), "data/abc/3");
        assert_eq!(Topic::control("abc", 0).encode().unwrap().as_str(), "control/abc/0");
        assert_eq!(
            Topic::control("abc", 2).retained().encode().unwrap().as_str(),
            "retain/control/abc/2"
        );
        assert_eq!(
            Topic::data("abc", 255).retained().encode().unwrap().as_str(),
            "retain/data/abc/255"
        );
    }

    #[test]
    fn empty_device_key_gives_degenerate_topic() {
        assert_eq!(Topic::data("", 7).encode().unwrap().as_str(), "data//7");
    }

    #[test]
    fn oversized_device_key_is_rejected() {
        let key = "k".repeat(TOPIC_CAPACITY);
        assert_eq!(Topic::data(&key, 1).encode(), Err(TopicTooLong));
    }

    #[test]
    fn every_slot_survives_encode_then_decode() {
        for family in [Family::Data, Family::Control] {
            for slot in 0..=u8::MAX {
                let topic = Topic::new(family, "device-key", slot).encode().unwrap();
                assert_eq!(decode(&topic), Some(Decoded { family, slot }));
            }
        }
    }

    #[test]
    fn slot_comes_from_last_segment() {
        assert_eq!(slot_of("data/abc/42"), 42);
        assert_eq!(slot_of("control/abc/7"), 7);
        assert_eq!(slot_of("retain/data/abc/255"), 255);
    }

    #[test]
    fn unparsable_slot_falls_back_to_zero() {
        assert_eq!(slot_of("no-slashes-here"), 0);
        assert_eq!(slot_of("data/abc/"), 0);
        assert_eq!(slot_of("data/abc/x1"), 0);
        assert_eq!(slot_of("data/abc/256"), 0);
    }

    #[test]
    fn slot_parse_stops_at_first_non_digit() {
        assert_eq!(slot_of("data/abc/12xyz"), 12);
        assert_eq!(slot_of("data/abc/ 9"), 9);
        assert_eq!(slot_of("data/abc/+5"), 5);
    }

    #[test]
    fn prefix_must_include_separator() {
        assert_eq!(decode("data/abc/5").map(|d| d.family), Some(Family::Data));
        assert_eq!(
            decode("control/abc/5").map(|d| d.family),
            Some(Family::Control)
        );
        assert_eq!(decode("dataXYZ/abc/5"), None);
        assert_eq!(decode("Data/abc/5"), None);
        assert_eq!(decode("control"), None);
    }

    #[test]
    fn retained_topics_are_not_classified() {
        assert_eq!(decode("retain/data/abc/1"), None);
    }
}
