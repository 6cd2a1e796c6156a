//! Payload text for the data and control families.
//!
//! Data values always go out with four fractional digits. Numeric control
//! values use two, matching what older firmware produced for the same slot.
//! Inbound numbers are parsed leniently: the longest numeric prefix wins and
//! garbage reads as `0.0`.

use core::fmt::Write;

use heapless::String;

/// Payload of a control slot that is switched on.
pub const CONTROL_ON: &str = "on";
/// Payload of a control slot that is switched off.
pub const CONTROL_OFF: &str = "off";

/// Capacity of a rendered number.
pub const NUMBER_CAPACITY: usize = 48;

/// Owned, fixed-capacity numeric payload.
pub type NumberBuf = String<NUMBER_CAPACITY>;

const DATA_FRACTION_DIGITS: usize = 4;
const CONTROL_FRACTION_DIGITS: usize = 2;

/// A rendered number that does not fit [`NUMBER_CAPACITY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PayloadTooLarge;

/// The state written to a control slot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlValue<'a> {
    /// Sent verbatim.
    Text(&'a str),
    /// Rendered with two fractional digits.
    Number(f64),
}

impl ControlValue<'static> {
    pub const ON: Self = ControlValue::Text(CONTROL_ON);
    pub const OFF: Self = ControlValue::Text(CONTROL_OFF);
}

impl<'a> From<&'a str> for ControlValue<'a> {
    fn from(text: &'a str) -> Self {
        ControlValue::Text(text)
    }
}

impl From<f64> for ControlValue<'_> {
    fn from(value: f64) -> Self {
        ControlValue::Number(value)
    }
}

impl From<bool> for ControlValue<'_> {
    fn from(on: bool) -> Self {
        ControlValue::Text(if on { CONTROL_ON } else { CONTROL_OFF })
    }
}

/// Renders a data reading.
pub fn format_data(value: f64) -> Result<NumberBuf, PayloadTooLarge> {
    format_fixed(value, DATA_FRACTION_DIGITS)
}

/// Renders a numeric control state.
pub fn format_control(value: f64) -> Result<NumberBuf, PayloadTooLarge> {
    format_fixed(value, CONTROL_FRACTION_DIGITS)
}

fn format_fixed(value: f64, digits: usize) -> Result<NumberBuf, PayloadTooLarge> {
    let mut buf = NumberBuf::new();
    write!(buf, "{:.*}", digits, value).map_err(|_| PayloadTooLarge)?;
    Ok(buf)
}

/// Parses the longest decimal number at the start of `payload`.
///
/// Accepts leading ASCII whitespace, an optional sign, digits with an optional
/// fraction and an optional exponent, as well as `inf`, `infinity` and `nan`
/// in any case. Returns `0.0` when no digits are found.
pub fn parse_number(payload: &[u8]) -> f64 {
    let start = payload
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(payload.len());
    let text = &payload[start..];

    let mut end = 0;
    if matches!(text.first(), Some(b'+' | b'-')) {
        end += 1;
    }

    if let Some(special) = special_value(&text[end..]) {
        return if text.first() == Some(&b'-') {
            -special
        } else {
            special
        };
    }

    let int_digits = count_digits(&text[end..]);
    end += int_digits;

    let mut frac_digits = 0;
    if text.get(end) == Some(&b'.') {
        frac_digits = count_digits(&text[end + 1..]);
        if int_digits + frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }

    if int_digits + frac_digits == 0 {
        return 0.0;
    }

    // An exponent only counts when at least one digit follows it.
    if matches!(text.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(text.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits = count_digits(&text[exp_end.min(text.len())..]);
        if exp_digits > 0 {
            end = exp_end + exp_digits;
        }
    }

    core::str::from_utf8(&text[..end])
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(0.0)
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

fn special_value(bytes: &[u8]) -> Option<f64> {
    let starts_with = |word: &[u8]| {
        bytes.len() >= word.len() && bytes[..word.len()].eq_ignore_ascii_case(word)
    };

    if starts_with(&b"inf"[..]) {
        Some(f64::INFINITY)
    } else if starts_with(&b"nan"[..]) {
        Some(f64::NAN)
    } else {
        None
    }
}
