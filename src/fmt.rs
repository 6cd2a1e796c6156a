//! Logging shims.
//!
//! The crate never owns a logger. Each macro forwards to whichever backend
//! feature is enabled (`log`, `defmt` or `esp32-log`) and compiles to nothing
//! otherwise. Arguments are still referenced in the silent case so that
//! disabling logging does not produce unused-variable warnings.
//!
//! Only pass values that implement both `core::fmt::Display` and
//! `defmt::Format` so every backend accepts the same call sites.
#![allow(unused_macros)]

macro_rules! log_impl {
    ($level:ident, $s:literal $(, $x:expr)* $(,)?) => {{
        #[cfg(feature = "log")]
        ::log::$level!($s $(, $x)*);
        #[cfg(all(feature = "defmt", not(feature = "log")))]
        ::defmt::$level!($s $(, $x)*);
        #[cfg(all(feature = "esp32-log", not(feature = "log"), not(feature = "defmt")))]
        ::esp_println::println!($s $(, $x)*);
        #[cfg(not(any(feature = "log", feature = "defmt", feature = "esp32-log")))]
        let _ = ($( & $x ),*);
    }};
}

macro_rules! trace {
    ($($arg:tt)*) => { $crate::fmt::log_impl!(trace, $($arg)*) };
}

macro_rules! debug {
    ($($arg:tt)*) => { $crate::fmt::log_impl!(debug, $($arg)*) };
}

macro_rules! info {
    ($($arg:tt)*) => { $crate::fmt::log_impl!(info, $($arg)*) };
}

// `warn` collides with the built-in lint attribute, so it is exported under
// an alias.
macro_rules! warn_ {
    ($($arg:tt)*) => { $crate::fmt::log_impl!(warn, $($arg)*) };
}

macro_rules! error {
    ($($arg:tt)*) => { $crate::fmt::log_impl!(error, $($arg)*) };
}

pub(crate) use warn_ as warn;
pub(crate) use {debug, error, info, log_impl, trace};

#[cfg(test)]
mod tests {
    use crate::fmt::{debug, error, info, trace, warn};

    #[test]
    fn every_level_accepts_literal_and_arguments() {
        let slot = 3u8;
        let host = "test.sensesiot.net";

        trace!("plain message");
        debug!("slot {}", slot);
        info!("connecting to {}:{}", host, 4057u16);
        warn!("slot {} dropped", slot);
        error!("giving up on {}", host);
    }
}
