//! Logger initialization
//!
//! The bridge logs through the `log` facade. On Android records go to logcat
//! under the `HQM` tag; elsewhere `env_logger` writes them to stderr.

#[cfg(target_os = "android")]
use std::sync::atomic::{AtomicBool, Ordering};

use log::LevelFilter;

use crate::error::BridgeError;

/// Logcat tag used on Android
pub const LOG_TAG: &str = "HQM";

/// Map a C log level (0 = off .. 5 = trace) to a filter.
pub fn level_from_raw(level: i32) -> LevelFilter {
    match level {
        i32::MIN..=0 => LevelFilter::Off,
        1 => LevelFilter::Error,
        2 => LevelFilter::Warn,
        3 => LevelFilter::Info,
        4 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Install the platform logger.
///
/// Fails on every call after the first, leaving the max level untouched.
#[cfg(target_os = "android")]
pub fn init(level: LevelFilter) -> Result<(), BridgeError> {
    // `init_once` ignores repeated calls, so track installation here.
    static INSTALLED: AtomicBool = AtomicBool::new(false);
    if INSTALLED.swap(true, Ordering::SeqCst) {
        return Err(BridgeError::InvalidConfig("logger already initialized".to_string()));
    }

    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(level)
            .with_tag(LOG_TAG),
    );
    log::set_max_level(level);
    Ok(())
}

/// Install the platform logger.
///
/// Fails if another logger was already installed.
#[cfg(not(target_os = "android"))]
pub fn init(level: LevelFilter) -> Result<(), BridgeError> {
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp_millis()
        .try_init()
        .map_err(|e| BridgeError::InvalidConfig(format!("logger already initialized: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_raw() {
        assert_eq!(level_from_raw(-3), LevelFilter::Off);
        assert_eq!(level_from_raw(0), LevelFilter::Off);
        assert_eq!(level_from_raw(2), LevelFilter::Warn);
        assert_eq!(level_from_raw(4), LevelFilter::Debug);
        assert_eq!(level_from_raw(99), LevelFilter::Trace);
    }

    #[test]
    fn test_repeated_init_fails() {
        let _ = init(LevelFilter::Warn);
        let level = log::max_level();

        let err = init(LevelFilter::Trace).unwrap_err();
        assert!(err.to_string().contains("logger already initialized"));
        assert_eq!(log::max_level(), level);
    }
}
