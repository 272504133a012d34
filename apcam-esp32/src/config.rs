//! Checks on the compile-time settings from `cfg.toml`.

use anyhow::{bail, Result};

use crate::Config;

/// WPA2 needs at least 8 characters, an empty password means an open AP.
pub fn validate(config: &Config) -> Result<()> {
    let len = config.ap_password.len();
    if len > 0 && len < 8 {
        bail!("AP password must be empty or at least 8 characters, got {}", len);
    }
    if config.ap_password.len() > 64 {
        bail!("AP password is longer than 64 characters");
    }
    if config.ap_ssid.is_empty() || config.ap_ssid.len() > 32 {
        bail!("AP SSID must be 1..=32 characters");
    }
    if !(1..=13).contains(&config.ap_channel) {
        bail!("AP channel {} is outside 1..=13", config.ap_channel);
    }
    Ok(())
}

/// `Some(pin)` for a configured GPIO, `None` for -1.
pub fn pin(number: i32) -> Option<i32> {
    (number >= 0).then_some(number)
}
