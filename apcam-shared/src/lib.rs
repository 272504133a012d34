#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::string::String;
use serde::{Deserialize, Serialize};

/// Body of `GET /health`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    /// Health probe got a frame.
    pub ok: bool,
    /// Free internal heap in bytes.
    pub free_int: u64,
    /// Free PSRAM in bytes, 0 without PSRAM.
    pub free_psram: u64,
}

/// Body of `GET /status`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    pub state: String,
    pub ready: bool,
    /// Raw frame size value, as accepted by `/control?var=framesize`.
    pub framesize: u32,
    /// e.g. "VGA(640x480)"
    pub framesize_label: String,
    pub quality: u8,
    pub xclk_hz: u32,
    pub fb_count: u8,
    /// A client is currently attached to `/stream`.
    pub streaming: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Serializes a response body.
#[cfg(feature = "std")]
pub fn to_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_field_names() {
        let health = HealthResponse {
            ok: true,
            free_int: 123_456,
            free_psram: 0,
        };
        assert_eq!(
            to_json(&health).unwrap(),
            r#"{"ok":true,"free_int":123456,"free_psram":0}"#
        );
    }

    #[test]
    fn test_status_parses_back() {
        let status = StatusResponse {
            state: "ready".into(),
            ready: true,
            framesize: 8,
            framesize_label: "VGA(640x480)".into(),
            quality: 12,
            xclk_hz: 20_000_000,
            fb_count: 2,
            streaming: false,
        };
        let json = to_json(&status).unwrap();
        let parsed: StatusResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, status);
    }

    #[test]
    fn test_error_body() {
        assert_eq!(
            to_json(&ErrorResponse::new("Not found")).unwrap(),
            r#"{"error":"Not found"}"#
        );
    }
}
