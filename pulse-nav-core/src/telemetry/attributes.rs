//! Stable attribute contract for screen spans.
//!
//! These keys and values are consumed by the backend's dashboards; renaming
//! any of them is a breaking change.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Attribute keys written by the trackers
pub mod keys {
    pub const PULSE_TYPE: &str = "pulse.type";
    pub const SCREEN_NAME: &str = "screen.name";
    pub const LAST_SCREEN_NAME: &str = "last.screen.name";
    pub const ROUTE_KEY: &str = "routeKey";
    pub const ROUTE_HAS_BEEN_SEEN: &str = "routeHasBeenSeen";
    pub const PHASE: &str = "phase";
    pub const PLATFORM: &str = "platform";
}

/// Span names
pub mod span_names {
    pub const SCREEN_LOAD: &str = "Navigated";
    pub const SCREEN_SESSION: &str = "ScreenSession";
    pub const SCREEN_INTERACTIVE: &str = "ScreenInteractive";
}

/// `phase` value written on screen load spans
pub const PHASE_START: &str = "start";

/// Value of the `pulse.type` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PulseType {
    ScreenSession,
    ScreenLoad,
    ScreenInteractive,
}

impl PulseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PulseType::ScreenSession => "screen_session",
            PulseType::ScreenLoad => "screen_load",
            PulseType::ScreenInteractive => "screen_interactive",
        }
    }

    /// Span name used for spans of this type
    pub fn span_name(&self) -> &'static str {
        match self {
            PulseType::ScreenSession => span_names::SCREEN_SESSION,
            PulseType::ScreenLoad => span_names::SCREEN_LOAD,
            PulseType::ScreenInteractive => span_names::SCREEN_INTERACTIVE,
        }
    }
}

impl fmt::Display for PulseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Host platform, written as the `platform` attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    #[default]
    Android,
    Ios,
    Web,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Android => "android",
            Platform::Ios => "ios",
            Platform::Web => "web",
        }
    }

    /// Whether navigation instrumentation runs on this platform
    pub fn is_supported(&self) -> bool {
        matches!(self, Platform::Android | Platform::Ios)
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "android" => Ok(Platform::Android),
            "ios" => Ok(Platform::Ios),
            "web" => Ok(Platform::Web),
            _ => Err(format!(
                "Unknown platform: '{s}'. Valid options: android, ios, web"
            )),
        }
    }
}
