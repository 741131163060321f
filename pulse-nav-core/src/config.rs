//! Configuration types
//!
//! ## Example
//!
//! ```yaml
//! autoDetectNavigation: true
//! platform: ios
//! globalAttributes:
//!   app.version: "4.2.0"
//! navigation:
//!   screenSessionTracking: true
//!   screenNavigationTracking: true
//!   screenInteractiveTracking: true
//! ```
//!
//! `navigation: true` is shorthand for the default tracking flags and
//! `navigation: false` turns every tracker off.

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;
use std::rc::Rc;
use tracing::{debug, warn};

use crate::navigation::{AppStateSource, NavigationIntegration};
use crate::telemetry::attributes::Platform;
use crate::telemetry::span::{Attributes, SpanBackend, Tracer};

/// Which trackers the navigation integration runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationIntegrationOptions {
    /// `screen_session` spans for each foreground period of a route
    #[serde(default = "default_true", alias = "screen_session_tracking")]
    pub screen_session_tracking: bool,

    /// `screen_load` spans from dispatch to settle
    #[serde(default = "default_true", alias = "screen_navigation_tracking")]
    pub screen_navigation_tracking: bool,

    /// `screen_interactive` spans from load end to `mark_content_ready`
    #[serde(default, alias = "screen_interactive_tracking")]
    pub screen_interactive_tracking: bool,
}

impl Default for NavigationIntegrationOptions {
    fn default() -> Self {
        Self {
            screen_session_tracking: true,
            screen_navigation_tracking: true,
            screen_interactive_tracking: false,
        }
    }
}

impl NavigationIntegrationOptions {
    /// Every tracker off
    pub fn none() -> Self {
        Self {
            screen_session_tracking: false,
            screen_navigation_tracking: false,
            screen_interactive_tracking: false,
        }
    }

    pub fn any_enabled(&self) -> bool {
        self.screen_session_tracking
            || self.screen_navigation_tracking
            || self.screen_interactive_tracking
    }
}

fn default_true() -> bool {
    true
}

/// `navigation:` accepts either a boolean or the full options object
#[derive(Debug, Clone)]
enum NavigationOptionsInput {
    Enabled(bool),
    Full(NavigationIntegrationOptions),
}

impl<'de> Deserialize<'de> for NavigationOptionsInput {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        use serde::de::{self, MapAccess, Visitor};

        struct NavigationOptionsInputVisitor;

        impl<'de> Visitor<'de> for NavigationOptionsInputVisitor {
            type Value = NavigationOptionsInput;

            fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
                formatter.write_str("a boolean or navigation options object")
            }

            fn visit_bool<E>(self, value: bool) -> std::result::Result<Self::Value, E>
            where
                E: de::Error,
            {
                Ok(NavigationOptionsInput::Enabled(value))
            }

            fn visit_map<M>(self, map: M) -> std::result::Result<Self::Value, M::Error>
            where
                M: MapAccess<'de>,
            {
                let options = NavigationIntegrationOptions::deserialize(
                    serde::de::value::MapAccessDeserializer::new(map),
                )?;
                Ok(NavigationOptionsInput::Full(options))
            }
        }

        deserializer.deserialize_any(NavigationOptionsInputVisitor)
    }
}

impl From<NavigationOptionsInput> for NavigationIntegrationOptions {
    fn from(input: NavigationOptionsInput) -> Self {
        match input {
            NavigationOptionsInput::Enabled(true) => NavigationIntegrationOptions::default(),
            NavigationOptionsInput::Enabled(false) => NavigationIntegrationOptions::none(),
            NavigationOptionsInput::Full(options) => options,
        }
    }
}

fn deserialize_navigation<'de, D>(
    deserializer: D,
) -> std::result::Result<NavigationIntegrationOptions, D::Error>
where
    D: Deserializer<'de>,
{
    NavigationOptionsInput::deserialize(deserializer).map(Into::into)
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PulseConfig {
    /// Instrument the navigation container at all
    #[serde(default = "default_true", alias = "auto_detect_navigation")]
    pub auto_detect_navigation: bool,

    /// Host platform; navigation tracking runs on Android and iOS only
    #[serde(default)]
    pub platform: Platform,

    /// Attributes added to every span
    #[serde(default, alias = "global_attributes")]
    pub global_attributes: Attributes,

    #[serde(default, deserialize_with = "deserialize_navigation")]
    pub navigation: NavigationIntegrationOptions,
}

impl Default for PulseConfig {
    fn default() -> Self {
        Self {
            auto_detect_navigation: true,
            platform: Platform::default(),
            global_attributes: Attributes::new(),
            navigation: NavigationIntegrationOptions::default(),
        }
    }
}

impl PulseConfig {
    /// Load configuration from a YAML (or JSON) file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Self::from_yaml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        debug!(path = %path.display(), platform = %config.platform, "Loaded configuration");
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> crate::error::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml_ng::from_str(content)?)
    }

    /// Whether this configuration produces a live navigation integration
    pub fn navigation_enabled(&self) -> bool {
        self.auto_detect_navigation && self.platform.is_supported() && self.navigation.any_enabled()
    }

    /// Tracer over `backend` carrying this configuration's platform and global attributes
    pub fn tracer(&self, backend: Rc<dyn SpanBackend>) -> Tracer {
        Tracer::new(backend, self.platform).with_global_attributes(self.global_attributes.clone())
    }
}

/// Build the navigation integration described by `config`.
///
/// Returns a disabled integration, after logging why, when navigation
/// instrumentation is switched off or the platform is unsupported.
pub fn create_navigation_integration_with_config(
    config: &PulseConfig,
    backend: Rc<dyn SpanBackend>,
    app_state: Rc<dyn AppStateSource>,
) -> NavigationIntegration {
    if !config.auto_detect_navigation {
        debug!("Navigation auto-detection disabled");
        return NavigationIntegration::disabled();
    }
    if !config.platform.is_supported() {
        warn!(
            platform = %config.platform,
            "Navigation instrumentation is only supported on android and ios"
        );
        return NavigationIntegration::disabled();
    }
    if !config.navigation.any_enabled() {
        debug!("All navigation trackers disabled");
        return NavigationIntegration::disabled();
    }

    NavigationIntegration::new(config.navigation.clone(), config.tracer(backend), app_state)
}
