//! Screen span-lifecycle tracking for navigation containers.
//!
//! Three cooperating trackers turn navigation and app-state events into
//! `screen_load`, `screen_session` and `screen_interactive` spans. See
//! [`navigation::NavigationIntegration`] for the entry point.

pub mod config;
pub mod error;
pub mod navigation;
pub mod telemetry;

pub use config::{
    create_navigation_integration_with_config, NavigationIntegrationOptions, PulseConfig,
};
pub use error::{PulseError, Result};
pub use navigation::{mark_content_ready, NavigationIntegration, Registration};
