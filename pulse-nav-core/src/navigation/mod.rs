//! Navigation-driven screen tracking.
//!
//! [`NavigationIntegration`] subscribes to a [`NavigationContainer`] and the
//! OS [`AppStateSource`] and drives three independent trackers:
//!
//! - [`ScreenLoadTracker`]: dispatch until the destination route settles
//! - [`ScreenSessionTracker`]: how long a route is visible in the foreground
//! - [`ScreenInteractiveTracker`]: load completion until [`mark_content_ready`]

pub mod history;
pub mod integration;
pub mod memory;
pub mod registry;
pub mod screen_interactive;
pub mod screen_load;
pub mod screen_session;
pub mod types;

pub use history::{RouteHistory, ROUTE_HISTORY_CAPACITY};
pub use integration::{IntegrationSnapshot, NavigationIntegration, Registration, RegistrationKind};
pub use memory::{MemoryAppState, MemoryNavigationContainer};
pub use registry::{current_generation, mark_content_ready, Generation};
pub use screen_interactive::{ContentReadyOutcome, ScreenInteractiveTracker, TeardownReason};
pub use screen_load::ScreenLoadTracker;
pub use screen_session::ScreenSessionTracker;
pub use types::{
    AppStateSource, AppStateStatus, ContainerRef, ContainerSlot, NavigationContainer,
    NavigationEvent, NavigationRoute, Subscription,
};
