//! Navigation-side collaborators: routes, containers and OS app state.
//!
//! The orchestrator only needs two things from a navigation library: a way to
//! subscribe to its events and a way to ask for the focused route. Hosts adapt
//! their library to [`NavigationContainer`]; [`super::memory`] has in-memory
//! implementations.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// One entry of the navigation tree.
///
/// `key` is unique per entry; `name` repeats when the same screen is pushed twice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigationRoute {
    pub name: String,
    pub key: String,
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl NavigationRoute {
    pub fn new(name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            params: serde_json::Map::new(),
        }
    }

    pub fn with_params(mut self, params: serde_json::Map<String, serde_json::Value>) -> Self {
        self.params = params;
        self
    }
}

impl fmt::Display for NavigationRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.key)
    }
}

/// Events the orchestrator subscribes to on a container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NavigationEvent {
    /// Emitted before a navigation action is applied (`__unsafe_action__`)
    Dispatch,
    /// Emitted after the navigation tree settles (`state`)
    State,
}

impl NavigationEvent {
    /// Event name as used by React Navigation
    pub fn as_str(&self) -> &'static str {
        match self {
            NavigationEvent::Dispatch => "__unsafe_action__",
            NavigationEvent::State => "state",
        }
    }
}

/// Handle returned by listener registration. `remove` unsubscribes.
pub struct Subscription {
    remove: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(remove: impl FnOnce() + 'static) -> Self {
        Self {
            remove: Some(Box::new(remove)),
        }
    }

    /// A subscription with nothing to remove
    pub fn noop() -> Self {
        Self { remove: None }
    }

    pub fn remove(mut self) {
        if let Some(remove) = self.remove.take() {
            remove();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.remove.is_some())
            .finish()
    }
}

/// A live navigation container.
pub trait NavigationContainer {
    fn add_listener(&self, event: NavigationEvent, callback: Box<dyn FnMut()>) -> Subscription;

    fn current_route(&self) -> Option<NavigationRoute>;
}

/// OS-reported application state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppStateStatus {
    Active,
    Background,
    Inactive,
}

impl AppStateStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppStateStatus::Active => "active",
            AppStateStatus::Background => "background",
            AppStateStatus::Inactive => "inactive",
        }
    }

    /// Background and inactive both mean the screen is no longer visible
    pub fn is_backgrounded(&self) -> bool {
        matches!(self, AppStateStatus::Background | AppStateStatus::Inactive)
    }
}

impl fmt::Display for AppStateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AppStateStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(AppStateStatus::Active),
            "background" => Ok(AppStateStatus::Background),
            "inactive" => Ok(AppStateStatus::Inactive),
            _ => Err(format!(
                "Unknown app state: '{s}'. Valid options: active, background, inactive"
            )),
        }
    }
}

/// OS app-state notifications.
pub trait AppStateSource {
    fn current_state(&self) -> AppStateStatus;

    fn add_change_listener(&self, callback: Box<dyn FnMut(AppStateStatus)>) -> Subscription;
}

/// Shared slot holding a container once it mounts, like a React ref.
pub type ContainerSlot = Rc<RefCell<Option<Rc<dyn NavigationContainer>>>>;

/// What the application hands to `register_navigation_container`.
///
/// Resolved once at the registration boundary.
#[derive(Clone)]
pub enum ContainerRef {
    Direct(Rc<dyn NavigationContainer>),
    Indirect(ContainerSlot),
}

impl ContainerRef {
    pub fn direct<C: NavigationContainer + 'static>(container: Rc<C>) -> Self {
        ContainerRef::Direct(container)
    }

    pub fn indirect(slot: ContainerSlot) -> Self {
        ContainerRef::Indirect(slot)
    }

    /// The container behind this ref, if one is mounted
    pub fn resolve(&self) -> Option<Rc<dyn NavigationContainer>> {
        match self {
            ContainerRef::Direct(container) => Some(Rc::clone(container)),
            ContainerRef::Indirect(slot) => slot.borrow().clone(),
        }
    }
}

impl fmt::Debug for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerRef::Direct(_) => f.write_str("ContainerRef::Direct"),
            ContainerRef::Indirect(slot) => write!(
                f,
                "ContainerRef::Indirect(mounted: {})",
                slot.borrow().is_some()
            ),
        }
    }
}
