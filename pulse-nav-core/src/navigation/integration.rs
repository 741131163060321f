//! The orchestrator: wires a navigation container and the OS app state to the
//! three screen trackers.
//!
//! ```text
//! container ──dispatch──> interactive teardown ─> session end ─> load start
//!           ──state─────> load settle ──completed──> interactive start
//!                                     └─> session start (if foregrounded)
//! app state ──change────> session start/end ─> interactive teardown (if backgrounded)
//! ```
//!
//! Every handler swallows its errors: a failing tracker is logged and reset,
//! the other trackers still run, and nothing reaches the host application.

use serde::Serialize;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::{debug, info, trace, warn};

use super::history::RouteHistory;
use super::registry::{self, Generation, ReadinessTarget};
use super::screen_interactive::{ContentReadyOutcome, ScreenInteractiveTracker, TeardownReason};
use super::screen_load::ScreenLoadTracker;
use super::screen_session::ScreenSessionTracker;
use super::types::{
    AppStateSource, AppStateStatus, ContainerRef, NavigationContainer, NavigationEvent,
    NavigationRoute, Subscription,
};
use crate::config::NavigationIntegrationOptions;
use crate::error::PulseError;
use crate::telemetry::span::Tracer;

/// State shared between the integration, its registrations and the listeners
/// it installs on the container.
struct IntegrationInner {
    options: NavigationIntegrationOptions,
    tracer: Tracer,
    app_state: Rc<dyn AppStateSource>,
    history: RouteHistory,
    load: ScreenLoadTracker,
    session: ScreenSessionTracker,
    interactive: ScreenInteractiveTracker,
    container: Option<Rc<dyn NavigationContainer>>,
    generation: Option<Generation>,
    subscriptions: Vec<Subscription>,
}

impl IntegrationInner {
    fn new(
        options: NavigationIntegrationOptions,
        tracer: Tracer,
        app_state: Rc<dyn AppStateSource>,
    ) -> Self {
        Self {
            load: ScreenLoadTracker::new(options.screen_navigation_tracking),
            session: ScreenSessionTracker::new(options.screen_session_tracking),
            interactive: ScreenInteractiveTracker::new(options.screen_interactive_tracking),
            options,
            tracer,
            app_state,
            history: RouteHistory::new(),
            container: None,
            generation: None,
            subscriptions: Vec::new(),
        }
    }

    /// Seed history and the session from a container that already has a route.
    fn seed_initial_route(&mut self, route: &NavigationRoute) {
        debug!(screen = %route.name, route_key = %route.key, "Seeding initial route");
        self.history.push(route.key.clone());
        self.load.set_last_route(route.clone());

        let app_state = self.app_state.current_state();
        if self.session.should_start_session(route, app_state) {
            self.start_session(route);
        }
    }

    fn on_navigation_dispatch(&mut self) {
        trace!("Navigation dispatch");
        self.discard_interactive(TeardownReason::NavigatedAway);
        self.end_session();

        if let Err(e) = self.load.start_navigation_span(&self.tracer) {
            warn!("Failed to start screen_load span: {}", e);
            self.load.reset();
        }
    }

    fn on_state_change(&mut self) {
        let Some(container) = self.container.clone() else {
            return;
        };
        let Some(route) = container.current_route() else {
            debug!("Navigation state changed with no current route");
            return;
        };
        trace!(screen = %route.name, route_key = %route.key, "Navigation state settled");

        match self.load.handle_state_change(&route, &mut self.history) {
            Ok(Some(completed)) => self.on_load_completed(&completed),
            Ok(None) => {}
            Err(e) => {
                warn!(route_key = %route.key, "Failed to complete screen_load span: {}", e);
                self.load.reset();
            }
        }
        self.load.record_settled_route(&route, &mut self.history);

        let app_state = self.app_state.current_state();
        if self.session.should_start_session(&route, app_state) {
            self.start_session(&route);
        }
    }

    fn on_load_completed(&mut self, route: &NavigationRoute) {
        if !self.options.screen_interactive_tracking {
            return;
        }
        if let Err(e) = self.interactive.start_screen_interactive(route, &self.tracer) {
            warn!(route_key = %route.key, "Failed to start screen_interactive span: {}", e);
            self.interactive.reset();
        }
    }

    fn on_app_state_change(&mut self, next: AppStateStatus) {
        debug!(state = %next, "App state changed");
        let current_route = self.container.as_ref().and_then(|c| c.current_route());

        if let Err(e) =
            self.session
                .handle_app_state_change(next, current_route.as_ref(), &self.tracer)
        {
            warn!(state = %next, "Failed to update screen_session on app state change: {}", e);
            self.session.reset();
        }

        if next.is_backgrounded() {
            self.discard_interactive(TeardownReason::AppBackgrounded);
        }
    }

    fn mark_content_ready(&mut self) -> ContentReadyOutcome {
        let current_route = self.container.as_ref().and_then(|c| c.current_route());
        match self.interactive.mark_content_ready(current_route.as_ref()) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Failed to finish screen_interactive span: {}", e);
                self.interactive.reset();
                ContentReadyOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Close every open span for a container that is going away.
    fn teardown_spans(&mut self) {
        self.end_session();
        self.discard_interactive(TeardownReason::ContainerUnmounted);
        if let Err(e) = self
            .load
            .discard_navigation_span(TeardownReason::ContainerUnmounted.as_str())
        {
            warn!("Failed to discard screen_load span: {}", e);
            self.load.reset();
        }
    }

    /// Tear down the current registration and hand back its subscriptions.
    ///
    /// The caller removes the subscriptions once this borrow is released.
    fn detach(&mut self) -> Vec<Subscription> {
        if let Some(generation) = self.generation.take() {
            self.teardown_spans();
            registry::clear_if_current(generation);
        }
        self.container = None;
        self.history.clear();
        self.load.clear();
        self.session.reset();
        self.interactive.reset();
        std::mem::take(&mut self.subscriptions)
    }

    fn start_session(&mut self, route: &NavigationRoute) {
        if let Err(e) = self.session.start_screen_session(route, &self.tracer) {
            warn!(route_key = %route.key, "Failed to start screen_session span: {}", e);
            self.session.reset();
        }
    }

    fn end_session(&mut self) {
        if let Err(e) = self.session.end_screen_session() {
            warn!("Failed to end screen_session span: {}", e);
            self.session.reset();
        }
    }

    fn discard_interactive(&mut self, reason: TeardownReason) {
        if let Err(e) = self.interactive.discard_screen_interactive(reason) {
            warn!(%reason, "Failed to discard screen_interactive span: {}", e);
            self.interactive.reset();
        }
    }

    fn snapshot(&self) -> IntegrationSnapshot {
        IntegrationSnapshot {
            registered: self.container.is_some(),
            generation: self.generation.map(|g| g.value()),
            load_active: self.load.is_active(),
            last_route_key: self.load.last_route().map(|r| r.key.clone()),
            session_active: self.session.is_active(),
            session_route_key: self.session.active_route_key().map(str::to_string),
            interactive_active: self.interactive.is_active(),
            interactive_route_key: self.interactive.active_route_key().map(str::to_string),
            history_len: self.history.len(),
        }
    }
}

impl ReadinessTarget for RefCell<IntegrationInner> {
    fn mark_content_ready(&self, generation: Generation) -> ContentReadyOutcome {
        let Ok(mut inner) = self.try_borrow_mut() else {
            warn!("mark_content_ready called while a navigation event was being handled");
            return ContentReadyOutcome::Failed {
                error: "navigation integration busy".to_string(),
            };
        };
        if inner.generation != Some(generation) {
            debug!(%generation, "mark_content_ready for a registration that is no longer live");
            return ContentReadyOutcome::NotRegistered;
        }
        inner.mark_content_ready()
    }
}

/// Run `f` against the integration if `generation` is still the live registration.
fn with_live_inner(
    weak: &Weak<RefCell<IntegrationInner>>,
    generation: Generation,
    event: &'static str,
    f: impl FnOnce(&mut IntegrationInner),
) {
    let Some(shared) = weak.upgrade() else {
        return;
    };
    let Ok(mut inner) = shared.try_borrow_mut() else {
        warn!(event, "Event arrived while the integration was busy; ignoring");
        return;
    };
    if inner.generation != Some(generation) {
        trace!(event, %generation, "Ignoring event for superseded registration");
        return;
    }
    f(&mut inner);
}

/// Install the dispatch, state and app-state listeners for one registration.
fn subscribe(
    shared: &Rc<RefCell<IntegrationInner>>,
    container: &Rc<dyn NavigationContainer>,
    app_state: &dyn AppStateSource,
    generation: Generation,
) -> Vec<Subscription> {
    let weak = Rc::downgrade(shared);

    let on_dispatch = {
        let weak = weak.clone();
        move || {
            with_live_inner(&weak, generation, "dispatch", |inner| {
                inner.on_navigation_dispatch()
            })
        }
    };
    let on_state = {
        let weak = weak.clone();
        move || with_live_inner(&weak, generation, "state", |inner| inner.on_state_change())
    };
    let on_app_state = move |next: AppStateStatus| {
        with_live_inner(&weak, generation, "app_state", |inner| {
            inner.on_app_state_change(next)
        })
    };

    vec![
        container.add_listener(NavigationEvent::Dispatch, Box::new(on_dispatch)),
        container.add_listener(NavigationEvent::State, Box::new(on_state)),
        app_state.add_change_listener(Box::new(on_app_state)),
    ]
}

/// Observable tracker state, for diagnostics and tests
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntegrationSnapshot {
    pub registered: bool,
    pub generation: Option<u64>,
    pub load_active: bool,
    pub last_route_key: Option<String>,
    pub session_active: bool,
    pub session_route_key: Option<String>,
    pub interactive_active: bool,
    pub interactive_route_key: Option<String>,
    pub history_len: usize,
}

/// Screen span tracking for one application.
///
/// Created once per process, then handed the navigation container with
/// [`register_navigation_container`](Self::register_navigation_container)
/// when it mounts. A disabled integration accepts every call and does nothing.
pub struct NavigationIntegration {
    options: NavigationIntegrationOptions,
    inner: Option<Rc<RefCell<IntegrationInner>>>,
}

impl NavigationIntegration {
    pub fn new(
        options: NavigationIntegrationOptions,
        tracer: Tracer,
        app_state: Rc<dyn AppStateSource>,
    ) -> Self {
        let inner = IntegrationInner::new(options.clone(), tracer, app_state);
        Self {
            options,
            inner: Some(Rc::new(RefCell::new(inner))),
        }
    }

    /// An integration that tracks nothing
    pub fn disabled() -> Self {
        Self {
            options: NavigationIntegrationOptions::default(),
            inner: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    pub fn options(&self) -> &NavigationIntegrationOptions {
        &self.options
    }

    /// Start tracking `container_ref`.
    ///
    /// Registering the container that is already registered is idempotent.
    /// Registering a different one tears the old one down first. The returned
    /// [`Registration`] must be cleaned up when the container unmounts.
    pub fn register_navigation_container(&self, container_ref: ContainerRef) -> Registration {
        let Some(shared) = self.inner.as_ref() else {
            debug!("Navigation integration disabled; ignoring container registration");
            return Registration::noop();
        };

        let Some(container) = container_ref.resolve() else {
            let err = PulseError::InvalidContainerRef("ref holds no mounted container".into());
            warn!("{}", err);
            return Registration::noop();
        };

        let (generation, stale_subscriptions, app_state) = {
            let Ok(mut inner) = shared.try_borrow_mut() else {
                warn!("register_navigation_container called while an event was being handled");
                return Registration::noop();
            };

            if let Some(current) = inner.container.as_ref() {
                if Rc::ptr_eq(current, &container) {
                    debug!(generation = ?inner.generation, "Navigation container already registered");
                    return Registration {
                        kind: RegistrationKind::Duplicate,
                        generation: inner.generation,
                        inner: Rc::downgrade(shared),
                    };
                }
                info!("Replacing registered navigation container");
            }

            let stale = inner.detach();
            let generation = Generation::next();
            inner.container = Some(Rc::clone(&container));
            inner.generation = Some(generation);

            if let Some(route) = container.current_route() {
                inner.seed_initial_route(&route);
            }
            (generation, stale, Rc::clone(&inner.app_state))
        };

        for subscription in stale_subscriptions {
            subscription.remove();
        }

        let subscriptions = subscribe(shared, &container, app_state.as_ref(), generation);
        match shared.try_borrow_mut() {
            Ok(mut inner) if inner.generation == Some(generation) => {
                inner.subscriptions = subscriptions;
            }
            _ => {
                warn!(%generation, "Registration superseded while subscribing");
                for subscription in subscriptions {
                    subscription.remove();
                }
                return Registration::noop();
            }
        }

        let weak: Weak<RefCell<IntegrationInner>> = Rc::downgrade(shared);
        let target: Weak<dyn ReadinessTarget> = weak;
        registry::install(generation, target);

        info!(%generation, "Navigation container registered");
        Registration {
            kind: RegistrationKind::Active,
            generation: Some(generation),
            inner: Rc::downgrade(shared),
        }
    }

    /// Readiness signal delivered straight to this integration.
    pub fn mark_content_ready(&self) -> ContentReadyOutcome {
        let Some(shared) = self.inner.as_ref() else {
            warn!("mark_content_ready called on a disabled navigation integration");
            return ContentReadyOutcome::NotRegistered;
        };
        let generation = match shared.try_borrow() {
            Ok(inner) => inner.generation,
            Err(_) => None,
        };
        match generation {
            Some(generation) => shared.mark_content_ready(generation),
            None => {
                warn!("mark_content_ready called but no navigation container is registered");
                ContentReadyOutcome::NotRegistered
            }
        }
    }

    pub fn snapshot(&self) -> Option<IntegrationSnapshot> {
        let shared = self.inner.as_ref()?;
        let inner = shared.try_borrow().ok()?;
        Some(inner.snapshot())
    }
}

/// How a registration call was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationKind {
    /// The container is now the tracked one
    Active,
    /// The container was already registered; nothing was subscribed
    Duplicate,
    /// Nothing was registered (disabled integration or empty ref)
    Noop,
}

/// Handle for one `register_navigation_container` call.
#[must_use = "call cleanup() when the navigation container unmounts"]
#[derive(Debug)]
pub struct Registration {
    kind: RegistrationKind,
    generation: Option<Generation>,
    inner: Weak<RefCell<IntegrationInner>>,
}

impl Registration {
    fn noop() -> Self {
        Self {
            kind: RegistrationKind::Noop,
            generation: None,
            inner: Weak::new(),
        }
    }

    pub fn kind(&self) -> RegistrationKind {
        self.kind
    }

    pub fn generation(&self) -> Option<Generation> {
        self.generation
    }

    /// Readiness signal for this registration, without going through the
    /// thread-local registry.
    pub fn mark_content_ready(&self) -> ContentReadyOutcome {
        let (Some(generation), Some(shared)) = (self.generation, self.inner.upgrade()) else {
            warn!("mark_content_ready called on an empty registration");
            return ContentReadyOutcome::NotRegistered;
        };
        shared.mark_content_ready(generation)
    }

    /// Stop tracking the container.
    ///
    /// Ends the session span, discards pending load and interactive spans,
    /// removes the listeners and clears the readiness registry. Does nothing
    /// to a newer registration that has since replaced this one.
    pub fn cleanup(self) {
        let (Some(generation), Some(shared)) = (self.generation, self.inner.upgrade()) else {
            return;
        };

        let subscriptions = {
            let Ok(mut inner) = shared.try_borrow_mut() else {
                warn!(%generation, "cleanup called while an event was being handled");
                return;
            };
            if inner.generation != Some(generation) {
                debug!(%generation, "Cleanup for superseded registration");
                return;
            }

            match self.kind {
                RegistrationKind::Active => {
                    info!(%generation, "Navigation container unregistered");
                    inner.detach()
                }
                RegistrationKind::Duplicate => {
                    inner.end_session();
                    Vec::new()
                }
                RegistrationKind::Noop => Vec::new(),
            }
        };

        for subscription in subscriptions {
            subscription.remove();
        }
    }
}
