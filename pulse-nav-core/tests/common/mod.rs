//! Shared helpers for the navigation integration tests
//!
//! Each test file pulls this in with `mod common;`.

#![allow(dead_code)]

use pulse_nav_core::navigation::{
    AppStateStatus, ContainerRef, MemoryAppState, MemoryNavigationContainer, NavigationIntegration,
    NavigationRoute, Registration,
};
use pulse_nav_core::telemetry::{Platform, RecordedSpan, SpanRecorder, Tracer};
use pulse_nav_core::NavigationIntegrationOptions;
use std::rc::Rc;
use std::sync::Once;

/// Initialize logging for tests (only once per test run)
static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_test_writer()
                    .with_target(true)
                    .with_level(true),
            )
            .with(tracing_subscriber::filter::EnvFilter::from_default_env())
            .try_init();
    });
}

/// An integration wired to in-memory collaborators
pub struct Harness {
    pub recorder: Rc<SpanRecorder>,
    pub app_state: Rc<MemoryAppState>,
    pub container: Rc<MemoryNavigationContainer>,
    pub integration: NavigationIntegration,
}

impl Harness {
    pub fn new(options: NavigationIntegrationOptions) -> Self {
        init_test_logging();
        let recorder = Rc::new(SpanRecorder::new());
        let app_state = Rc::new(MemoryAppState::new(AppStateStatus::Active));
        let tracer = Tracer::new(recorder.clone(), Platform::Android);
        let integration = NavigationIntegration::new(options, tracer, app_state.clone());
        Self {
            recorder,
            app_state,
            container: Rc::new(MemoryNavigationContainer::with_initial_route(home())),
            integration,
        }
    }

    /// All three trackers on
    pub fn with_interactive() -> Self {
        Self::new(NavigationIntegrationOptions {
            screen_interactive_tracking: true,
            ..Default::default()
        })
    }

    pub fn register(&self) -> Registration {
        self.integration
            .register_navigation_container(ContainerRef::direct(self.container.clone()))
    }

    pub fn spans_of_type(&self, pulse_type: &str) -> Vec<RecordedSpan> {
        self.recorder.find_by_type(pulse_type)
    }

    pub fn loads(&self) -> Vec<RecordedSpan> {
        self.spans_of_type("screen_load")
    }

    pub fn sessions(&self) -> Vec<RecordedSpan> {
        self.spans_of_type("screen_session")
    }

    pub fn interactives(&self) -> Vec<RecordedSpan> {
        self.spans_of_type("screen_interactive")
    }
}

pub fn home() -> NavigationRoute {
    NavigationRoute::new("Home", "r1")
}

pub fn profile() -> NavigationRoute {
    NavigationRoute::new("Profile", "r2")
}

pub fn settings() -> NavigationRoute {
    NavigationRoute::new("Settings", "r3")
}
