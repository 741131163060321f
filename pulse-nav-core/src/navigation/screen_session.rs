//! Screen session tracking: how long a route stays visible in the foreground.
//!
//! Each foreground period gets its own span. Backgrounding ends the span and
//! returning to the foreground starts a fresh one; sessions never resume.

use tracing::debug;

use super::types::{AppStateStatus, NavigationRoute};
use crate::error::Result;
use crate::telemetry::attributes::{keys, PulseType};
use crate::telemetry::span::{Attributes, Span, SpanOptions, Tracer};

/// Session tracker state owned by the orchestrator
#[derive(Debug, Default)]
pub struct ScreenSessionState {
    pub active_span: Option<Span>,
    pub active_route_key: Option<String>,
}

#[derive(Debug)]
pub struct ScreenSessionTracker {
    enabled: bool,
    state: ScreenSessionState,
}

impl ScreenSessionTracker {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            state: ScreenSessionState::default(),
        }
    }

    pub fn state(&self) -> &ScreenSessionState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.active_span.is_some()
    }

    pub fn active_route_key(&self) -> Option<&str> {
        self.state.active_route_key.as_deref()
    }

    /// Start a session span for `route`, ending any session still open.
    pub fn start_screen_session(&mut self, route: &NavigationRoute, tracer: &Tracer) -> Result<()> {
        self.end_screen_session()?;

        let mut attributes = Attributes::new();
        attributes.insert(keys::PULSE_TYPE.into(), PulseType::ScreenSession.as_str().into());
        attributes.insert(keys::SCREEN_NAME.into(), route.name.as_str().into());
        attributes.insert(keys::ROUTE_KEY.into(), route.key.as_str().into());
        attributes.insert(keys::PLATFORM.into(), tracer.platform().as_str().into());

        let span = tracer.start_span(
            PulseType::ScreenSession.span_name(),
            SpanOptions::with_attributes(attributes),
        )?;
        self.state.active_span = Some(span);
        self.state.active_route_key = Some(route.key.clone());
        debug!(screen = %route.name, route_key = %route.key, "screen_session started");
        Ok(())
    }

    /// End (export) the active session span, if any.
    pub fn end_screen_session(&mut self) -> Result<()> {
        let route_key = self.state.active_route_key.take();
        if let Some(span) = self.state.active_span.take() {
            span.end(None)?;
            debug!(route_key = ?route_key, "screen_session ended");
        }
        Ok(())
    }

    /// Whether a settle on `route` while the app is in `app_state` should open a session.
    pub fn should_start_session(&self, route: &NavigationRoute, app_state: AppStateStatus) -> bool {
        self.enabled
            && app_state == AppStateStatus::Active
            && self.state.active_span.is_none()
            && self.state.active_route_key.as_deref() != Some(route.key.as_str())
    }

    /// React to an OS app-state transition.
    ///
    /// `current_route` is the container's focused route at the time of the event.
    pub fn handle_app_state_change(
        &mut self,
        next_state: AppStateStatus,
        current_route: Option<&NavigationRoute>,
        tracer: &Tracer,
    ) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        match next_state {
            AppStateStatus::Background | AppStateStatus::Inactive => self.end_screen_session(),
            AppStateStatus::Active => match current_route {
                Some(route) if !self.is_active() => self.start_screen_session(route, tracer),
                _ => Ok(()),
            },
        }
    }

    /// Drop the span reference without touching the backend.
    pub fn reset(&mut self) {
        self.state = ScreenSessionState::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::attributes::Platform;
    use crate::telemetry::recorder::SpanRecorder;
    use pretty_assertions::assert_eq;
    use std::rc::Rc;

    fn setup() -> (Rc<SpanRecorder>, Tracer) {
        let recorder = Rc::new(SpanRecorder::new());
        let tracer = Tracer::new(recorder.clone(), Platform::Android);
        (recorder, tracer)
    }

    #[test]
    fn test_start_tags_span() {
        let (recorder, tracer) = setup();
        let mut tracker = ScreenSessionTracker::new(true);

        tracker
            .start_screen_session(&NavigationRoute::new("Home", "r1"), &tracer)
            .unwrap();

        let span = &recorder.open()[0];
        assert_eq!(span.name, "ScreenSession");
        assert_eq!(span.pulse_type(), Some("screen_session"));
        assert_eq!(span.attribute_str("screen.name"), Some("Home"));
        assert_eq!(span.attribute_str("routeKey"), Some("r1"));
        assert_eq!(tracker.active_route_key(), Some("r1"));
    }

    #[test]
    fn test_start_while_active_ends_previous() {
        let (recorder, tracer) = setup();
        let mut tracker = ScreenSessionTracker::new(true);

        tracker
            .start_screen_session(&NavigationRoute::new("Home", "r1"), &tracer)
            .unwrap();
        tracker
            .start_screen_session(&NavigationRoute::new("Profile", "r2"), &tracer)
            .unwrap();

        assert_eq!(recorder.exported().len(), 1);
        assert_eq!(recorder.open().len(), 1);
        assert_eq!(tracker.active_route_key(), Some("r2"));
    }

    #[test]
    fn test_should_start_session_predicate() {
        let (_recorder, tracer) = setup();
        let mut tracker = ScreenSessionTracker::new(true);
        let home = NavigationRoute::new("Home", "r1");

        assert!(tracker.should_start_session(&home, AppStateStatus::Active));
        assert!(!tracker.should_start_session(&home, AppStateStatus::Background));
        assert!(!tracker.should_start_session(&home, AppStateStatus::Inactive));

        tracker.start_screen_session(&home, &tracer).unwrap();
        assert!(!tracker.should_start_session(&home, AppStateStatus::Active));
        assert!(!tracker.should_start_session(
            &NavigationRoute::new("Profile", "r2"),
            AppStateStatus::Active
        ));

        let disabled = ScreenSessionTracker::new(false);
        assert!(!disabled.should_start_session(&home, AppStateStatus::Active));
    }

    #[test]
    fn test_background_then_foreground_restarts_session() {
        let (recorder, tracer) = setup();
        let mut tracker = ScreenSessionTracker::new(true);
        let home = NavigationRoute::new("Home", "r1");

        tracker.start_screen_session(&home, &tracer).unwrap();
        let first = recorder.open()[0].span_id.clone();

        tracker
            .handle_app_state_change(AppStateStatus::Background, Some(&home), &tracer)
            .unwrap();
        assert!(!tracker.is_active());
        assert_eq!(recorder.exported()[0].span_id, first);

        tracker
            .handle_app_state_change(AppStateStatus::Active, Some(&home), &tracer)
            .unwrap();
        let open = recorder.open();
        assert_eq!(open.len(), 1);
        assert_ne!(open[0].span_id, first);
    }

    #[test]
    fn test_foreground_without_route_starts_nothing() {
        let (recorder, tracer) = setup();
        let mut tracker = ScreenSessionTracker::new(true);

        tracker
            .handle_app_state_change(AppStateStatus::Active, None, &tracer)
            .unwrap();

        assert!(recorder.spans().is_empty());
    }

    #[test]
    fn test_disabled_tracker_ignores_app_state() {
        let (recorder, tracer) = setup();
        let mut tracker = ScreenSessionTracker::new(false);

        tracker
            .handle_app_state_change(
                AppStateStatus::Active,
                Some(&NavigationRoute::new("Home", "r1")),
                &tracer,
            )
            .unwrap();

        assert!(recorder.spans().is_empty());
    }
}
