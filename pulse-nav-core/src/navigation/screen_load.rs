//! Screen load tracking: time from a navigation dispatch to the destination
//! route settling.
//!
//! ```text
//! Idle ──dispatch──> Started ──settle──> Ended (exported) ──> Idle
//!                       └──dispatch──> stale span discarded, new Started
//! ```

use tracing::{debug, warn};

use super::history::RouteHistory;
use super::types::NavigationRoute;
use crate::error::Result;
use crate::telemetry::attributes::{keys, PulseType, PHASE_START};
use crate::telemetry::span::{Attributes, Span, SpanOptions, Tracer};

/// Load tracker state owned by the orchestrator
#[derive(Debug, Default)]
pub struct ScreenLoadState {
    pub active_span: Option<Span>,

    /// Route the previous load settled on (or the route seen at registration)
    pub last_route: Option<NavigationRoute>,
}

#[derive(Debug)]
pub struct ScreenLoadTracker {
    enabled: bool,
    state: ScreenLoadState,
}

impl ScreenLoadTracker {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            state: ScreenLoadState::default(),
        }
    }

    pub fn state(&self) -> &ScreenLoadState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.active_span.is_some()
    }

    pub fn last_route(&self) -> Option<&NavigationRoute> {
        self.state.last_route.as_ref()
    }

    pub fn set_last_route(&mut self, route: NavigationRoute) {
        self.state.last_route = Some(route);
    }

    /// Start a load span for a navigation dispatch.
    ///
    /// A load span still pending from an earlier dispatch never settled, so it
    /// is discarded rather than exported with the wrong destination.
    pub fn start_navigation_span(&mut self, tracer: &Tracer) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if let Some(stale) = self.state.active_span.take() {
            debug!(span_id = %stale.id(), "Discarding unsettled screen_load span");
            if let Err(e) = stale.discard() {
                warn!("Failed to discard stale screen_load span: {}", e);
            }
        }

        let mut attributes = Attributes::new();
        attributes.insert(keys::PULSE_TYPE.into(), PulseType::ScreenLoad.as_str().into());
        attributes.insert(keys::PHASE.into(), PHASE_START.into());
        attributes.insert(keys::PLATFORM.into(), tracer.platform().as_str().into());

        let span = tracer.start_span(
            PulseType::ScreenLoad.span_name(),
            SpanOptions::with_attributes(attributes),
        )?;
        debug!(span_id = %span.id(), "screen_load started");
        self.state.active_span = Some(span);
        Ok(())
    }

    /// The navigation tree settled on `route`.
    ///
    /// Returns the route whose load completed, if a span was pending.
    pub fn handle_state_change(
        &mut self,
        route: &NavigationRoute,
        history: &mut RouteHistory,
    ) -> Result<Option<NavigationRoute>> {
        if !self.enabled || self.state.active_span.is_none() {
            return Ok(None);
        }

        let previous = self.state.last_route.clone();

        // Redundant self-transition: close out with no further attribute writes
        if previous.as_ref().map(|p| p.key.as_str()) == Some(route.key.as_str()) {
            return self.end_navigation_span();
        }

        let route_has_been_seen = history.contains(&route.key);
        history.push(route.key.clone());
        self.state.last_route = Some(route.clone());

        if let Some(span) = self.state.active_span.as_ref() {
            let mut attributes = Attributes::new();
            attributes.insert(keys::SCREEN_NAME.into(), route.name.as_str().into());
            if let Some(previous) = previous.as_ref() {
                attributes.insert(keys::LAST_SCREEN_NAME.into(), previous.name.as_str().into());
            }
            attributes.insert(keys::ROUTE_HAS_BEEN_SEEN.into(), route_has_been_seen.into());
            attributes.insert(keys::ROUTE_KEY.into(), route.key.as_str().into());
            span.set_attributes(attributes)?;
        }

        self.end_navigation_span()
    }

    /// Remember `route` as the settled route, whether or not a load was pending.
    ///
    /// Settles the navigation library reports without a dispatch (the first
    /// mount of an empty container, a programmatic reset) still move the
    /// previous route forward and count as a visit.
    pub fn record_settled_route(&mut self, route: &NavigationRoute, history: &mut RouteHistory) {
        if self.last_route().map(|r| r.key.as_str()) != Some(route.key.as_str()) {
            history.push(route.key.clone());
        }
        self.state.last_route = Some(route.clone());
    }

    /// End (export) the pending load span.
    ///
    /// Returns the route the load settled on; the orchestrator uses it to start
    /// interactive tracking.
    pub fn end_navigation_span(&mut self) -> Result<Option<NavigationRoute>> {
        let Some(span) = self.state.active_span.take() else {
            return Ok(None);
        };
        span.end(None)?;

        let route = self.state.last_route.clone();
        if let Some(route) = route.as_ref() {
            debug!(screen = %route.name, route_key = %route.key, "screen_load ended");
        }
        Ok(route)
    }

    /// Discard the pending load span without exporting it.
    pub fn discard_navigation_span(&mut self, reason: &str) -> Result<()> {
        if let Some(span) = self.state.active_span.take() {
            debug!(span_id = %span.id(), reason, "Discarding screen_load span");
            span.discard()?;
        }
        Ok(())
    }

    /// Drop the span reference without touching the backend.
    pub fn reset(&mut self) {
        self.state.active_span = None;
    }

    /// Forget everything, including the last route.
    pub fn clear(&mut self) {
        self.state = ScreenLoadState::default();
    }
}
