//! Screen interactive tracking: time from load completion until the
//! application declares the screen's content ready.
//!
//! ```text
//! Idle ──load ended──> Started ──mark_content_ready (route matches)──> Ended (exported)
//!                         └──navigate / background / unmount / supersede / mismatch──> Discarded
//! ```
//!
//! The wait for `mark_content_ready` is unbounded and has no timer. A pending
//! span is only ever cancelled by something superseding it, and a cancelled
//! span is discarded: it never reached "ready", so exporting it would report a
//! duration that means nothing.

use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

use super::types::NavigationRoute;
use crate::error::Result;
use crate::telemetry::attributes::{keys, PulseType};
use crate::telemetry::span::{Attributes, Span, SpanOptions, Tracer};

/// Why an interactive span is being torn down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownReason {
    ContentReady,
    NavigatedAway,
    AppBackgrounded,
    ContainerUnmounted,
    Superseded,
    NoCurrentRoute,
    RouteMismatch,
}

impl TeardownReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeardownReason::ContentReady => "content ready",
            TeardownReason::NavigatedAway => "user navigated away",
            TeardownReason::AppBackgrounded => "app went to background",
            TeardownReason::ContainerUnmounted => "navigation container unmounted",
            TeardownReason::Superseded => "starting new span",
            TeardownReason::NoCurrentRoute => "no current route",
            TeardownReason::RouteMismatch => "route mismatch",
        }
    }
}

impl fmt::Display for TeardownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a readiness signal did. Never an error for the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ContentReadyOutcome {
    /// Interactive tracking is turned off
    Disabled,
    /// Nothing was waiting for the signal
    NoActiveSpan,
    /// No integration is registered to receive the signal
    NotRegistered,
    /// The span ended and will be exported
    Exported { route_key: String },
    /// Validation failed and the span was discarded
    Discarded { reason: TeardownReason },
    /// The backend failed; the tracker was reset
    Failed { error: String },
}

/// Interactive tracker state owned by the orchestrator
#[derive(Debug, Default)]
pub struct ScreenInteractiveState {
    pub active_span: Option<Span>,
    pub active_route_key: Option<String>,
}

#[derive(Debug)]
pub struct ScreenInteractiveTracker {
    enabled: bool,
    state: ScreenInteractiveState,
}

impl ScreenInteractiveTracker {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            state: ScreenInteractiveState::default(),
        }
    }

    pub fn state(&self) -> &ScreenInteractiveState {
        &self.state
    }

    pub fn is_active(&self) -> bool {
        self.state.active_span.is_some()
    }

    pub fn active_route_key(&self) -> Option<&str> {
        self.state.active_route_key.as_deref()
    }

    /// Start waiting for `route` to become interactive.
    ///
    /// Idempotent for the route already being tracked. A span tracking a
    /// different route is discarded first.
    pub fn start_screen_interactive(&mut self, route: &NavigationRoute, tracer: &Tracer) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        if self.is_active() {
            if self.active_route_key() == Some(route.key.as_str()) {
                debug!(route_key = %route.key, "screen_interactive already tracking route");
                return Ok(());
            }
            self.teardown(TeardownReason::Superseded, false)?;
        }

        let mut attributes = Attributes::new();
        attributes.insert(
            keys::PULSE_TYPE.into(),
            PulseType::ScreenInteractive.as_str().into(),
        );
        attributes.insert(keys::SCREEN_NAME.into(), route.name.as_str().into());
        attributes.insert(keys::ROUTE_KEY.into(), route.key.as_str().into());
        attributes.insert(keys::PLATFORM.into(), tracer.platform().as_str().into());

        let span = tracer.start_span(
            PulseType::ScreenInteractive.span_name(),
            SpanOptions::with_attributes(attributes),
        )?;
        self.state.active_span = Some(span);
        self.state.active_route_key = Some(route.key.clone());
        debug!(screen = %route.name, route_key = %route.key, "screen_interactive started");
        Ok(())
    }

    /// Application signal that the focused screen is ready.
    ///
    /// Checks, in order: a span is pending, the container has a focused route,
    /// and that route is the one the span was started for. Only then is the
    /// span exported; a failed check discards it.
    pub fn mark_content_ready(
        &mut self,
        current_route: Option<&NavigationRoute>,
    ) -> Result<ContentReadyOutcome> {
        if !self.enabled {
            warn!("mark_content_ready called but screen interactive tracking is disabled");
            return Ok(ContentReadyOutcome::Disabled);
        }

        if !self.is_active() {
            debug!("mark_content_ready called with no active screen_interactive span");
            return Ok(ContentReadyOutcome::NoActiveSpan);
        }

        let Some(current_route) = current_route else {
            warn!("mark_content_ready called but no current route found");
            self.teardown(TeardownReason::NoCurrentRoute, false)?;
            return Ok(ContentReadyOutcome::Discarded {
                reason: TeardownReason::NoCurrentRoute,
            });
        };

        if self.active_route_key() != Some(current_route.key.as_str()) {
            warn!(
                expected = ?self.active_route_key(),
                current = %current_route.key,
                "mark_content_ready called for wrong screen"
            );
            self.teardown(TeardownReason::RouteMismatch, false)?;
            return Ok(ContentReadyOutcome::Discarded {
                reason: TeardownReason::RouteMismatch,
            });
        }

        let route_key = current_route.key.clone();
        self.teardown(TeardownReason::ContentReady, true)?;
        Ok(ContentReadyOutcome::Exported { route_key })
    }

    /// Clear the pending span, exporting it (`export = true`) or discarding it.
    ///
    /// Returns whether a span was pending.
    pub fn teardown(&mut self, reason: TeardownReason, export: bool) -> Result<bool> {
        let route_key = self.state.active_route_key.take();
        let Some(span) = self.state.active_span.take() else {
            return Ok(false);
        };

        if export {
            span.end(None)?;
            debug!(route_key = ?route_key, %reason, "screen_interactive ended");
        } else {
            span.discard()?;
            debug!(route_key = ?route_key, %reason, "screen_interactive discarded");
        }
        Ok(true)
    }

    /// Discard the pending span without exporting it.
    pub fn discard_screen_interactive(&mut self, reason: TeardownReason) -> Result<bool> {
        self.teardown(reason, false)
    }

    /// Drop the span reference without touching the backend.
    pub fn reset(&mut self) {
        self.state = ScreenInteractiveState::default();
    }
}
