//! End-to-end span lifecycles driven through the in-memory container
//!
//! Covers the load -> interactive chain, route history bookkeeping and the
//! single-active-load guarantee.

mod common;

use common::{home, profile, settings, Harness};
use pretty_assertions::assert_eq;
use pulse_nav_core::navigation::{
    ContainerRef, ContentReadyOutcome, MemoryNavigationContainer, NavigationRoute,
    ScreenInteractiveTracker, TeardownReason, ROUTE_HISTORY_CAPACITY,
};
use pulse_nav_core::telemetry::{Platform, SpanOutcome, SpanRecorder, Tracer};
use pulse_nav_core::NavigationIntegrationOptions;
use std::cell::RefCell;
use std::rc::Rc;

// ============================================================================
// Home -> Profile -> ready / Settings
// ============================================================================

#[test]
fn test_navigation_completes_load_and_starts_interactive() {
    let h = Harness::with_interactive();
    let registration = h.register();

    h.container.navigate(profile());

    let loads = h.loads();
    assert_eq!(loads.len(), 1);
    let load = &loads[0];
    assert_eq!(load.outcome, SpanOutcome::Exported);
    assert_eq!(load.name, "Navigated");
    assert_eq!(load.attribute_str("screen.name"), Some("Profile"));
    assert_eq!(load.attribute_str("last.screen.name"), Some("Home"));
    assert_eq!(load.attribute_bool("routeHasBeenSeen"), Some(false));
    assert_eq!(load.attribute_str("routeKey"), Some("r2"));
    assert_eq!(load.attribute_str("phase"), Some("start"));
    assert_eq!(load.attribute_str("platform"), Some("android"));

    let interactives = h.interactives();
    assert_eq!(interactives.len(), 1);
    assert_eq!(interactives[0].outcome, SpanOutcome::Open);
    assert_eq!(interactives[0].attribute_str("routeKey"), Some("r2"));

    registration.cleanup();
}

#[test]
fn test_mark_content_ready_exports_interactive_span() {
    let h = Harness::with_interactive();
    let registration = h.register();
    h.container.navigate(profile());

    let outcome = pulse_nav_core::mark_content_ready();

    assert_eq!(
        outcome,
        ContentReadyOutcome::Exported {
            route_key: "r2".into()
        }
    );
    let interactives = h.interactives();
    assert_eq!(interactives.len(), 1);
    assert_eq!(interactives[0].outcome, SpanOutcome::Exported);
    assert_eq!(interactives[0].attribute_str("screen.name"), Some("Profile"));

    registration.cleanup();
}

#[test]
fn test_navigating_away_discards_pending_interactive() {
    let h = Harness::with_interactive();
    let registration = h.register();
    h.container.navigate(profile());

    h.container.navigate(settings());

    let interactives = h.interactives();
    assert_eq!(interactives.len(), 2);
    assert_eq!(interactives[0].attribute_str("routeKey"), Some("r2"));
    assert_eq!(interactives[0].outcome, SpanOutcome::Discarded);
    assert_eq!(interactives[1].attribute_str("routeKey"), Some("r3"));
    assert_eq!(interactives[1].outcome, SpanOutcome::Open);
    assert!(h
        .interactives()
        .iter()
        .all(|s| s.outcome != SpanOutcome::Exported));

    // The late signal lands on r3, which is now focused
    assert_eq!(
        pulse_nav_core::mark_content_ready(),
        ContentReadyOutcome::Exported {
            route_key: "r3".into()
        }
    );

    registration.cleanup();
}

#[test]
fn test_interactive_disabled_by_default() {
    let h = Harness::new(NavigationIntegrationOptions::default());
    let registration = h.register();
    h.container.navigate(profile());

    assert!(h.interactives().is_empty());
    assert_eq!(
        pulse_nav_core::mark_content_ready(),
        ContentReadyOutcome::Disabled
    );

    registration.cleanup();
}

// ============================================================================
// Readiness validation
// ============================================================================

#[test]
fn test_mark_content_ready_without_pending_span_is_noop() {
    let h = Harness::with_interactive();
    let registration = h.register();

    assert_eq!(
        pulse_nav_core::mark_content_ready(),
        ContentReadyOutcome::NoActiveSpan
    );
    assert!(h.interactives().is_empty());

    registration.cleanup();
}

#[test]
fn test_mark_content_ready_for_wrong_route_discards() {
    let h = Harness::with_interactive();
    let registration = h.register();
    h.container.navigate(profile());

    // Focus moves without the container reporting a transition
    h.container.set_current_route(settings());

    assert_eq!(
        pulse_nav_core::mark_content_ready(),
        ContentReadyOutcome::Discarded {
            reason: TeardownReason::RouteMismatch
        }
    );
    let interactives = h.interactives();
    assert_eq!(interactives[0].outcome, SpanOutcome::Discarded);
    assert!(h.recorder.exported().iter().all(|s| s.name != "ScreenInteractive"));

    registration.cleanup();
}

#[test]
fn test_mark_content_ready_without_current_route_discards() {
    let h = Harness::with_interactive();
    let registration = h.register();
    h.container.navigate(profile());
    h.container.clear_routes();

    assert_eq!(
        pulse_nav_core::mark_content_ready(),
        ContentReadyOutcome::Discarded {
            reason: TeardownReason::NoCurrentRoute
        }
    );
    assert_eq!(h.interactives()[0].outcome, SpanOutcome::Discarded);

    registration.cleanup();
}

#[test]
fn test_interactive_start_is_idempotent_and_supersedes_other_routes() {
    let recorder = Rc::new(SpanRecorder::new());
    let tracer = Tracer::new(recorder.clone(), Platform::Ios);
    let discarded = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&discarded);
    recorder.on_discard(move |span| {
        sink.borrow_mut()
            .push(span.attribute_str("routeKey").unwrap_or_default().to_string())
    });
    let mut tracker = ScreenInteractiveTracker::new(true);

    tracker.start_screen_interactive(&profile(), &tracer).unwrap();
    tracker.start_screen_interactive(&profile(), &tracer).unwrap();
    assert_eq!(recorder.spans().len(), 1);
    assert!(discarded.borrow().is_empty());

    tracker.start_screen_interactive(&settings(), &tracer).unwrap();
    assert_eq!(*discarded.borrow(), vec!["r2".to_string()]);
    assert_eq!(tracker.active_route_key(), Some("r3"));
    assert_eq!(recorder.open().len(), 1);
}

// ============================================================================
// Load tracking
// ============================================================================

#[test]
fn test_at_most_one_load_span_active() {
    let h = Harness::new(NavigationIntegrationOptions::default());
    let registration = h.register();
    let open_loads = || {
        h.loads()
            .iter()
            .filter(|s| s.outcome == SpanOutcome::Open)
            .count()
    };

    h.container.dispatch();
    assert_eq!(open_loads(), 1);
    h.container.dispatch();
    assert_eq!(open_loads(), 1);
    h.container.settle(profile());
    assert_eq!(open_loads(), 0);
    h.container.navigate(settings());
    assert_eq!(open_loads(), 0);
    h.container.dispatch();
    h.container.dispatch();
    h.container.dispatch();
    assert_eq!(open_loads(), 1);

    let discarded = h
        .loads()
        .iter()
        .filter(|s| s.outcome == SpanOutcome::Discarded)
        .count();
    assert_eq!(discarded, 3);

    registration.cleanup();
}

#[test]
fn test_route_has_been_seen_tracks_revisits() {
    let h = Harness::new(NavigationIntegrationOptions::default());
    let registration = h.register();

    h.container.navigate(profile());
    h.container.navigate(settings());
    assert!(h.container.go_back());
    h.container.dispatch();
    h.container.settle(home());
    h.container.navigate(settings());

    let seen: Vec<_> = h
        .loads()
        .iter()
        .map(|s| {
            (
                s.attribute_str("routeKey").unwrap_or_default().to_string(),
                s.attribute_bool("routeHasBeenSeen"),
            )
        })
        .collect();
    assert_eq!(
        seen,
        vec![
            ("r2".to_string(), Some(false)),
            ("r3".to_string(), Some(false)),
            ("r2".to_string(), Some(true)),
            ("r1".to_string(), Some(true)),
            ("r3".to_string(), Some(true)),
        ]
    );

    registration.cleanup();
}

#[test]
fn test_same_key_settle_ends_load_without_attributes() {
    let h = Harness::new(NavigationIntegrationOptions::default());
    let registration = h.register();

    h.container.dispatch();
    h.container.settle(home());

    let loads = h.loads();
    assert_eq!(loads.len(), 1);
    assert_eq!(loads[0].outcome, SpanOutcome::Exported);
    assert!(loads[0].attribute_str("screen.name").is_none());
    assert_eq!(h.integration.snapshot().unwrap().history_len, 1);

    registration.cleanup();
}

#[test]
fn test_settle_without_dispatch_counts_as_visit() {
    let h = Harness::new(NavigationIntegrationOptions::default());
    let container = Rc::new(MemoryNavigationContainer::new());
    let registration = h
        .integration
        .register_navigation_container(ContainerRef::direct(container.clone()));

    // First mount of an empty container reports a settle with no dispatch
    container.settle(home());
    assert!(h.loads().is_empty());

    container.navigate(profile());
    assert!(container.go_back());

    let loads = h.loads();
    assert_eq!(loads.len(), 2);
    assert_eq!(loads[0].attribute_str("routeKey"), Some("r2"));
    assert_eq!(loads[0].attribute_str("last.screen.name"), Some("Home"));
    assert_eq!(loads[0].attribute_bool("routeHasBeenSeen"), Some(false));
    assert_eq!(loads[1].attribute_str("routeKey"), Some("r1"));
    assert_eq!(loads[1].attribute_str("last.screen.name"), Some("Profile"));
    assert_eq!(loads[1].attribute_bool("routeHasBeenSeen"), Some(true));

    registration.cleanup();
}

#[test]
fn test_undispatched_settle_moves_previous_route_forward() {
    let h = Harness::new(NavigationIntegrationOptions::default());
    let registration = h.register();

    h.container.settle(profile());
    assert_eq!(
        h.integration.snapshot().unwrap().last_route_key.as_deref(),
        Some("r2")
    );

    // Back to Home is a real transition, not a same-key settle
    h.container.dispatch();
    h.container.settle(home());

    let loads = h.loads();
    assert_eq!(loads.len(), 1);
    assert_eq!(loads[0].attribute_str("screen.name"), Some("Home"));
    assert_eq!(loads[0].attribute_str("routeKey"), Some("r1"));
    assert_eq!(loads[0].attribute_str("last.screen.name"), Some("Profile"));
    assert_eq!(loads[0].attribute_bool("routeHasBeenSeen"), Some(true));
    assert_eq!(h.integration.snapshot().unwrap().history_len, 2);

    registration.cleanup();
}

#[test]
fn test_route_history_evicts_oldest_key() {
    let h = Harness::new(NavigationIntegrationOptions {
        screen_session_tracking: false,
        ..Default::default()
    });
    let registration = h.register();
    let route = |i: usize| NavigationRoute::new(format!("Screen{i}"), format!("key-{i}"));

    // The seeded "r1" plus 201 distinct keys: "r1" and "key-0" are evicted
    for i in 0..=ROUTE_HISTORY_CAPACITY {
        h.container.navigate(route(i));
    }
    assert_eq!(
        h.integration.snapshot().unwrap().history_len,
        ROUTE_HISTORY_CAPACITY
    );

    h.container.dispatch();
    h.container.settle(route(150));
    h.container.dispatch();
    h.container.settle(route(0));

    let loads = h.loads();
    let revisits = &loads[loads.len() - 2..];
    assert_eq!(revisits[0].attribute_str("routeKey"), Some("key-150"));
    assert_eq!(revisits[0].attribute_bool("routeHasBeenSeen"), Some(true));
    assert_eq!(revisits[1].attribute_str("routeKey"), Some("key-0"));
    assert_eq!(revisits[1].attribute_bool("routeHasBeenSeen"), Some(false));

    registration.cleanup();
}

#[test]
fn test_global_attributes_reach_every_span() {
    let h = Harness::with_interactive();
    let recorder = Rc::new(SpanRecorder::new());
    let tracer = Tracer::new(recorder.clone(), Platform::Ios).with_global_attributes(
        pulse_nav_core::attributes! { "app.version" => "4.2.0", "platform" => "overridden" },
    );
    let integration = pulse_nav_core::NavigationIntegration::new(
        h.integration.options().clone(),
        tracer,
        h.app_state.clone(),
    );
    let registration = integration.register_navigation_container(
        pulse_nav_core::navigation::ContainerRef::direct(h.container.clone()),
    );

    h.container.navigate(profile());

    let spans = recorder.spans();
    assert!(!spans.is_empty());
    for span in &spans {
        assert_eq!(span.attribute_str("app.version"), Some("4.2.0"));
        assert_eq!(span.attribute_str("platform"), Some("ios"));
    }

    registration.cleanup();
}
