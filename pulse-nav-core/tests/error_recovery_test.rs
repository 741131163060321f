//! Backend failures inside handlers are logged and absorbed
//!
//! The recorder's failure injection stands in for an exporter that throws.

mod common;

use common::{profile, settings, Harness};
use pretty_assertions::assert_eq;
use pulse_nav_core::navigation::ContentReadyOutcome;
use pulse_nav_core::telemetry::SpanOutcome;

#[test]
fn test_failed_load_start_does_not_block_navigation() {
    let h = Harness::new(Default::default());
    let registration = h.register();

    h.recorder.fail_next_start();
    h.container.navigate(profile());

    assert!(h.loads().is_empty());
    let snapshot = h.integration.snapshot().unwrap();
    assert!(!snapshot.load_active);
    assert_eq!(snapshot.session_route_key.as_deref(), Some("r2"));

    // The next navigation is tracked normally
    h.container.navigate(settings());
    let loads = h.loads();
    assert_eq!(loads.len(), 1);
    assert_eq!(loads[0].outcome, SpanOutcome::Exported);
    assert_eq!(loads[0].attribute_str("screen.name"), Some("Settings"));

    registration.cleanup();
}

#[test]
fn test_failed_session_end_resets_tracker() {
    let h = Harness::new(Default::default());
    let registration = h.register();

    // The dispatch ends the seeded session first
    h.recorder.fail_next_end();
    h.container.navigate(profile());

    let snapshot = h.integration.snapshot().unwrap();
    assert_eq!(snapshot.session_route_key.as_deref(), Some("r2"));
    assert!(snapshot.session_active);
    assert_eq!(h.loads()[0].outcome, SpanOutcome::Exported);

    registration.cleanup();
}

#[test]
fn test_failed_session_start_on_registration() {
    let h = Harness::new(Default::default());

    h.recorder.fail_next_start();
    let registration = h.register();

    assert!(h.sessions().is_empty());
    assert!(!h.integration.snapshot().unwrap().session_active);

    // A later settle opens the session
    h.container.navigate(profile());
    assert_eq!(h.sessions().len(), 1);

    registration.cleanup();
}

#[test]
fn test_failed_interactive_export_is_reported_not_raised() {
    let h = Harness::with_interactive();
    let registration = h.register();
    h.container.navigate(profile());

    h.recorder.fail_next_end();
    let outcome = pulse_nav_core::mark_content_ready();

    assert!(matches!(outcome, ContentReadyOutcome::Failed { .. }));
    assert!(!h.integration.snapshot().unwrap().interactive_active);
    assert_eq!(
        pulse_nav_core::mark_content_ready(),
        ContentReadyOutcome::NoActiveSpan
    );

    registration.cleanup();
}

#[test]
fn test_failed_interactive_start_keeps_other_trackers_running() {
    let h = Harness::with_interactive();
    let registration = h.register();

    // Load start succeeds; the failure hits the interactive start after settle
    h.container.dispatch();
    h.recorder.fail_next_start();
    h.container.settle(profile());

    assert_eq!(h.loads()[0].outcome, SpanOutcome::Exported);
    assert!(h.interactives().is_empty());
    assert_eq!(
        h.integration
            .snapshot()
            .unwrap()
            .session_route_key
            .as_deref(),
        Some("r2")
    );

    registration.cleanup();
}
