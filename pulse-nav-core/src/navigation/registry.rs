//! Routing for the parameterless [`mark_content_ready`] entry point.
//!
//! Application code deep inside a screen usually has no handle on the
//! integration, so the live registration publishes itself here. Each
//! registration carries a monotonic [`Generation`]; clearing compares
//! generations, so a torn-down registration can never clear (or be reached
//! through) a newer one.
//!
//! The registry is thread-local: navigation events and readiness signals are
//! all delivered on the UI thread.

use std::cell::RefCell;
use std::fmt;
use std::rc::Weak;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use super::screen_interactive::ContentReadyOutcome;

static NEXT_GENERATION: AtomicU64 = AtomicU64::new(1);

/// Monotonic token identifying one registration of a navigation container
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(u64);

impl Generation {
    /// Allocate the next generation. Never returns the same value twice.
    pub fn next() -> Self {
        Self(NEXT_GENERATION.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "gen-{}", self.0)
    }
}

/// Something that can receive a readiness signal for a given generation.
pub(crate) trait ReadinessTarget {
    fn mark_content_ready(&self, generation: Generation) -> ContentReadyOutcome;
}

struct ReadinessHandler {
    generation: Generation,
    target: Weak<dyn ReadinessTarget>,
}

thread_local! {
    static ACTIVE_HANDLER: RefCell<Option<ReadinessHandler>> = const { RefCell::new(None) };
}

/// Publish `target` as the live readiness handler, replacing any other.
pub(crate) fn install(generation: Generation, target: Weak<dyn ReadinessTarget>) {
    ACTIVE_HANDLER.with(|handler| {
        *handler.borrow_mut() = Some(ReadinessHandler { generation, target });
    });
    debug!(%generation, "Readiness handler installed");
}

/// Clear the live handler if it belongs to `generation`.
///
/// Returns whether anything was cleared.
pub(crate) fn clear_if_current(generation: Generation) -> bool {
    ACTIVE_HANDLER.with(|handler| {
        let mut handler = handler.borrow_mut();
        match handler.as_ref() {
            Some(active) if active.generation == generation => {
                *handler = None;
                debug!(%generation, "Readiness handler cleared");
                true
            }
            _ => false,
        }
    })
}

/// Generation of the registration currently receiving readiness signals
pub fn current_generation() -> Option<Generation> {
    ACTIVE_HANDLER.with(|handler| handler.borrow().as_ref().map(|h| h.generation))
}

/// Signal that the focused screen's content is ready.
///
/// Resolves to whichever navigation integration is registered on this thread.
/// With nothing registered this logs a warning and does nothing.
pub fn mark_content_ready() -> ContentReadyOutcome {
    // Copy the handler out so the target can run without the registry borrowed
    let active = ACTIVE_HANDLER.with(|handler| {
        handler
            .borrow()
            .as_ref()
            .map(|h| (h.generation, h.target.clone()))
    });

    let Some((generation, target)) = active else {
        warn!("mark_content_ready called but navigation integration not initialized");
        return ContentReadyOutcome::NotRegistered;
    };

    match target.upgrade() {
        Some(target) => target.mark_content_ready(generation),
        None => {
            warn!(%generation, "mark_content_ready called after navigation integration was dropped");
            clear_if_current(generation);
            ContentReadyOutcome::NotRegistered
        }
    }
}
