//! In-memory span backend.
//!
//! Records every span the trackers start, along with how it terminated. The
//! CLI replays scenarios against it and the tests assert on its contents.
//!
//! ## Lifecycle of a recorded span
//!
//! ```text
//! start_span ──> Open ──end_span──────> Exported
//!                   └───discard_span──> Discarded
//! ```
//!
//! Terminating a span that is not `Open` is an error, which is how the tests
//! prove a tracker never ends the same span twice.

use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::trace;
use uuid::Uuid;

use super::attributes::keys;
use super::span::{Attributes, SpanBackend, SpanId, SpanOptions, SpanStatusCode};
use crate::error::{PulseError, Result};

/// Convert SystemTime to nanoseconds since Unix epoch.
fn system_time_to_nanos(time: &SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// How a recorded span terminated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpanOutcome {
    Open,
    Exported,
    Discarded,
}

/// An event added to a span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEvent {
    pub name: String,

    #[serde(default, skip_serializing_if = "Attributes::is_empty")]
    pub attributes: Attributes,

    pub time_unix_nano: u64,
}

/// Everything the recorder knows about one span
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedSpan {
    pub span_id: SpanId,

    pub name: String,

    pub attributes: Attributes,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<SpanEvent>,

    pub inherit_context: bool,

    pub start_time_unix_nano: u64,

    /// Zero until the span is exported or discarded
    pub end_time_unix_nano: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SpanStatusCode>,

    pub outcome: SpanOutcome,
}

impl RecordedSpan {
    /// Value of the `pulse.type` attribute, if present
    pub fn pulse_type(&self) -> Option<&str> {
        self.attributes.get(keys::PULSE_TYPE).and_then(|v| v.as_str())
    }

    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }

    pub fn attribute_bool(&self, key: &str) -> Option<bool> {
        self.attributes.get(key).and_then(|v| v.as_bool())
    }

    /// Duration in milliseconds, zero while open
    pub fn duration_ms(&self) -> u64 {
        if self.end_time_unix_nano == 0 {
            return 0;
        }
        self.end_time_unix_nano.saturating_sub(self.start_time_unix_nano) / 1_000_000
    }
}

type DiscardHook = Rc<dyn Fn(&RecordedSpan)>;

/// [`SpanBackend`] that keeps every span in memory.
pub struct SpanRecorder {
    run_id: String,
    timestamp: SystemTime,
    spans: RefCell<Vec<RecordedSpan>>,
    discard_hook: RefCell<Option<DiscardHook>>,
    fail_next_start: Cell<bool>,
    fail_next_end: Cell<bool>,
}

impl Default for SpanRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl SpanRecorder {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::now_v7().to_string(),
            timestamp: SystemTime::now(),
            spans: RefCell::new(Vec::new()),
            discard_hook: RefCell::new(None),
            fail_next_start: Cell::new(false),
            fail_next_end: Cell::new(false),
        }
    }

    /// Identifier of this recording (UUID v7, time-ordered)
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// When the recording began
    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Invoke `hook` every time a span is discarded.
    pub fn on_discard(&self, hook: impl Fn(&RecordedSpan) + 'static) {
        *self.discard_hook.borrow_mut() = Some(Rc::new(hook));
    }

    /// Make the next `start_span` call fail with a backend error.
    pub fn fail_next_start(&self) {
        self.fail_next_start.set(true);
    }

    /// Make the next `end_span` call fail with a backend error.
    pub fn fail_next_end(&self) {
        self.fail_next_end.set(true);
    }

    /// Snapshot of all spans in start order
    pub fn spans(&self) -> Vec<RecordedSpan> {
        self.spans.borrow().clone()
    }

    pub fn get(&self, id: &SpanId) -> Option<RecordedSpan> {
        self.spans.borrow().iter().find(|s| &s.span_id == id).cloned()
    }

    pub fn exported(&self) -> Vec<RecordedSpan> {
        self.with_outcome(SpanOutcome::Exported)
    }

    pub fn discarded(&self) -> Vec<RecordedSpan> {
        self.with_outcome(SpanOutcome::Discarded)
    }

    pub fn open(&self) -> Vec<RecordedSpan> {
        self.with_outcome(SpanOutcome::Open)
    }

    /// All spans whose `pulse.type` attribute equals `pulse_type`
    pub fn find_by_type(&self, pulse_type: &str) -> Vec<RecordedSpan> {
        self.spans
            .borrow()
            .iter()
            .filter(|s| s.pulse_type() == Some(pulse_type))
            .cloned()
            .collect()
    }

    pub fn clear(&self) {
        self.spans.borrow_mut().clear();
    }

    fn with_outcome(&self, outcome: SpanOutcome) -> Vec<RecordedSpan> {
        self.spans
            .borrow()
            .iter()
            .filter(|s| s.outcome == outcome)
            .cloned()
            .collect()
    }

    /// Run `f` against an open span, erroring if it is unknown or finished.
    fn with_open_span<T>(&self, id: &SpanId, f: impl FnOnce(&mut RecordedSpan) -> T) -> Result<T> {
        let mut spans = self.spans.borrow_mut();
        let span = spans
            .iter_mut()
            .find(|s| &s.span_id == id)
            .ok_or_else(|| PulseError::UnknownSpan(id.clone()))?;
        if span.outcome != SpanOutcome::Open {
            return Err(PulseError::SpanFinished(id.clone()));
        }
        Ok(f(span))
    }
}

impl SpanBackend for SpanRecorder {
    fn start_span(&self, name: &str, options: SpanOptions) -> Result<SpanId> {
        if self.fail_next_start.replace(false) {
            return Err(PulseError::Backend(format!(
                "injected failure starting span '{name}'"
            )));
        }

        let span_id = SpanId::generate();
        trace!(span_id = %span_id, name, "Recording span start");
        self.spans.borrow_mut().push(RecordedSpan {
            span_id: span_id.clone(),
            name: name.to_string(),
            attributes: options.attributes,
            events: Vec::new(),
            inherit_context: options.inherit_context,
            start_time_unix_nano: system_time_to_nanos(&SystemTime::now()),
            end_time_unix_nano: 0,
            status: None,
            outcome: SpanOutcome::Open,
        });
        Ok(span_id)
    }

    fn end_span(&self, id: &SpanId, status: Option<SpanStatusCode>) -> Result<()> {
        if self.fail_next_end.replace(false) {
            return Err(PulseError::Backend(format!(
                "injected failure ending span {id}"
            )));
        }

        self.with_open_span(id, |span| {
            span.status = status;
            span.end_time_unix_nano = system_time_to_nanos(&SystemTime::now());
            span.outcome = SpanOutcome::Exported;
        })
    }

    fn discard_span(&self, id: &SpanId) -> Result<()> {
        let discarded = self.with_open_span(id, |span| {
            span.end_time_unix_nano = system_time_to_nanos(&SystemTime::now());
            span.outcome = SpanOutcome::Discarded;
            span.clone()
        })?;

        // Cloned out so the hook may inspect the recorder or replace itself
        let hook = self.discard_hook.borrow().clone();
        if let Some(hook) = hook {
            hook(&discarded);
        }
        Ok(())
    }

    fn set_attributes(&self, id: &SpanId, attributes: Attributes) -> Result<()> {
        self.with_open_span(id, |span| span.attributes.extend(attributes))
    }

    fn add_event(&self, id: &SpanId, name: &str, attributes: Attributes) -> Result<()> {
        self.with_open_span(id, |span| {
            span.events.push(SpanEvent {
                name: name.to_string(),
                attributes,
                time_unix_nano: system_time_to_nanos(&SystemTime::now()),
            })
        })
    }

    fn record_exception(&self, id: &SpanId, message: &str, attributes: Attributes) -> Result<()> {
        let mut attributes = attributes;
        attributes.insert("exception.message".to_string(), message.into());
        self.add_event(id, "exception", attributes)
    }
}
