//! Span capability consumed by the screen trackers.
//!
//! The trackers never talk to an exporter directly. They start spans through a
//! [`Tracer`], which wraps whatever [`SpanBackend`] the host provides (a native
//! SDK bridge, an OTLP pipeline, or the in-memory [`SpanRecorder`] used by the
//! tests and the CLI).
//!
//! A [`Span`] is an owning handle: `end` and `discard` consume it, so a span
//! can be terminated exactly once and only by whoever holds it.
//!
//! [`SpanRecorder`]: super::recorder::SpanRecorder

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use uuid::Uuid;

use super::attributes::Platform;
use crate::error::Result;

// ============================================================================
// Identity
// ============================================================================

/// Backend-assigned span identifier (16-char hex, OTLP span id width).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpanId(String);

impl SpanId {
    /// Generate a unique span id from the tail of a UUID v7.
    pub fn generate() -> Self {
        let uuid = Uuid::now_v7();
        Self(hex::encode(&uuid.as_bytes()[8..16]))
    }

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Attributes
// ============================================================================

/// A single span attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    String(String),
}

impl AttributeValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(b) => write!(f, "{b}"),
            AttributeValue::Int(i) => write!(f, "{i}"),
            AttributeValue::Double(d) => write!(f, "{d}"),
            AttributeValue::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::String(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Double(value)
    }
}

/// Ordered attribute map. Absent values are omitted, never written as empty.
pub type Attributes = BTreeMap<String, AttributeValue>;

/// Build an [`Attributes`] map from `key => value` pairs.
#[macro_export]
macro_rules! attributes {
    () => { $crate::telemetry::span::Attributes::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut map = $crate::telemetry::span::Attributes::new();
        $(map.insert(($key).to_string(), $crate::telemetry::span::AttributeValue::from($value));)+
        map
    }};
}

// ============================================================================
// Options and status
// ============================================================================

/// Final status reported when a span ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SpanStatusCode {
    Ok,
    Error,
    Unset,
}

/// Options for starting a span.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanOptions {
    pub attributes: Attributes,

    /// Parent the span in the current trace context (default) or start a new one.
    pub inherit_context: bool,
}

impl Default for SpanOptions {
    fn default() -> Self {
        Self {
            attributes: Attributes::new(),
            inherit_context: true,
        }
    }
}

impl SpanOptions {
    pub fn with_attributes(attributes: Attributes) -> Self {
        Self {
            attributes,
            ..Default::default()
        }
    }
}

// ============================================================================
// Backend capability
// ============================================================================

/// The span capability provided by the host telemetry pipeline.
///
/// `end_span` exports the span; `discard_span` drops it without export.
pub trait SpanBackend {
    fn start_span(&self, name: &str, options: SpanOptions) -> Result<SpanId>;

    fn end_span(&self, id: &SpanId, status: Option<SpanStatusCode>) -> Result<()>;

    fn discard_span(&self, id: &SpanId) -> Result<()>;

    fn set_attributes(&self, id: &SpanId, attributes: Attributes) -> Result<()>;

    fn add_event(&self, id: &SpanId, name: &str, attributes: Attributes) -> Result<()>;

    fn record_exception(&self, id: &SpanId, message: &str, attributes: Attributes) -> Result<()>;
}

// ============================================================================
// Span handle
// ============================================================================

/// Owning handle to a started span.
pub struct Span {
    backend: Rc<dyn SpanBackend>,
    id: SpanId,
    name: String,
}

impl Span {
    pub fn id(&self) -> &SpanId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_attributes(&self, attributes: Attributes) -> Result<()> {
        self.backend.set_attributes(&self.id, attributes)
    }

    pub fn add_event(&self, name: &str, attributes: Attributes) -> Result<()> {
        self.backend.add_event(&self.id, name, attributes)
    }

    pub fn record_exception(&self, message: &str, attributes: Attributes) -> Result<()> {
        self.backend.record_exception(&self.id, message, attributes)
    }

    /// End the span gracefully. The backend exports it.
    pub fn end(self, status: Option<SpanStatusCode>) -> Result<()> {
        self.backend.end_span(&self.id, status)
    }

    /// Terminate the span immediately. It is never exported.
    pub fn discard(self) -> Result<()> {
        self.backend.discard_span(&self.id)
    }
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Span")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

// ============================================================================
// Tracer
// ============================================================================

/// Span factory shared by the trackers.
///
/// Global attributes are merged into every span's start attributes; keys set
/// by the caller win on conflict.
#[derive(Clone)]
pub struct Tracer {
    backend: Rc<dyn SpanBackend>,
    platform: Platform,
    global_attributes: Attributes,
}

impl Tracer {
    pub fn new(backend: Rc<dyn SpanBackend>, platform: Platform) -> Self {
        Self {
            backend,
            platform,
            global_attributes: Attributes::new(),
        }
    }

    pub fn with_global_attributes(mut self, attributes: Attributes) -> Self {
        self.global_attributes = attributes;
        self
    }

    pub fn platform(&self) -> Platform {
        self.platform
    }

    pub fn start_span(&self, name: &str, options: SpanOptions) -> Result<Span> {
        let mut attributes = self.global_attributes.clone();
        attributes.extend(options.attributes);

        let id = self.backend.start_span(
            name,
            SpanOptions {
                attributes,
                inherit_context: options.inherit_context,
            },
        )?;

        Ok(Span {
            backend: Rc::clone(&self.backend),
            id,
            name: name.to_string(),
        })
    }
}

impl fmt::Debug for Tracer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracer")
            .field("platform", &self.platform)
            .field("global_attributes", &self.global_attributes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::recorder::{SpanOutcome, SpanRecorder};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_span_id_generation() {
        let a = SpanId::generate();
        let b = SpanId::generate();

        assert_eq!(a.as_str().len(), 16);
        assert_ne!(a, b);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_attribute_macro_and_values() {
        let attrs = crate::attributes! {
            "screen.name" => "Home",
            "routeHasBeenSeen" => false,
            "count" => 3i64,
        };

        assert_eq!(attrs["screen.name"].as_str(), Some("Home"));
        assert_eq!(attrs["routeHasBeenSeen"].as_bool(), Some(false));
        assert_eq!(attrs["count"], AttributeValue::Int(3));
        assert_eq!(attrs["count"].to_string(), "3");
    }

    #[test]
    fn test_tracer_merges_global_attributes() {
        let recorder = Rc::new(SpanRecorder::new());
        let tracer = Tracer::new(recorder.clone(), Platform::Android).with_global_attributes(
            crate::attributes! { "app.version" => "1.2.3", "screen.name" => "global" },
        );

        let span = tracer
            .start_span(
                "Navigated",
                SpanOptions::with_attributes(crate::attributes! { "screen.name" => "Home" }),
            )
            .unwrap();
        span.end(None).unwrap();

        let recorded = recorder.get(&recorder.spans()[0].span_id).unwrap();
        assert_eq!(recorded.attributes["app.version"].as_str(), Some("1.2.3"));
        assert_eq!(recorded.attributes["screen.name"].as_str(), Some("Home"));
        assert!(recorded.inherit_context);
    }

    #[test]
    fn test_span_end_and_discard_consume_handle() {
        let recorder = Rc::new(SpanRecorder::new());
        let tracer = Tracer::new(recorder.clone(), Platform::Ios);

        let exported = tracer.start_span("a", SpanOptions::default()).unwrap();
        let dropped = tracer.start_span("b", SpanOptions::default()).unwrap();
        let exported_id = exported.id().clone();
        let dropped_id = dropped.id().clone();

        exported.end(Some(SpanStatusCode::Ok)).unwrap();
        dropped.discard().unwrap();

        assert_eq!(recorder.get(&exported_id).unwrap().outcome, SpanOutcome::Exported);
        assert_eq!(recorder.get(&dropped_id).unwrap().outcome, SpanOutcome::Discarded);
        assert_eq!(
            recorder.get(&exported_id).unwrap().status,
            Some(SpanStatusCode::Ok)
        );
    }

    #[test]
    fn test_span_handle_events_and_exceptions() {
        let recorder = Rc::new(SpanRecorder::new());
        let tracer = Tracer::new(recorder.clone(), Platform::Android);

        let span = tracer.start_span("ScreenInteractive", SpanOptions::default()).unwrap();
        let id = span.id().clone();
        span.add_event("first_frame", crate::attributes! { "frame" => 1i64 }).unwrap();
        span.record_exception("image decode failed", Attributes::new()).unwrap();
        span.end(Some(SpanStatusCode::Error)).unwrap();

        let recorded = recorder.get(&id).unwrap();
        assert_eq!(recorded.events.len(), 2);
        assert_eq!(recorded.events[0].name, "first_frame");
        assert_eq!(recorded.events[0].attributes["frame"], AttributeValue::Int(1));
        assert_eq!(recorded.events[1].name, "exception");
        assert_eq!(
            recorded.events[1].attributes["exception.message"].as_str(),
            Some("image decode failed")
        );
        assert_eq!(recorded.status, Some(SpanStatusCode::Error));
    }
}
