//! Span capability and span output.
//!
//! ## Architecture
//!
//! ```text
//! trackers ──> Tracer ──> dyn SpanBackend ──> host exporter
//!                │                  └──────> SpanRecorder (tests, CLI) ──> SpanWriter
//!                └── global attributes merged at start
//! ```

pub mod attributes;
pub mod recorder;
pub mod span;
pub mod writer;

pub use attributes::{Platform, PulseType};
pub use recorder::{RecordedSpan, SpanOutcome, SpanRecorder};
pub use span::{
    AttributeValue, Attributes, Span, SpanBackend, SpanId, SpanOptions, SpanStatusCode, Tracer,
};
pub use writer::{SpanFormat, SpanWriter};
