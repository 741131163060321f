//! Span output writers.
//!
//! Writes a [`SpanRecorder`] snapshot to a destination directory:
//! - JSON lines (one exported span per line)
//! - Human-readable text report (every span, including discarded ones)

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::attributes::keys;
use super::recorder::{RecordedSpan, SpanOutcome, SpanRecorder};

/// Output format for recorded spans
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SpanFormat {
    #[default]
    Json,
    Text,
}

impl SpanFormat {
    fn extension(&self) -> &'static str {
        match self {
            SpanFormat::Json => "jsonl",
            SpanFormat::Text => "txt",
        }
    }
}

/// Span output writer.
pub struct SpanWriter;

impl SpanWriter {
    /// Write the recording to `destination`, returning the created file path.
    pub fn write(
        recorder: &SpanRecorder,
        format: SpanFormat,
        destination: &Path,
    ) -> Result<PathBuf> {
        if !destination.exists() {
            fs::create_dir_all(destination).with_context(|| {
                format!("Failed to create span output directory {destination:?}")
            })?;
        }

        let datetime: DateTime<Local> = recorder.timestamp().into();
        let filename = format!(
            "{}_{}.{}",
            datetime.format("%Y-%m-%d_%H-%M-%S"),
            recorder.run_id(),
            format.extension()
        );
        let file_path = destination.join(filename);

        let content = match format {
            SpanFormat::Json => Self::format_json_lines(&recorder.exported())?,
            SpanFormat::Text => Self::format_human_readable(recorder),
        };

        fs::write(&file_path, content)
            .with_context(|| format!("Failed to write spans to {file_path:?}"))?;
        Ok(file_path)
    }

    /// One JSON object per line, newline-terminated for log shippers.
    pub fn format_json_lines(spans: &[RecordedSpan]) -> Result<String> {
        let mut output = String::new();
        for span in spans {
            output.push_str(&serde_json::to_string(span)?);
            output.push('\n');
        }
        Ok(output)
    }

    /// Format every recorded span as a text report.
    pub fn format_human_readable(recorder: &SpanRecorder) -> String {
        let datetime: DateTime<Local> = recorder.timestamp().into();
        let spans = recorder.spans();

        let mut output = String::new();
        output.push_str(&format!(
            "===== Screen Spans [{}] [{}] =====\n",
            datetime.format("%Y-%m-%d %H:%M:%S"),
            recorder.run_id()
        ));
        output.push_str(&format!(
            "Exported: {}  Discarded: {}  Open: {}\n\n",
            recorder.exported().len(),
            recorder.discarded().len(),
            recorder.open().len()
        ));

        if spans.is_empty() {
            output.push_str("(No spans recorded)\n\n");
        }

        for (i, span) in spans.iter().enumerate() {
            let outcome = match span.outcome {
                SpanOutcome::Open => "OPEN",
                SpanOutcome::Exported => "EXPORTED",
                SpanOutcome::Discarded => "DISCARDED",
            };
            output.push_str(&format!(
                "[{}] {} ({}) {}\n",
                i + 1,
                span.name,
                span.pulse_type().unwrap_or("-"),
                outcome
            ));
            output.push_str(&format!("  Span ID: {}\n", span.span_id));
            if let Some(screen) = span.attribute_str(keys::SCREEN_NAME) {
                output.push_str(&format!("  Screen: {screen}\n"));
            }
            for (key, value) in &span.attributes {
                if key == keys::PULSE_TYPE || key == keys::SCREEN_NAME {
                    continue;
                }
                output.push_str(&format!("  {key}: {value}\n"));
            }
            for event in &span.events {
                output.push_str(&format!("  Event: {}\n", event.name));
            }
            output.push_str(&format!("  Duration: {}ms\n\n", span.duration_ms()));
        }

        output.push_str("===== End Screen Spans =====\n");
        output
    }
}
