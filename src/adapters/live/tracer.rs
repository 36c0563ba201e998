//! Tracer adapters that report spans through `tracing`, or drop them.

use std::time::Instant;

use crate::ports::tracer::{Span, Tracer};

/// Tracer that emits one `tracing` event per finished span.
pub struct LogTracer;

struct LogSpan {
    name: String,
    attributes: Vec<(String, String)>,
    started: Instant,
}

impl Span for LogSpan {
    fn set_attribute(&mut self, key: &str, value: String) {
        if let Some(slot) = self.attributes.iter_mut().find(|(k, _)| k == key) {
            slot.1 = value;
        } else {
            self.attributes.push((key.to_string(), value));
        }
    }

    fn end(self: Box<Self>) {
        let elapsed_ms = self.started.elapsed().as_millis();
        tracing::debug!(
            target: "scenario_harness::span",
            span = %self.name,
            attributes = ?self.attributes,
            elapsed_ms,
            "span finished"
        );
    }
}

impl Tracer for LogTracer {
    fn begin_span(&self, name: &str, attributes: &[(&str, String)]) -> Box<dyn Span> {
        Box::new(LogSpan {
            name: name.to_string(),
            attributes: attributes.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect(),
            started: Instant::now(),
        })
    }
}

/// Tracer that discards every span.
pub struct NoopTracer;

struct NoopSpan;

impl Span for NoopSpan {
    fn set_attribute(&mut self, _key: &str, _value: String) {}

    fn end(self: Box<Self>) {}
}

impl Tracer for NoopTracer {
    fn begin_span(&self, _name: &str, _attributes: &[(&str, String)]) -> Box<dyn Span> {
        Box::new(NoopSpan)
    }
}
