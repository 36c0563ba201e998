//! Observability port for emitting spans around harness calls.

/// A started span. Attributes may be added until [`Span::end`] is called.
pub trait Span: Send {
    /// Attaches or overwrites an attribute on the span.
    fn set_attribute(&mut self, key: &str, value: String);

    /// Finishes the span.
    fn end(self: Box<Self>);
}

/// Starts spans for an external observability collaborator.
///
/// The harness never depends on a tracer to function; the default context
/// wires a no-op implementation.
pub trait Tracer: Send + Sync {
    /// Begins a span with the given name and initial attributes.
    fn begin_span(&self, name: &str, attributes: &[(&str, String)]) -> Box<dyn Span>;
}

impl<T: Tracer + ?Sized> Tracer for std::sync::Arc<T> {
    fn begin_span(&self, name: &str, attributes: &[(&str, String)]) -> Box<dyn Span> {
        (**self).begin_span(name, attributes)
    }
}
