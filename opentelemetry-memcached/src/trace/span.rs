use std::borrow::Cow;
use std::time::SystemTime;

use opentelemetry::trace::{Span, SpanContext, Status};
use opentelemetry::KeyValue;

/// A recording span, or a placeholder that discards everything.
///
/// The placeholder stands in when the client is configured to trace only
/// beneath an active parent span and no parent exists, so call sites tag
/// and finish spans unconditionally instead of branching on whether tracing
/// is suppressed.
#[derive(Debug)]
pub(crate) enum TracedSpan<S> {
    Recording(S),
    Disabled(SpanContext),
}

impl<S> TracedSpan<S> {
    pub(crate) fn disabled() -> Self {
        TracedSpan::Disabled(SpanContext::NONE)
    }

    /// Whether this is a real span, as opposed to the discarding
    /// placeholder. Unlike [`Span::is_recording`] this stays `true` for a
    /// real span after it ends.
    pub(crate) fn is_enabled(&self) -> bool {
        matches!(self, TracedSpan::Recording(_))
    }
}

impl<S: Span> Span for TracedSpan<S> {
    fn add_event_with_timestamp<T>(
        &mut self,
        name: T,
        timestamp: SystemTime,
        attributes: Vec<KeyValue>,
    ) where
        T: Into<Cow<'static, str>>,
    {
        if let TracedSpan::Recording(span) = self {
            span.add_event_with_timestamp(name, timestamp, attributes);
        }
    }

    fn span_context(&self) -> &SpanContext {
        match self {
            TracedSpan::Recording(span) => span.span_context(),
            TracedSpan::Disabled(span_context) => span_context,
        }
    }

    fn is_recording(&self) -> bool {
        match self {
            TracedSpan::Recording(span) => span.is_recording(),
            TracedSpan::Disabled(_) => false,
        }
    }

    fn set_attribute(&mut self, attribute: KeyValue) {
        if let TracedSpan::Recording(span) = self {
            span.set_attribute(attribute);
        }
    }

    fn set_status(&mut self, status: Status) {
        if let TracedSpan::Recording(span) = self {
            span.set_status(status);
        }
    }

    fn update_name<T>(&mut self, new_name: T)
    where
        T: Into<Cow<'static, str>>,
    {
        if let TracedSpan::Recording(span) = self {
            span.update_name(new_name);
        }
    }

    fn add_link(&mut self, span_context: SpanContext, attributes: Vec<KeyValue>) {
        if let TracedSpan::Recording(span) = self {
            span.add_link(span_context, attributes);
        }
    }

    fn end_with_timestamp(&mut self, timestamp: SystemTime) {
        if let TracedSpan::Recording(span) = self {
            span.end_with_timestamp(timestamp);
        }
    }
}
