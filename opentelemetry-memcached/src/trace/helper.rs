use std::fmt::{Debug, Display};

use opentelemetry::trace::{SpanKind, SpanRef, Status, TraceContextExt, Tracer};
use opentelemetry::{Context, ContextGuard, KeyValue};

use super::span::TracedSpan;
use crate::client::{MemcacheError, OperationStatus, Transcoder};

/// Value of the `component` attribute on every span.
pub(crate) const COMPONENT_NAME: &str = "rust-memcached";

/// Value of the `db.type` attribute on every span.
pub(crate) const DB_TYPE: &str = "memcached";

/// Builds, activates, and finishes the spans of the traced client.
///
/// Holds the tracer and the `trace_with_active_span_only` policy flag; both
/// are fixed at construction.
#[derive(Debug)]
pub(crate) struct TracingHelper<T> {
    tracer: T,
    trace_with_active_span_only: bool,
}

impl<T> TracingHelper<T>
where
    T: Tracer,
    T::Span: Send + Sync + 'static,
{
    pub(crate) fn new(tracer: T, trace_with_active_span_only: bool) -> Self {
        TracingHelper {
            tracer,
            trace_with_active_span_only,
        }
    }

    pub(crate) fn build_span(&self, operation: &'static str) -> TracedSpan<T::Span> {
        self.build(operation, None)
    }

    pub(crate) fn build_span_with_key(
        &self,
        operation: &'static str,
        key: &str,
    ) -> TracedSpan<T::Span> {
        self.build(operation, Some(key))
    }

    fn build(&self, operation: &'static str, key: Option<&str>) -> TracedSpan<T::Span> {
        if self.trace_with_active_span_only && !Context::map_current(|cx| cx.has_active_span()) {
            return TracedSpan::disabled();
        }

        let mut attributes = vec![
            KeyValue::new("component", COMPONENT_NAME),
            KeyValue::new("db.type", DB_TYPE),
        ];
        if let Some(key) = key {
            attributes.push(KeyValue::new("key", key.to_owned()));
        }

        let span = self
            .tracer
            .span_builder(operation)
            .with_kind(SpanKind::Client)
            .with_attributes(attributes)
            .start(&self.tracer);
        TracedSpan::Recording(span)
    }

    /// Moves the span into a [`Context`] and makes it current for the
    /// synchronous portion of the call.
    ///
    /// The returned context carries the span to whoever must finish it (the
    /// calling method, or a completion listener on another thread). The
    /// guard deactivates the span when dropped, on every exit path. A
    /// disabled span is never activated, so a suppressed operation does not
    /// make the ambient context look traced.
    pub(crate) fn activate(
        &self,
        span: TracedSpan<T::Span>,
    ) -> (Context, Option<ContextGuard>) {
        let enabled = span.is_enabled();
        let cx = Context::current_with_span(span);
        let guard = enabled.then(|| cx.clone().attach());
        (cx, guard)
    }
}

/// Writes the terminal status tags and finishes the span.
///
/// `status.message` is only set when the status carries a message; absent
/// optionals elsewhere become the literal string `"null"`, never an omitted
/// tag.
pub(crate) fn apply_status(span: &SpanRef<'_>, status: &OperationStatus) {
    span.set_attribute(KeyValue::new("status.code", nullable(status.code())));
    if let Some(message) = status.message() {
        span.set_attribute(KeyValue::new("status.message", message.to_owned()));
    }
    span.set_attribute(KeyValue::new("status.success", status.is_success()));
    span.end();
}

/// Records a failure cause on the span without finishing it; finishing
/// stays with the caller so it happens on every exit path.
pub(crate) fn mark_error(span: &SpanRef<'_>, cause: &MemcacheError) {
    span.set_attribute(KeyValue::new("error", true));
    span.set_status(Status::error(cause.to_string()));
    span.add_event(
        "error",
        vec![KeyValue::new("error.object", cause.to_string())],
    );
}

/// Finishes a synchronous operation's span, recording the cause first when
/// the delegate failed, and hands the result back unchanged.
pub(crate) fn finish_sync<R>(
    cx: &Context,
    result: Result<R, MemcacheError>,
) -> Result<R, MemcacheError> {
    let span = cx.span();
    if let Err(cause) = &result {
        mark_error(&span, cause);
    }
    span.end();
    result
}

pub(crate) fn nullable<T: Display>(value: Option<T>) -> String {
    match value {
        Some(value) => value.to_string(),
        None => "null".to_owned(),
    }
}

pub(crate) fn nullable_debug<T: Debug>(value: Option<T>) -> String {
    match value {
        Some(value) => format!("{value:?}"),
        None => "null".to_owned(),
    }
}

pub(crate) fn transcoder_name(transcoder: Option<&dyn Transcoder>) -> String {
    nullable(transcoder.map(Transcoder::name))
}

pub(crate) fn join_keys(keys: &[String]) -> String {
    keys.join(", ")
}
