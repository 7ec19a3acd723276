//! Completion listeners that finish spans for asynchronous operations.
//!
//! Each listener is armed on exactly one result handle and holds the
//! [`Context`] carrying the operation's span. When the handle resolves —
//! on whatever thread the client completes it from — the listener writes
//! the terminal status tags and finishes the span. Firing consumes the
//! listener, so a fired listener is inert by construction.

use std::collections::HashMap;

use opentelemetry::trace::TraceContextExt;
use opentelemetry::Context;

use super::helper;
use crate::client::{CompletionListener, OperationOutcome, Value};

/// Finishes the span of a single-key retrieval.
#[derive(Debug)]
pub(crate) struct GetCompletionListener {
    cx: Context,
}

impl GetCompletionListener {
    pub(crate) fn new(cx: Context) -> Self {
        GetCompletionListener { cx }
    }
}

impl CompletionListener<Option<Value>> for GetCompletionListener {
    fn on_complete(self: Box<Self>, outcome: &OperationOutcome<Option<Value>>) {
        helper::apply_status(&self.cx.span(), outcome.status());
    }
}

/// Finishes the span of a bulk retrieval.
///
/// Only the aggregate batch status is recorded; per-key partial failures
/// inside the batch are not surfaced as separate tags.
#[derive(Debug)]
pub(crate) struct BulkGetCompletionListener {
    cx: Context,
}

impl BulkGetCompletionListener {
    pub(crate) fn new(cx: Context) -> Self {
        BulkGetCompletionListener { cx }
    }
}

impl CompletionListener<HashMap<String, Value>> for BulkGetCompletionListener {
    fn on_complete(self: Box<Self>, outcome: &OperationOutcome<HashMap<String, Value>>) {
        helper::apply_status(&self.cx.span(), outcome.status());
    }
}

/// Finishes the span of any other asynchronous operation: mutations,
/// arithmetic, touch, delete, flush, and the CAS-read family.
#[derive(Debug)]
pub(crate) struct OperationCompletionListener {
    cx: Context,
}

impl OperationCompletionListener {
    pub(crate) fn new(cx: Context) -> Self {
        OperationCompletionListener { cx }
    }
}

impl<T> CompletionListener<T> for OperationCompletionListener {
    fn on_complete(self: Box<Self>, outcome: &OperationOutcome<T>) {
        helper::apply_status(&self.cx.span(), outcome.status());
    }
}
