//! The tracing decorator around a [`MemcachedClient`].
//!
//! [`TracingMemcachedClient`] implements the same trait as the client it
//! wraps and forwards every call, so it drops into any code that consumes
//! the trait. Each operation opens a span named after the operation and
//! tagged with its key and parameters. Synchronous operations finish the
//! span before returning, recording the failure cause when the delegate
//! errors; asynchronous operations hand the span to a completion listener
//! that finishes it when the returned handle resolves, on whatever thread
//! the client resolves it from.
//!
//! Tracing is an observability side channel only: return values, errors,
//! and timeouts of the wrapped client pass through unchanged.

mod helper;
mod listener;
mod span;

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::trace::{Span, TraceContextExt, Tracer};
use opentelemetry::KeyValue;

use crate::client::{
    BulkGetFuture, CasResponse, CasValue, ConnectionObserver, GetFuture, MemcacheError,
    MemcachedClient, OperationFuture, Transcoder, Value,
};
use helper::TracingHelper;
use listener::{BulkGetCompletionListener, GetCompletionListener, OperationCompletionListener};

/// A [`MemcachedClient`] decorator that records one span per operation.
///
/// Construct one with [`TracingMemcachedClient::new`] to report through the
/// global tracer provider, or through [`TracingMemcachedClient::builder`]
/// to supply a specific tracer. With `trace_with_active_span_only` set,
/// operations invoked outside any active span are not traced at all.
#[derive(Debug)]
pub struct TracingMemcachedClient<C, T = BoxedTracer> {
    inner: C,
    helper: TracingHelper<T>,
}

impl<C: MemcachedClient> TracingMemcachedClient<C> {
    /// Wraps `inner`, reporting spans through the global tracer provider.
    pub fn new(inner: C, trace_with_active_span_only: bool) -> Self {
        Self::builder(inner)
            .with_active_span_only(trace_with_active_span_only)
            .build()
    }

    /// Starts building a traced client around `inner`.
    pub fn builder(inner: C) -> TracingMemcachedClientBuilder<C> {
        TracingMemcachedClientBuilder {
            inner,
            tracer: global::tracer(env!("CARGO_PKG_NAME")),
            trace_with_active_span_only: false,
        }
    }
}

impl<C, T> TracingMemcachedClient<C, T> {
    /// The wrapped client.
    pub fn inner(&self) -> &C {
        &self.inner
    }

    /// Unwraps the decorator, returning the wrapped client.
    pub fn into_inner(self) -> C {
        self.inner
    }
}

/// Builder for [`TracingMemcachedClient`].
#[derive(Debug)]
pub struct TracingMemcachedClientBuilder<C, T = BoxedTracer> {
    inner: C,
    tracer: T,
    trace_with_active_span_only: bool,
}

impl<C, T> TracingMemcachedClientBuilder<C, T> {
    /// Reports spans through `tracer` instead of the global provider.
    pub fn with_tracer<U>(self, tracer: U) -> TracingMemcachedClientBuilder<C, U>
    where
        U: Tracer,
        U::Span: Send + Sync + 'static,
    {
        TracingMemcachedClientBuilder {
            inner: self.inner,
            tracer,
            trace_with_active_span_only: self.trace_with_active_span_only,
        }
    }

    /// Only traces operations invoked beneath an already active span.
    pub fn with_active_span_only(mut self, enabled: bool) -> Self {
        self.trace_with_active_span_only = enabled;
        self
    }
}

impl<C, T> TracingMemcachedClientBuilder<C, T>
where
    C: MemcachedClient,
    T: Tracer,
    T::Span: Send + Sync + 'static,
{
    /// Finishes the builder.
    pub fn build(self) -> TracingMemcachedClient<C, T> {
        TracingMemcachedClient {
            inner: self.inner,
            helper: TracingHelper::new(self.tracer, self.trace_with_active_span_only),
        }
    }
}

impl<C, T> MemcachedClient for TracingMemcachedClient<C, T>
where
    C: MemcachedClient,
    T: Tracer,
    T::Span: Send + Sync + 'static,
{
    fn get(
        &self,
        key: &str,
        transcoder: Option<&dyn Transcoder>,
    ) -> Result<Option<Value>, MemcacheError> {
        let mut span = self.helper.build_span_with_key("get", key);
        span.set_attribute(KeyValue::new(
            "transcoder",
            helper::transcoder_name(transcoder),
        ));
        let (cx, _scope) = self.helper.activate(span);
        helper::finish_sync(&cx, self.inner.get(key, transcoder))
    }

    fn gets(
        &self,
        key: &str,
        transcoder: Option<&dyn Transcoder>,
    ) -> Result<Option<CasValue>, MemcacheError> {
        let mut span = self.helper.build_span_with_key("gets", key);
        span.set_attribute(KeyValue::new(
            "transcoder",
            helper::transcoder_name(transcoder),
        ));
        let (cx, _scope) = self.helper.activate(span);
        helper::finish_sync(&cx, self.inner.gets(key, transcoder))
    }

    fn get_and_touch(
        &self,
        key: &str,
        expiration: u32,
        transcoder: Option<&dyn Transcoder>,
    ) -> Result<Option<CasValue>, MemcacheError> {
        let mut span = self.helper.build_span_with_key("get_and_touch", key);
        span.set_attribute(KeyValue::new("expiration", i64::from(expiration)));
        span.set_attribute(KeyValue::new(
            "transcoder",
            helper::transcoder_name(transcoder),
        ));
        let (cx, _scope) = self.helper.activate(span);
        helper::finish_sync(&cx, self.inner.get_and_touch(key, expiration, transcoder))
    }

    fn get_bulk(
        &self,
        keys: &[String],
        transcoder: Option<&dyn Transcoder>,
    ) -> Result<HashMap<String, Value>, MemcacheError> {
        let mut span = self.helper.build_span("get_bulk");
        span.set_attribute(KeyValue::new("keys", helper::join_keys(keys)));
        span.set_attribute(KeyValue::new(
            "transcoder",
            helper::transcoder_name(transcoder),
        ));
        let (cx, _scope) = self.helper.activate(span);
        helper::finish_sync(&cx, self.inner.get_bulk(keys, transcoder))
    }

    fn cas(
        &self,
        key: &str,
        cas_id: u64,
        value: Value,
        expiration: Option<u32>,
        transcoder: Option<&dyn Transcoder>,
    ) -> Result<CasResponse, MemcacheError> {
        let mut span = self.helper.build_span_with_key("cas", key);
        span.set_attribute(KeyValue::new("casId", cas_id as i64));
        span.set_attribute(KeyValue::new("value", value.to_string()));
        span.set_attribute(KeyValue::new("expiration", helper::nullable(expiration)));
        span.set_attribute(KeyValue::new(
            "transcoder",
            helper::transcoder_name(transcoder),
        ));
        let (cx, _scope) = self.helper.activate(span);
        helper::finish_sync(
            &cx,
            self.inner.cas(key, cas_id, value, expiration, transcoder),
        )
    }

    fn incr(
        &self,
        key: &str,
        by: u64,
        default: Option<u64>,
        expiration: Option<u32>,
    ) -> Result<u64, MemcacheError> {
        let mut span = self.helper.build_span_with_key("incr", key);
        span.set_attribute(KeyValue::new("by", by as i64));
        span.set_attribute(KeyValue::new("def", helper::nullable(default)));
        span.set_attribute(KeyValue::new("expiration", helper::nullable(expiration)));
        let (cx, _scope) = self.helper.activate(span);
        helper::finish_sync(&cx, self.inner.incr(key, by, default, expiration))
    }

    fn decr(
        &self,
        key: &str,
        by: u64,
        default: Option<u64>,
        expiration: Option<u32>,
    ) -> Result<u64, MemcacheError> {
        let mut span = self.helper.build_span_with_key("decr", key);
        span.set_attribute(KeyValue::new("by", by as i64));
        span.set_attribute(KeyValue::new("def", helper::nullable(default)));
        span.set_attribute(KeyValue::new("expiration", helper::nullable(expiration)));
        let (cx, _scope) = self.helper.activate(span);
        helper::finish_sync(&cx, self.inner.decr(key, by, default, expiration))
    }

    fn get_versions(&self) -> Result<HashMap<SocketAddr, String>, MemcacheError> {
        let span = self.helper.build_span("get_versions");
        let (cx, _scope) = self.helper.activate(span);
        helper::finish_sync(&cx, self.inner.get_versions())
    }

    fn get_stats(
        &self,
        argument: Option<&str>,
    ) -> Result<HashMap<SocketAddr, HashMap<String, String>>, MemcacheError> {
        let mut span = self.helper.build_span("get_stats");
        span.set_attribute(KeyValue::new("arg", helper::nullable(argument)));
        let (cx, _scope) = self.helper.activate(span);
        helper::finish_sync(&cx, self.inner.get_stats(argument))
    }

    fn list_sasl_mechanisms(&self) -> Result<HashSet<String>, MemcacheError> {
        let span = self.helper.build_span("list_sasl_mechanisms");
        let (cx, _scope) = self.helper.activate(span);
        helper::finish_sync(&cx, self.inner.list_sasl_mechanisms())
    }

    fn shutdown(&self, timeout: Option<Duration>) -> Result<bool, MemcacheError> {
        let mut span = self.helper.build_span("shutdown");
        span.set_attribute(KeyValue::new("timeout", helper::nullable_debug(timeout)));
        let (cx, _scope) = self.helper.activate(span);
        helper::finish_sync(&cx, self.inner.shutdown(timeout))
    }

    fn wait_for_queues(&self, timeout: Duration) -> bool {
        let mut span = self.helper.build_span("wait_for_queues");
        span.set_attribute(KeyValue::new("timeout", format!("{timeout:?}")));
        let (cx, _scope) = self.helper.activate(span);
        let drained = self.inner.wait_for_queues(timeout);
        cx.span().end();
        drained
    }

    fn async_get(&self, key: &str, transcoder: Option<&dyn Transcoder>) -> GetFuture {
        let mut span = self.helper.build_span_with_key("async_get", key);
        span.set_attribute(KeyValue::new(
            "transcoder",
            helper::transcoder_name(transcoder),
        ));
        let (cx, _scope) = self.helper.activate(span);
        let future = self.inner.async_get(key, transcoder);
        future.add_listener(GetCompletionListener::new(cx));
        future
    }

    fn async_gets(
        &self,
        key: &str,
        transcoder: Option<&dyn Transcoder>,
    ) -> OperationFuture<Option<CasValue>> {
        let mut span = self.helper.build_span_with_key("async_gets", key);
        span.set_attribute(KeyValue::new(
            "transcoder",
            helper::transcoder_name(transcoder),
        ));
        let (cx, _scope) = self.helper.activate(span);
        let future = self.inner.async_gets(key, transcoder);
        future.add_listener(OperationCompletionListener::new(cx));
        future
    }

    fn async_get_and_touch(
        &self,
        key: &str,
        expiration: u32,
        transcoder: Option<&dyn Transcoder>,
    ) -> OperationFuture<Option<CasValue>> {
        let mut span = self.helper.build_span_with_key("async_get_and_touch", key);
        span.set_attribute(KeyValue::new("expiration", i64::from(expiration)));
        span.set_attribute(KeyValue::new(
            "transcoder",
            helper::transcoder_name(transcoder),
        ));
        let (cx, _scope) = self.helper.activate(span);
        let future = self.inner.async_get_and_touch(key, expiration, transcoder);
        future.add_listener(OperationCompletionListener::new(cx));
        future
    }

    fn async_get_bulk(
        &self,
        keys: &[String],
        transcoder: Option<&dyn Transcoder>,
    ) -> BulkGetFuture {
        let mut span = self.helper.build_span("async_get_bulk");
        span.set_attribute(KeyValue::new("keys", helper::join_keys(keys)));
        span.set_attribute(KeyValue::new(
            "transcoder",
            helper::transcoder_name(transcoder),
        ));
        let (cx, _scope) = self.helper.activate(span);
        let future = self.inner.async_get_bulk(keys, transcoder);
        future.add_listener(BulkGetCompletionListener::new(cx));
        future
    }

    fn set(
        &self,
        key: &str,
        expiration: u32,
        value: Value,
        transcoder: Option<&dyn Transcoder>,
    ) -> OperationFuture<bool> {
        let mut span = self.helper.build_span_with_key("set", key);
        span.set_attribute(KeyValue::new("object", value.to_string()));
        span.set_attribute(KeyValue::new("expiration", i64::from(expiration)));
        span.set_attribute(KeyValue::new(
            "transcoder",
            helper::transcoder_name(transcoder),
        ));
        let (cx, _scope) = self.helper.activate(span);
        let future = self.inner.set(key, expiration, value, transcoder);
        future.add_listener(OperationCompletionListener::new(cx));
        future
    }

    fn add(
        &self,
        key: &str,
        expiration: u32,
        value: Value,
        transcoder: Option<&dyn Transcoder>,
    ) -> OperationFuture<bool> {
        let mut span = self.helper.build_span_with_key("add", key);
        span.set_attribute(KeyValue::new("object", value.to_string()));
        span.set_attribute(KeyValue::new("expiration", i64::from(expiration)));
        span.set_attribute(KeyValue::new(
            "transcoder",
            helper::transcoder_name(transcoder),
        ));
        let (cx, _scope) = self.helper.activate(span);
        let future = self.inner.add(key, expiration, value, transcoder);
        future.add_listener(OperationCompletionListener::new(cx));
        future
    }

    fn replace(
        &self,
        key: &str,
        expiration: u32,
        value: Value,
        transcoder: Option<&dyn Transcoder>,
    ) -> OperationFuture<bool> {
        let mut span = self.helper.build_span_with_key("replace", key);
        span.set_attribute(KeyValue::new("object", value.to_string()));
        span.set_attribute(KeyValue::new("expiration", i64::from(expiration)));
        span.set_attribute(KeyValue::new(
            "transcoder",
            helper::transcoder_name(transcoder),
        ));
        let (cx, _scope) = self.helper.activate(span);
        let future = self.inner.replace(key, expiration, value, transcoder);
        future.add_listener(OperationCompletionListener::new(cx));
        future
    }

    fn append(
        &self,
        cas_id: Option<u64>,
        key: &str,
        value: Value,
        transcoder: Option<&dyn Transcoder>,
    ) -> OperationFuture<bool> {
        let mut span = self.helper.build_span_with_key("append", key);
        span.set_attribute(KeyValue::new("cas", helper::nullable(cas_id)));
        span.set_attribute(KeyValue::new("value", value.to_string()));
        span.set_attribute(KeyValue::new(
            "transcoder",
            helper::transcoder_name(transcoder),
        ));
        let (cx, _scope) = self.helper.activate(span);
        let future = self.inner.append(cas_id, key, value, transcoder);
        future.add_listener(OperationCompletionListener::new(cx));
        future
    }

    fn prepend(
        &self,
        cas_id: Option<u64>,
        key: &str,
        value: Value,
        transcoder: Option<&dyn Transcoder>,
    ) -> OperationFuture<bool> {
        let mut span = self.helper.build_span_with_key("prepend", key);
        span.set_attribute(KeyValue::new("cas", helper::nullable(cas_id)));
        span.set_attribute(KeyValue::new("value", value.to_string()));
        span.set_attribute(KeyValue::new(
            "transcoder",
            helper::transcoder_name(transcoder),
        ));
        let (cx, _scope) = self.helper.activate(span);
        let future = self.inner.prepend(cas_id, key, value, transcoder);
        future.add_listener(OperationCompletionListener::new(cx));
        future
    }

    fn async_cas(
        &self,
        key: &str,
        cas_id: u64,
        value: Value,
        expiration: Option<u32>,
        transcoder: Option<&dyn Transcoder>,
    ) -> OperationFuture<CasResponse> {
        let mut span = self.helper.build_span_with_key("async_cas", key);
        span.set_attribute(KeyValue::new("casId", cas_id as i64));
        span.set_attribute(KeyValue::new("value", value.to_string()));
        span.set_attribute(KeyValue::new("expiration", helper::nullable(expiration)));
        span.set_attribute(KeyValue::new(
            "transcoder",
            helper::transcoder_name(transcoder),
        ));
        let (cx, _scope) = self.helper.activate(span);
        let future = self
            .inner
            .async_cas(key, cas_id, value, expiration, transcoder);
        future.add_listener(OperationCompletionListener::new(cx));
        future
    }

    fn async_incr(
        &self,
        key: &str,
        by: u64,
        default: Option<u64>,
        expiration: Option<u32>,
    ) -> OperationFuture<u64> {
        let mut span = self.helper.build_span_with_key("async_incr", key);
        span.set_attribute(KeyValue::new("by", by as i64));
        span.set_attribute(KeyValue::new("def", helper::nullable(default)));
        span.set_attribute(KeyValue::new("expiration", helper::nullable(expiration)));
        let (cx, _scope) = self.helper.activate(span);
        let future = self.inner.async_incr(key, by, default, expiration);
        future.add_listener(OperationCompletionListener::new(cx));
        future
    }

    fn async_decr(
        &self,
        key: &str,
        by: u64,
        default: Option<u64>,
        expiration: Option<u32>,
    ) -> OperationFuture<u64> {
        let mut span = self.helper.build_span_with_key("async_decr", key);
        span.set_attribute(KeyValue::new("by", by as i64));
        span.set_attribute(KeyValue::new("def", helper::nullable(default)));
        span.set_attribute(KeyValue::new("expiration", helper::nullable(expiration)));
        let (cx, _scope) = self.helper.activate(span);
        let future = self.inner.async_decr(key, by, default, expiration);
        future.add_listener(OperationCompletionListener::new(cx));
        future
    }

    fn touch(
        &self,
        key: &str,
        expiration: u32,
        transcoder: Option<&dyn Transcoder>,
    ) -> OperationFuture<bool> {
        let mut span = self.helper.build_span_with_key("touch", key);
        span.set_attribute(KeyValue::new("expiration", i64::from(expiration)));
        span.set_attribute(KeyValue::new(
            "transcoder",
            helper::transcoder_name(transcoder),
        ));
        let (cx, _scope) = self.helper.activate(span);
        let future = self.inner.touch(key, expiration, transcoder);
        future.add_listener(OperationCompletionListener::new(cx));
        future
    }

    fn delete(&self, key: &str, cas_id: Option<u64>) -> OperationFuture<bool> {
        let mut span = self.helper.build_span_with_key("delete", key);
        span.set_attribute(KeyValue::new("cas", helper::nullable(cas_id)));
        let (cx, _scope) = self.helper.activate(span);
        let future = self.inner.delete(key, cas_id);
        future.add_listener(OperationCompletionListener::new(cx));
        future
    }

    fn flush(&self, delay: Option<u32>) -> OperationFuture<bool> {
        let mut span = self.helper.build_span("flush");
        span.set_attribute(KeyValue::new("delay", helper::nullable(delay)));
        let (cx, _scope) = self.helper.activate(span);
        let future = self.inner.flush(delay);
        future.add_listener(OperationCompletionListener::new(cx));
        future
    }

    fn available_servers(&self) -> Vec<SocketAddr> {
        self.inner.available_servers()
    }

    fn unavailable_servers(&self) -> Vec<SocketAddr> {
        self.inner.unavailable_servers()
    }

    fn operation_timeout(&self) -> Duration {
        self.inner.operation_timeout()
    }

    fn default_transcoder(&self) -> Arc<dyn Transcoder> {
        self.inner.default_transcoder()
    }

    fn add_observer(&self, observer: Arc<dyn ConnectionObserver>) -> bool {
        self.inner.add_observer(observer)
    }

    fn remove_observer(&self, observer: &Arc<dyn ConnectionObserver>) -> bool {
        self.inner.remove_observer(observer)
    }
}
