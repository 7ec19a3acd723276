//! # OpenTelemetry Memcached Instrumentation
//!
//! A tracing decorator for memcached clients. [`TracingMemcachedClient`]
//! wraps any implementation of the [`MemcachedClient`] trait and records one
//! `SpanKind::Client` span per operation — name, key(s), operation
//! parameters, and outcome status — without changing what the wrapped client
//! returns, throws, or times out on.
//!
//! Synchronous operations finish their span before returning, recording the
//! failure cause if the client errored. Asynchronous operations return the
//! client's [`OperationFuture`] handle unchanged; a one-shot completion
//! listener finishes the span when the handle resolves, on whatever thread
//! the client resolves it from.
//!
//! ## Getting Started
//!
//! ```
//! use opentelemetry_memcached::{MemcachedClient, TracingMemcachedClient};
//!
//! // Wraps any client implementation. The decorator implements the same
//! // trait, so existing call sites keep working.
//! fn instrument<C: MemcachedClient>(client: C) -> impl MemcachedClient {
//!     TracingMemcachedClient::new(client, false)
//! }
//! ```
//!
//! Reporting through a specific tracer, and only beneath an active span:
//!
//! ```
//! use opentelemetry::trace::TracerProvider as _;
//! use opentelemetry_memcached::{MemcachedClient, TracingMemcachedClient};
//! use opentelemetry_sdk::trace::SdkTracerProvider;
//!
//! fn instrument<C: MemcachedClient>(
//!     client: C,
//!     provider: &SdkTracerProvider,
//! ) -> impl MemcachedClient {
//!     TracingMemcachedClient::builder(client)
//!         .with_tracer(provider.tracer("memcached"))
//!         .with_active_span_only(true)
//!         .build()
//! }
//! ```
//!
//! [`OperationFuture`]: client::OperationFuture
#![warn(
    future_incompatible,
    missing_debug_implementations,
    missing_docs,
    nonstandard_style,
    rust_2018_idioms,
    unreachable_pub,
    unused
)]
#![cfg_attr(docsrs, feature(doc_cfg), deny(rustdoc::broken_intra_doc_links))]
#![doc(
    html_logo_url = "https://raw.githubusercontent.com/open-telemetry/opentelemetry-rust/main/assets/logo.svg"
)]

pub mod client;
pub mod trace;

pub use client::MemcachedClient;
pub use trace::{TracingMemcachedClient, TracingMemcachedClientBuilder};
