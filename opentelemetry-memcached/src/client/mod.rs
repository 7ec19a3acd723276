//! The client-side contract this crate instruments.
//!
//! A memcached client is consumed through the [`MemcachedClient`] trait:
//! synchronous operations block and return a [`Result`], asynchronous
//! operations return an [`OperationFuture`] handle that resolves from the
//! client's own worker threads. The tracing decorator implements the same
//! trait over any implementation of it, which makes it a drop-in
//! replacement for the undecorated client.
//!
//! Protocol, connection management, and key distribution are entirely the
//! implementation's business; nothing in this module prescribes how
//! operations reach a server.

mod error;
mod future;
mod types;

pub use error::MemcacheError;
pub use future::{
    BulkGetFuture, CompletionListener, GetFuture, OperationCompleter, OperationFuture,
    OperationOutcome,
};
pub use types::{CasResponse, CasValue, OperationStatus, StatusCode, Transcoder, Value};

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

/// Observer of connection-level lifecycle events.
///
/// Registration passes through the tracing decorator untraced.
pub trait ConnectionObserver: Send + Sync {
    /// A connection to `address` was (re)established.
    fn connection_established(&self, address: SocketAddr, reconnect_count: u32);

    /// The connection to `address` was lost.
    fn connection_lost(&self, address: SocketAddr);
}

/// The full operation surface of a memcached client.
///
/// Parameter-variant overloads of the classic client APIs collapse into
/// single methods here: optional parameters are `Option`s, and expiration
/// values follow the memcached convention (seconds up to 30 days, a unix
/// timestamp beyond that, `0` for no expiry).
pub trait MemcachedClient {
    // Synchronous operations. These block the calling thread until the
    // client's operation timeout elapses or the server answers.

    /// Retrieves the value stored under `key`.
    fn get(
        &self,
        key: &str,
        transcoder: Option<&dyn Transcoder>,
    ) -> Result<Option<Value>, MemcacheError>;

    /// Retrieves the value stored under `key` together with its CAS id.
    fn gets(
        &self,
        key: &str,
        transcoder: Option<&dyn Transcoder>,
    ) -> Result<Option<CasValue>, MemcacheError>;

    /// Retrieves the value stored under `key` and resets its expiration.
    fn get_and_touch(
        &self,
        key: &str,
        expiration: u32,
        transcoder: Option<&dyn Transcoder>,
    ) -> Result<Option<CasValue>, MemcacheError>;

    /// Retrieves the values stored under `keys` in one round trip.
    ///
    /// Missing keys are simply absent from the result map.
    fn get_bulk(
        &self,
        keys: &[String],
        transcoder: Option<&dyn Transcoder>,
    ) -> Result<HashMap<String, Value>, MemcacheError>;

    /// Stores `value` under `key` only if its CAS id still matches `cas_id`.
    fn cas(
        &self,
        key: &str,
        cas_id: u64,
        value: Value,
        expiration: Option<u32>,
        transcoder: Option<&dyn Transcoder>,
    ) -> Result<CasResponse, MemcacheError>;

    /// Increments the counter stored under `key` by `by`.
    ///
    /// When the key is missing and `default` is given, the counter is
    /// seeded with the default instead.
    fn incr(
        &self,
        key: &str,
        by: u64,
        default: Option<u64>,
        expiration: Option<u32>,
    ) -> Result<u64, MemcacheError>;

    /// Decrements the counter stored under `key` by `by`.
    fn decr(
        &self,
        key: &str,
        by: u64,
        default: Option<u64>,
        expiration: Option<u32>,
    ) -> Result<u64, MemcacheError>;

    /// Returns the server version string per connected node.
    fn get_versions(&self) -> Result<HashMap<SocketAddr, String>, MemcacheError>;

    /// Returns server statistics per connected node, optionally restricted
    /// to the stats group named by `argument`.
    fn get_stats(
        &self,
        argument: Option<&str>,
    ) -> Result<HashMap<SocketAddr, HashMap<String, String>>, MemcacheError>;

    /// Lists the SASL mechanisms the servers support.
    fn list_sasl_mechanisms(&self) -> Result<HashSet<String>, MemcacheError>;

    /// Shuts the client down, waiting up to `timeout` for queued operations
    /// when one is given. Returns whether the queues drained in time.
    fn shutdown(&self, timeout: Option<Duration>) -> Result<bool, MemcacheError>;

    /// Waits up to `timeout` for all queued operations to drain.
    fn wait_for_queues(&self, timeout: Duration) -> bool;

    // Asynchronous operations. These enqueue work and return immediately;
    // the handle resolves from the client's worker threads.

    /// Asynchronously retrieves the value stored under `key`.
    fn async_get(&self, key: &str, transcoder: Option<&dyn Transcoder>) -> GetFuture;

    /// Asynchronously retrieves the value under `key` with its CAS id.
    fn async_gets(
        &self,
        key: &str,
        transcoder: Option<&dyn Transcoder>,
    ) -> OperationFuture<Option<CasValue>>;

    /// Asynchronously retrieves the value under `key` and resets its
    /// expiration.
    fn async_get_and_touch(
        &self,
        key: &str,
        expiration: u32,
        transcoder: Option<&dyn Transcoder>,
    ) -> OperationFuture<Option<CasValue>>;

    /// Asynchronously retrieves the values stored under `keys`.
    fn async_get_bulk(
        &self,
        keys: &[String],
        transcoder: Option<&dyn Transcoder>,
    ) -> BulkGetFuture;

    /// Stores `value` under `key` unconditionally.
    fn set(
        &self,
        key: &str,
        expiration: u32,
        value: Value,
        transcoder: Option<&dyn Transcoder>,
    ) -> OperationFuture<bool>;

    /// Stores `value` under `key` only if the key does not exist yet.
    fn add(
        &self,
        key: &str,
        expiration: u32,
        value: Value,
        transcoder: Option<&dyn Transcoder>,
    ) -> OperationFuture<bool>;

    /// Stores `value` under `key` only if the key already exists.
    fn replace(
        &self,
        key: &str,
        expiration: u32,
        value: Value,
        transcoder: Option<&dyn Transcoder>,
    ) -> OperationFuture<bool>;

    /// Appends `value` to the existing value under `key`, optionally only
    /// when the CAS id still matches.
    fn append(
        &self,
        cas_id: Option<u64>,
        key: &str,
        value: Value,
        transcoder: Option<&dyn Transcoder>,
    ) -> OperationFuture<bool>;

    /// Prepends `value` to the existing value under `key`, optionally only
    /// when the CAS id still matches.
    fn prepend(
        &self,
        cas_id: Option<u64>,
        key: &str,
        value: Value,
        transcoder: Option<&dyn Transcoder>,
    ) -> OperationFuture<bool>;

    /// Asynchronous compare-and-swap of the value under `key`.
    fn async_cas(
        &self,
        key: &str,
        cas_id: u64,
        value: Value,
        expiration: Option<u32>,
        transcoder: Option<&dyn Transcoder>,
    ) -> OperationFuture<CasResponse>;

    /// Asynchronously increments the counter stored under `key`.
    fn async_incr(
        &self,
        key: &str,
        by: u64,
        default: Option<u64>,
        expiration: Option<u32>,
    ) -> OperationFuture<u64>;

    /// Asynchronously decrements the counter stored under `key`.
    fn async_decr(
        &self,
        key: &str,
        by: u64,
        default: Option<u64>,
        expiration: Option<u32>,
    ) -> OperationFuture<u64>;

    /// Resets the expiration of the value stored under `key`.
    fn touch(
        &self,
        key: &str,
        expiration: u32,
        transcoder: Option<&dyn Transcoder>,
    ) -> OperationFuture<bool>;

    /// Deletes the value stored under `key`, optionally only when the CAS
    /// id still matches.
    fn delete(&self, key: &str, cas_id: Option<u64>) -> OperationFuture<bool>;

    /// Flushes all cache contents, after `delay` when one is given.
    fn flush(&self, delay: Option<u32>) -> OperationFuture<bool>;

    // Topology and configuration access. The tracing decorator forwards
    // these without creating spans.

    /// The addresses of currently available servers.
    fn available_servers(&self) -> Vec<SocketAddr>;

    /// The addresses of currently unavailable servers.
    fn unavailable_servers(&self) -> Vec<SocketAddr>;

    /// The client's per-operation timeout.
    fn operation_timeout(&self) -> Duration;

    /// The transcoder used when an operation does not name one.
    fn default_transcoder(&self) -> Arc<dyn Transcoder>;

    /// Registers a connection observer. Returns whether it was added.
    fn add_observer(&self, observer: Arc<dyn ConnectionObserver>) -> bool;

    /// Removes a previously registered observer. Returns whether it was
    /// present.
    fn remove_observer(&self, observer: &Arc<dyn ConnectionObserver>) -> bool;
}
