//! In-memory mock client plus span assertion helpers shared by the
//! integration tests.
#![allow(dead_code)] // each test binary uses its own subset

use std::collections::{HashMap, HashSet, VecDeque};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use opentelemetry_memcached::client::{
    BulkGetFuture, CasResponse, CasValue, ConnectionObserver, GetFuture, MemcacheError,
    MemcachedClient, OperationFuture, OperationStatus, StatusCode, Transcoder, Value,
};
use opentelemetry_sdk::trace::{InMemorySpanExporter, SdkTracerProvider, SpanData};

pub const SERVER: &str = "127.0.0.1:11211";

/// Builds a provider that hands every finished span to an in-memory
/// exporter the test can inspect.
pub fn tracer_provider() -> (SdkTracerProvider, InMemorySpanExporter) {
    let exporter = InMemorySpanExporter::default();
    let provider = SdkTracerProvider::builder()
        .with_simple_exporter(exporter.clone())
        .build();
    (provider, exporter)
}

pub fn attr_str(span: &SpanData, key: &str) -> Option<String> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| kv.value.as_str().into_owned())
}

pub fn has_attr(span: &SpanData, key: &str) -> bool {
    span.attributes.iter().any(|kv| kv.key.as_str() == key)
}

/// Identity transcoder; exists so tests can assert the transcoder tag.
#[derive(Debug, Default)]
pub struct PlainTranscoder;

impl Transcoder for PlainTranscoder {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, MemcacheError> {
        Ok(value.bytes().to_vec())
    }

    fn decode(&self, bytes: &[u8], flags: u32) -> Result<Value, MemcacheError> {
        Ok(Value::new(bytes.to_vec(), flags))
    }
}

/// Observer that records nothing; used for the passthrough tests.
#[derive(Debug, Default)]
pub struct NoopObserver;

impl ConnectionObserver for NoopObserver {
    fn connection_established(&self, _address: SocketAddr, _reconnect_count: u32) {}
    fn connection_lost(&self, _address: SocketAddr) {}
}

/// How the mock concludes asynchronous operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompletionMode {
    /// Resolve inline on the calling thread.
    Immediate,
    /// Resolve from a background thread shortly after the call returns.
    Background,
    /// Park operations until the test resolves them with
    /// [`MockMemcachedClient::resolve_next`].
    Manual,
    /// Fail every operation the way an unreachable server would.
    Unreachable,
}

struct Entry {
    value: Value,
    cas: u64,
}

type Store = HashMap<String, Entry>;

/// HashMap-backed stand-in for a real client, with pluggable completion
/// behavior for the asynchronous operations.
pub struct MockMemcachedClient {
    mode: CompletionMode,
    store: Arc<Mutex<Store>>,
    cas_counter: Arc<AtomicU64>,
    parked: Mutex<VecDeque<Box<dyn FnOnce() + Send>>>,
    observers: Mutex<Vec<Arc<dyn ConnectionObserver>>>,
}

impl MockMemcachedClient {
    pub fn new(mode: CompletionMode) -> Self {
        MockMemcachedClient {
            mode,
            store: Arc::new(Mutex::new(HashMap::new())),
            cas_counter: Arc::new(AtomicU64::new(0)),
            parked: Mutex::new(VecDeque::new()),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Stores an entry directly, without going through an operation.
    pub fn seed(&self, key: &str, value: Value) {
        let cas = self.cas_counter.fetch_add(1, Ordering::Relaxed) + 1;
        self.store
            .lock()
            .unwrap()
            .insert(key.to_owned(), Entry { value, cas });
    }

    /// Resolves the oldest parked operation. Returns `false` when none is
    /// waiting. Only meaningful in [`CompletionMode::Manual`].
    pub fn resolve_next(&self) -> bool {
        let job = self.parked.lock().unwrap().pop_front();
        match job {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    pub fn pending_ops(&self) -> usize {
        self.parked.lock().unwrap().len()
    }

    fn unreachable_error() -> MemcacheError {
        MemcacheError::Connection(format!("connection refused: {SERVER}"))
    }

    fn sync_op<T>(
        &self,
        op: impl FnOnce(&mut Store, &AtomicU64) -> Result<T, MemcacheError>,
    ) -> Result<T, MemcacheError> {
        if self.mode == CompletionMode::Unreachable {
            return Err(Self::unreachable_error());
        }
        let mut store = self.store.lock().unwrap();
        op(&mut store, &self.cas_counter)
    }

    fn async_op<T>(
        &self,
        op: impl FnOnce(&mut Store, &AtomicU64) -> (Result<T, MemcacheError>, OperationStatus)
            + Send
            + 'static,
    ) -> OperationFuture<T>
    where
        T: Send + Sync + 'static,
    {
        let store = Arc::clone(&self.store);
        let cas_counter = Arc::clone(&self.cas_counter);
        let run = move || {
            let mut store = store.lock().unwrap();
            op(&mut store, &cas_counter)
        };
        match self.mode {
            CompletionMode::Immediate => {
                let (result, status) = run();
                OperationFuture::ready(result, status)
            }
            CompletionMode::Background => {
                let (future, completer) = OperationFuture::pending();
                thread::spawn(move || {
                    thread::sleep(Duration::from_millis(10));
                    let (result, status) = run();
                    completer.resolve(result, status);
                });
                future
            }
            CompletionMode::Manual => {
                let (future, completer) = OperationFuture::pending();
                self.parked.lock().unwrap().push_back(Box::new(move || {
                    let (result, status) = run();
                    completer.resolve(result, status);
                }));
                future
            }
            CompletionMode::Unreachable => OperationFuture::ready(
                Err(Self::unreachable_error()),
                OperationStatus::failure(StatusCode::Timeout)
                    .with_message("timed out waiting for operation"),
            ),
        }
    }
}

fn next_cas(cas_counter: &AtomicU64) -> u64 {
    cas_counter.fetch_add(1, Ordering::Relaxed) + 1
}

fn read_counter(store: &Store, key: &str) -> Option<u64> {
    store
        .get(key)
        .and_then(|entry| String::from_utf8_lossy(entry.value.bytes()).parse().ok())
}

fn write_counter(store: &mut Store, cas_counter: &AtomicU64, key: &str, value: u64) {
    store.insert(
        key.to_owned(),
        Entry {
            value: Value::from(value.to_string()),
            cas: next_cas(cas_counter),
        },
    );
}

fn arithmetic(
    store: &mut Store,
    cas_counter: &AtomicU64,
    key: &str,
    default: Option<u64>,
    apply: impl FnOnce(u64) -> u64,
) -> Result<u64, MemcacheError> {
    let updated = match (read_counter(store, key), default) {
        (Some(current), _) => apply(current),
        (None, Some(default)) => default,
        (None, None) => return Err(MemcacheError::Server("NOT_FOUND".to_owned())),
    };
    write_counter(store, cas_counter, key, updated);
    Ok(updated)
}

fn cas_store(
    store: &mut Store,
    cas_counter: &AtomicU64,
    key: &str,
    cas_id: u64,
    value: Value,
) -> CasResponse {
    match store.get(key) {
        None => CasResponse::NotFound,
        Some(entry) if entry.cas != cas_id => CasResponse::Exists,
        Some(_) => {
            let cas = next_cas(cas_counter);
            store.insert(key.to_owned(), Entry { value, cas });
            CasResponse::Ok
        }
    }
}

impl MemcachedClient for MockMemcachedClient {
    fn get(
        &self,
        key: &str,
        _transcoder: Option<&dyn Transcoder>,
    ) -> Result<Option<Value>, MemcacheError> {
        self.sync_op(|store, _| Ok(store.get(key).map(|entry| entry.value.clone())))
    }

    fn gets(
        &self,
        key: &str,
        _transcoder: Option<&dyn Transcoder>,
    ) -> Result<Option<CasValue>, MemcacheError> {
        self.sync_op(|store, _| {
            Ok(store
                .get(key)
                .map(|entry| CasValue::new(entry.cas, entry.value.clone())))
        })
    }

    fn get_and_touch(
        &self,
        key: &str,
        _expiration: u32,
        _transcoder: Option<&dyn Transcoder>,
    ) -> Result<Option<CasValue>, MemcacheError> {
        self.sync_op(|store, _| {
            Ok(store
                .get(key)
                .map(|entry| CasValue::new(entry.cas, entry.value.clone())))
        })
    }

    fn get_bulk(
        &self,
        keys: &[String],
        _transcoder: Option<&dyn Transcoder>,
    ) -> Result<HashMap<String, Value>, MemcacheError> {
        self.sync_op(|store, _| {
            Ok(keys
                .iter()
                .filter_map(|key| {
                    store
                        .get(key)
                        .map(|entry| (key.clone(), entry.value.clone()))
                })
                .collect())
        })
    }

    fn cas(
        &self,
        key: &str,
        cas_id: u64,
        value: Value,
        _expiration: Option<u32>,
        _transcoder: Option<&dyn Transcoder>,
    ) -> Result<CasResponse, MemcacheError> {
        self.sync_op(|store, cas_counter| Ok(cas_store(store, cas_counter, key, cas_id, value)))
    }

    fn incr(
        &self,
        key: &str,
        by: u64,
        default: Option<u64>,
        _expiration: Option<u32>,
    ) -> Result<u64, MemcacheError> {
        self.sync_op(|store, cas_counter| {
            arithmetic(store, cas_counter, key, default, |current| {
                current.saturating_add(by)
            })
        })
    }

    fn decr(
        &self,
        key: &str,
        by: u64,
        default: Option<u64>,
        _expiration: Option<u32>,
    ) -> Result<u64, MemcacheError> {
        self.sync_op(|store, cas_counter| {
            arithmetic(store, cas_counter, key, default, |current| {
                current.saturating_sub(by)
            })
        })
    }

    fn get_versions(&self) -> Result<HashMap<SocketAddr, String>, MemcacheError> {
        self.sync_op(|_, _| {
            Ok(HashMap::from([(
                SERVER.parse().unwrap(),
                "1.6.21".to_owned(),
            )]))
        })
    }

    fn get_stats(
        &self,
        _argument: Option<&str>,
    ) -> Result<HashMap<SocketAddr, HashMap<String, String>>, MemcacheError> {
        self.sync_op(|store, _| {
            let stats = HashMap::from([("curr_items".to_owned(), store.len().to_string())]);
            Ok(HashMap::from([(SERVER.parse().unwrap(), stats)]))
        })
    }

    fn list_sasl_mechanisms(&self) -> Result<HashSet<String>, MemcacheError> {
        self.sync_op(|_, _| Ok(HashSet::from(["PLAIN".to_owned()])))
    }

    fn shutdown(&self, _timeout: Option<Duration>) -> Result<bool, MemcacheError> {
        self.sync_op(|_, _| Ok(true))
    }

    fn wait_for_queues(&self, _timeout: Duration) -> bool {
        self.mode != CompletionMode::Unreachable
    }

    fn async_get(&self, key: &str, _transcoder: Option<&dyn Transcoder>) -> GetFuture {
        let key = key.to_owned();
        self.async_op(move |store, _| {
            let value = store.get(&key).map(|entry| entry.value.clone());
            (Ok(value), OperationStatus::success())
        })
    }

    fn async_gets(
        &self,
        key: &str,
        _transcoder: Option<&dyn Transcoder>,
    ) -> OperationFuture<Option<CasValue>> {
        let key = key.to_owned();
        self.async_op(move |store, _| {
            let value = store
                .get(&key)
                .map(|entry| CasValue::new(entry.cas, entry.value.clone()));
            (Ok(value), OperationStatus::success())
        })
    }

    fn async_get_and_touch(
        &self,
        key: &str,
        _expiration: u32,
        _transcoder: Option<&dyn Transcoder>,
    ) -> OperationFuture<Option<CasValue>> {
        let key = key.to_owned();
        self.async_op(move |store, _| {
            let value = store
                .get(&key)
                .map(|entry| CasValue::new(entry.cas, entry.value.clone()));
            (Ok(value), OperationStatus::success())
        })
    }

    fn async_get_bulk(
        &self,
        keys: &[String],
        _transcoder: Option<&dyn Transcoder>,
    ) -> BulkGetFuture {
        let keys = keys.to_vec();
        self.async_op(move |store, _| {
            let values = keys
                .iter()
                .filter_map(|key| {
                    store
                        .get(key)
                        .map(|entry| (key.clone(), entry.value.clone()))
                })
                .collect();
            (Ok(values), OperationStatus::success())
        })
    }

    fn set(
        &self,
        key: &str,
        _expiration: u32,
        value: Value,
        _transcoder: Option<&dyn Transcoder>,
    ) -> OperationFuture<bool> {
        let key = key.to_owned();
        self.async_op(move |store, cas_counter| {
            let cas = next_cas(cas_counter);
            store.insert(key, Entry { value, cas });
            (Ok(true), OperationStatus::success())
        })
    }

    fn add(
        &self,
        key: &str,
        _expiration: u32,
        value: Value,
        _transcoder: Option<&dyn Transcoder>,
    ) -> OperationFuture<bool> {
        let key = key.to_owned();
        self.async_op(move |store, cas_counter| {
            if store.contains_key(&key) {
                return (
                    Ok(false),
                    OperationStatus::failure(StatusCode::ErrNotStored),
                );
            }
            let cas = next_cas(cas_counter);
            store.insert(key, Entry { value, cas });
            (Ok(true), OperationStatus::success())
        })
    }

    fn replace(
        &self,
        key: &str,
        _expiration: u32,
        value: Value,
        _transcoder: Option<&dyn Transcoder>,
    ) -> OperationFuture<bool> {
        let key = key.to_owned();
        self.async_op(move |store, cas_counter| {
            if !store.contains_key(&key) {
                return (
                    Ok(false),
                    OperationStatus::failure(StatusCode::ErrNotStored),
                );
            }
            let cas = next_cas(cas_counter);
            store.insert(key, Entry { value, cas });
            (Ok(true), OperationStatus::success())
        })
    }

    fn append(
        &self,
        _cas_id: Option<u64>,
        key: &str,
        value: Value,
        _transcoder: Option<&dyn Transcoder>,
    ) -> OperationFuture<bool> {
        let key = key.to_owned();
        self.async_op(move |store, cas_counter| match store.get(&key) {
            None => (
                Ok(false),
                OperationStatus::failure(StatusCode::ErrNotStored),
            ),
            Some(entry) => {
                let mut bytes = entry.value.bytes().to_vec();
                bytes.extend_from_slice(value.bytes());
                let flags = entry.value.flags();
                let cas = next_cas(cas_counter);
                store.insert(
                    key,
                    Entry {
                        value: Value::new(bytes, flags),
                        cas,
                    },
                );
                (Ok(true), OperationStatus::success())
            }
        })
    }

    fn prepend(
        &self,
        _cas_id: Option<u64>,
        key: &str,
        value: Value,
        _transcoder: Option<&dyn Transcoder>,
    ) -> OperationFuture<bool> {
        let key = key.to_owned();
        self.async_op(move |store, cas_counter| match store.get(&key) {
            None => (
                Ok(false),
                OperationStatus::failure(StatusCode::ErrNotStored),
            ),
            Some(entry) => {
                let mut bytes = value.bytes().to_vec();
                bytes.extend_from_slice(entry.value.bytes());
                let flags = entry.value.flags();
                let cas = next_cas(cas_counter);
                store.insert(
                    key,
                    Entry {
                        value: Value::new(bytes, flags),
                        cas,
                    },
                );
                (Ok(true), OperationStatus::success())
            }
        })
    }

    fn async_cas(
        &self,
        key: &str,
        cas_id: u64,
        value: Value,
        _expiration: Option<u32>,
        _transcoder: Option<&dyn Transcoder>,
    ) -> OperationFuture<CasResponse> {
        let key = key.to_owned();
        self.async_op(move |store, cas_counter| {
            let response = cas_store(store, cas_counter, &key, cas_id, value);
            let status = match response {
                CasResponse::Ok => OperationStatus::success(),
                CasResponse::Exists => OperationStatus::failure(StatusCode::ErrExists),
                CasResponse::NotFound => OperationStatus::failure(StatusCode::ErrNotFound),
            };
            (Ok(response), status)
        })
    }

    fn async_incr(
        &self,
        key: &str,
        by: u64,
        default: Option<u64>,
        _expiration: Option<u32>,
    ) -> OperationFuture<u64> {
        let key = key.to_owned();
        self.async_op(move |store, cas_counter| {
            match arithmetic(store, cas_counter, &key, default, |current| {
                current.saturating_add(by)
            }) {
                Ok(updated) => (Ok(updated), OperationStatus::success()),
                Err(err) => (
                    Err(err),
                    OperationStatus::failure(StatusCode::ErrNotFound).with_message("NOT_FOUND"),
                ),
            }
        })
    }

    fn async_decr(
        &self,
        key: &str,
        by: u64,
        default: Option<u64>,
        _expiration: Option<u32>,
    ) -> OperationFuture<u64> {
        let key = key.to_owned();
        self.async_op(move |store, cas_counter| {
            match arithmetic(store, cas_counter, &key, default, |current| {
                current.saturating_sub(by)
            }) {
                Ok(updated) => (Ok(updated), OperationStatus::success()),
                Err(err) => (
                    Err(err),
                    OperationStatus::failure(StatusCode::ErrNotFound).with_message("NOT_FOUND"),
                ),
            }
        })
    }

    fn touch(
        &self,
        key: &str,
        _expiration: u32,
        _transcoder: Option<&dyn Transcoder>,
    ) -> OperationFuture<bool> {
        let key = key.to_owned();
        self.async_op(move |store, _| {
            if store.contains_key(&key) {
                (Ok(true), OperationStatus::success())
            } else {
                (Ok(false), OperationStatus::failure(StatusCode::ErrNotFound))
            }
        })
    }

    fn delete(&self, key: &str, cas_id: Option<u64>) -> OperationFuture<bool> {
        let key = key.to_owned();
        self.async_op(move |store, _| {
            let matches = match (store.get(&key), cas_id) {
                (None, _) => {
                    return (Ok(false), OperationStatus::failure(StatusCode::ErrNotFound))
                }
                (Some(entry), Some(cas_id)) => entry.cas == cas_id,
                (Some(_), None) => true,
            };
            if !matches {
                return (Ok(false), OperationStatus::failure(StatusCode::ErrExists));
            }
            store.remove(&key);
            (Ok(true), OperationStatus::success())
        })
    }

    fn flush(&self, _delay: Option<u32>) -> OperationFuture<bool> {
        self.async_op(move |store, _| {
            store.clear();
            (Ok(true), OperationStatus::success())
        })
    }

    fn available_servers(&self) -> Vec<SocketAddr> {
        match self.mode {
            CompletionMode::Unreachable => Vec::new(),
            _ => vec![SERVER.parse().unwrap()],
        }
    }

    fn unavailable_servers(&self) -> Vec<SocketAddr> {
        match self.mode {
            CompletionMode::Unreachable => vec![SERVER.parse().unwrap()],
            _ => Vec::new(),
        }
    }

    fn operation_timeout(&self) -> Duration {
        Duration::from_millis(2500)
    }

    fn default_transcoder(&self) -> Arc<dyn Transcoder> {
        Arc::new(PlainTranscoder)
    }

    fn add_observer(&self, observer: Arc<dyn ConnectionObserver>) -> bool {
        self.observers.lock().unwrap().push(observer);
        true
    }

    fn remove_observer(&self, observer: &Arc<dyn ConnectionObserver>) -> bool {
        let mut observers = self.observers.lock().unwrap();
        match observers.iter().position(|known| Arc::ptr_eq(known, observer)) {
            Some(index) => {
                observers.remove(index);
                true
            }
            None => false,
        }
    }
}
