use std::fmt;

use super::error::MemcacheError;

/// A raw cache payload together with its storage flags.
///
/// The tracing layer only ever looks at the [`Display`] form of a value, so
/// the payload stays opaque to everything but the transcoder in use.
///
/// [`Display`]: fmt::Display
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Value {
    bytes: Vec<u8>,
    flags: u32,
}

impl Value {
    /// Creates a value from raw bytes and storage flags.
    pub fn new(bytes: impl Into<Vec<u8>>, flags: u32) -> Self {
        Value {
            bytes: bytes.into(),
            flags,
        }
    }

    /// The raw payload bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The storage flags the server keeps alongside the payload.
    pub fn flags(&self) -> u32 {
        self.flags
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::new(value.as_bytes().to_vec(), 0)
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::new(value.into_bytes(), 0)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Value::new(bytes, 0)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        String::from_utf8_lossy(&self.bytes).fmt(f)
    }
}

/// A value paired with the CAS id it was read under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CasValue {
    cas: u64,
    value: Value,
}

impl CasValue {
    /// Pairs a value with the CAS id the server reported for it.
    pub fn new(cas: u64, value: Value) -> Self {
        CasValue { cas, value }
    }

    /// The CAS id under which this value was read.
    pub fn cas(&self) -> u64 {
        self.cas
    }

    /// The value itself.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Consumes the pair and returns the value.
    pub fn into_value(self) -> Value {
        self.value
    }
}

/// Outcome of a compare-and-swap operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CasResponse {
    /// The value was stored.
    Ok,
    /// The value was modified since it was read, so nothing was stored.
    Exists,
    /// The key no longer exists.
    NotFound,
}

/// Wire-level status identifiers reported by the server.
///
/// The [`Display`] form matches the identifiers a server operator would see,
/// and is what ends up in the `status.code` span attribute.
///
/// [`Display`]: fmt::Display
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum StatusCode {
    /// The operation succeeded.
    Success,
    /// The key was not found.
    ErrNotFound,
    /// The key already exists.
    ErrExists,
    /// The item was not stored.
    ErrNotStored,
    /// The server reported a temporary failure.
    ErrTemporaryFailure,
    /// The operation timed out.
    Timeout,
    /// The operation was cancelled.
    Cancelled,
    /// The operation was interrupted.
    Interrupted,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            StatusCode::Success => "SUCCESS",
            StatusCode::ErrNotFound => "ERR_NOT_FOUND",
            StatusCode::ErrExists => "ERR_EXISTS",
            StatusCode::ErrNotStored => "ERR_NOT_STORED",
            StatusCode::ErrTemporaryFailure => "ERR_TEMP_FAIL",
            StatusCode::Timeout => "TIMEOUT",
            StatusCode::Cancelled => "CANCELLED",
            StatusCode::Interrupted => "INTERRUPTED",
        };
        f.write_str(code)
    }
}

/// A result snapshot describing how a cache operation concluded.
///
/// Produced by the client implementation when an operation resolves and
/// consumed read-only by the tracing layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OperationStatus {
    code: Option<StatusCode>,
    message: Option<String>,
    success: bool,
}

impl OperationStatus {
    /// Creates a status with the given code and success flag and no message.
    pub fn new(code: Option<StatusCode>, success: bool) -> Self {
        OperationStatus {
            code,
            message: None,
            success,
        }
    }

    /// A successful status with [`StatusCode::Success`].
    pub fn success() -> Self {
        OperationStatus::new(Some(StatusCode::Success), true)
    }

    /// A failed status with the given code.
    pub fn failure(code: StatusCode) -> Self {
        OperationStatus::new(Some(code), false)
    }

    /// Attaches a human-readable message to the status.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// The status code, if the server reported one.
    pub fn code(&self) -> Option<StatusCode> {
        self.code
    }

    /// The human-readable message, if one was carried.
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Whether the operation succeeded.
    pub fn is_success(&self) -> bool {
        self.success
    }
}

/// Converts between application payloads and the raw bytes stored by the
/// server.
///
/// Serialization itself is a collaborator concern; the tracing layer refers
/// to a transcoder only through [`Transcoder::name`], which tags spans with
/// the transcoder's runtime type.
pub trait Transcoder: Send + Sync {
    /// Encodes a value into the bytes sent to the server.
    fn encode(&self, value: &Value) -> Result<Vec<u8>, MemcacheError>;

    /// Decodes bytes received from the server into a value.
    fn decode(&self, bytes: &[u8], flags: u32) -> Result<Value, MemcacheError>;

    /// The runtime type name used when tagging spans.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
