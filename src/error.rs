//! Error types used by the enumeration runtime, its services and collaborators.
//!
//! - [`BusError`]: misuse of the event bus registration phase.
//! - [`ServiceError`]: service lifecycle contract violations and stop unwinding.
//! - [`ResolveError`]: a single DNS query that produced no usable answer.
//! - [`SourceError`]: an intelligence source that could not be queried.
//! - [`RuntimeError`]: failures of the run coordinator itself.
//!
//! Every enum provides `as_label()`, a short stable snake_case label for logs.

use std::time::Duration;
use thiserror::Error;

use crate::events::{RecordType, Topic};

/// # Errors produced by the event bus.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// A subscription was attempted after the registration phase closed.
    #[error("bus sealed: cannot subscribe to {topic} after publishing started")]
    Sealed {
        /// Topic the late subscriber asked for.
        topic: Topic,
    },
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::Sealed { .. } => "bus_sealed",
        }
    }
}

/// # Errors produced by the service lifecycle.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// `start()` was called on a service that already left the `Created` state.
    #[error("service {service} already started")]
    AlreadyStarted {
        /// Service name.
        service: String,
    },

    /// Pause/resume requested on a service that is not running.
    #[error("service {service} is not running")]
    NotRunning {
        /// Service name.
        service: String,
    },

    /// Background work observed the stop signal and unwound.
    #[error("service stopped")]
    Stopped,
}

impl ServiceError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ServiceError::AlreadyStarted { .. } => "service_already_started",
            ServiceError::NotRunning { .. } => "service_not_running",
            ServiceError::Stopped => "service_stopped",
        }
    }
}

/// # Errors produced by a single DNS query.
///
/// These are transient per-candidate failures; the brute-force engine and the
/// name service discard them silently.
#[non_exhaustive]
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    /// The query succeeded but carried no records of the requested type.
    #[error("{name}: no {record_type} records")]
    NoRecords {
        /// Queried name.
        name: String,
        /// Queried type.
        record_type: RecordType,
    },

    /// The underlying resolver returned an error.
    #[error("{name}: {record_type} lookup failed: {error}")]
    Lookup {
        /// Queried name.
        name: String,
        /// Queried type.
        record_type: RecordType,
        /// Resolver error message.
        error: String,
    },

    /// The query did not complete within the configured timeout.
    #[error("{name}: {record_type} lookup timed out")]
    Timeout {
        /// Queried name.
        name: String,
        /// Queried type.
        record_type: RecordType,
    },
}

impl ResolveError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            ResolveError::NoRecords { .. } => "resolve_no_records",
            ResolveError::Lookup { .. } => "resolve_lookup_failed",
            ResolveError::Timeout { .. } => "resolve_timeout",
        }
    }
}

/// # Errors produced by intelligence source connectors.
///
/// Never fatal: the affected source logs a warning and yields no names.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SourceError {
    /// Transport-level HTTP failure.
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    /// The source answered with a non-success status.
    #[error("{source_name}: unexpected HTTP status {status}")]
    Status {
        /// Source name.
        source_name: String,
        /// Returned status code.
        status: u16,
    },

    /// The response body did not have the expected shape.
    #[error("{source_name}: invalid response: {error}")]
    Decode {
        /// Source name.
        source_name: String,
        /// Decoder message.
        error: String,
    },

    /// The source needs credentials that were not configured.
    #[error("{source_name}: API key data was not provided")]
    MissingCredentials {
        /// Source name.
        source_name: String,
    },
}

impl SourceError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SourceError::Http(_) => "source_http",
            SourceError::Status { .. } => "source_status",
            SourceError::Decode { .. } => "source_decode",
            SourceError::MissingCredentials { .. } => "source_missing_credentials",
        }
    }
}

/// # Errors produced by the run coordinator.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some services did not stop in time.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Names of the services that did not stop in time.
        stuck: Vec<String>,
    },

    /// A service could not be started.
    #[error("service start failed: {0}")]
    Service(#[from] ServiceError),

    /// Subscription wiring failed.
    #[error("bus wiring failed: {0}")]
    Bus(#[from] BusError),

    /// OS signal listeners could not be installed.
    #[error("signal handler: {0}")]
    Signal(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use subvisor::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Service(_) => "runtime_service",
            RuntimeError::Bus(_) => "runtime_bus",
            RuntimeError::Signal(_) => "runtime_signal",
        }
    }
}
