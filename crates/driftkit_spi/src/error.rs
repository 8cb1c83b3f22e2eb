//! Error types for DriftKit operations.

use std::fmt;
use std::time::Duration;

/// Result type alias for DriftKit operations.
pub type DriftResult<T> = Result<T, DriftError>;

/// Unified error type for discovery and automation operations.
#[derive(Debug, thiserror::Error)]
pub enum DriftError {
    /// Network or connectivity error
    #[error("Network error: {0}")]
    Network(NetworkError),

    /// Bad or missing credentials
    #[error("Authentication failed for {provider}: {message}")]
    Authentication {
        /// Provider name (aws, azure, gcp, digitalocean)
        provider: String,
        /// What went wrong
        message: String,
    },

    /// Authorized but forbidden for a specific resource or call
    #[error("Permission denied: {0}")]
    Permission(String),

    /// Provider throttling
    #[error("Rate limited")]
    RateLimited {
        /// When to retry (if the provider said)
        retry_after: Option<Duration>,
    },

    /// Operation deadline exceeded
    #[error("Operation '{operation}' timed out after {duration:?}")]
    Timeout {
        /// What operation timed out
        operation: String,
        /// Timeout duration
        duration: Duration,
    },

    /// Resource vanished mid-scan
    #[error("{resource_type} not found: {resource_id}")]
    NotFound {
        /// Type of resource
        resource_type: String,
        /// Identifier of the resource
        resource_id: String,
    },

    /// Invalid input, configuration, or workflow
    #[error("Validation error: {0}")]
    Validation(String),

    /// Circuit breaker short-circuit
    #[error("Circuit open for endpoint '{endpoint}'")]
    CircuitOpen {
        /// Endpoint key the breaker guards
        endpoint: String,
    },

    /// Programmer error or unexpected internal state
    #[error("Internal error: {0}")]
    Internal(String),

    /// The caller cancelled the operation
    #[error("Operation cancelled")]
    Cancelled,

    /// An error annotated with its discovery context.
    #[error("[{provider}/{region}/{service}] {source}")]
    Annotated {
        /// Provider the error originated from
        provider: String,
        /// Region the call targeted
        region: String,
        /// Service within the provider (e.g. "compute", "storage")
        service: String,
        /// Retry attempt that produced this error, if any
        attempt: Option<u32>,
        /// The underlying error
        #[source]
        source: Box<DriftError>,
    },
}

/// Classification of a [`DriftError`], independent of its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Socket/DNS failure
    Network,
    /// Bad credentials
    Authentication,
    /// Authorized but forbidden
    Permission,
    /// Provider throttling
    RateLimit,
    /// Context deadline
    Timeout,
    /// Resource vanished mid-scan
    NotFound,
    /// Bad config or workflow
    Validation,
    /// Breaker short-circuit
    CircuitOpen,
    /// Programmer error
    Internal,
    /// Caller cancel
    Cancelled,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Network => "network",
            ErrorKind::Authentication => "authentication",
            ErrorKind::Permission => "permission",
            ErrorKind::RateLimit => "rate-limit",
            ErrorKind::Timeout => "timeout",
            ErrorKind::NotFound => "not-found",
            ErrorKind::Validation => "validation",
            ErrorKind::CircuitOpen => "circuit-open",
            ErrorKind::Internal => "internal",
            ErrorKind::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

impl ErrorKind {
    /// A short remediation hint for user-facing error reports.
    pub fn remediation(&self) -> Option<&'static str> {
        match self {
            ErrorKind::Authentication => {
                Some("check the credential chain for this provider (env vars, profiles, metadata)")
            }
            ErrorKind::Permission => {
                Some("grant the discovery principal read access to the skipped resources")
            }
            ErrorKind::RateLimit => {
                Some("lower max_concurrency or raise retry_max_delay to respect provider limits")
            }
            ErrorKind::Network => Some("verify connectivity and DNS to the provider endpoint"),
            ErrorKind::Timeout => Some("raise discovery_timeout or narrow the resource filter"),
            _ => None,
        }
    }
}

/// Transient error substrings treated as retryable when they appear in
/// otherwise-unclassified internal errors.
const TRANSIENT_PATTERNS: &[&str] = &[
    "connection reset",
    "connection refused",
    "broken pipe",
    "temporarily unavailable",
    "throttl",
    "too many requests",
    "timed out",
];

impl DriftError {
    /// Classify this error, seeing through any [`DriftError::Annotated`] wrapper.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DriftError::Network(_) => ErrorKind::Network,
            DriftError::Authentication { .. } => ErrorKind::Authentication,
            DriftError::Permission(_) => ErrorKind::Permission,
            DriftError::RateLimited { .. } => ErrorKind::RateLimit,
            DriftError::Timeout { .. } => ErrorKind::Timeout,
            DriftError::NotFound { .. } => ErrorKind::NotFound,
            DriftError::Validation(_) => ErrorKind::Validation,
            DriftError::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            DriftError::Internal(_) => ErrorKind::Internal,
            DriftError::Cancelled => ErrorKind::Cancelled,
            DriftError::Annotated { source, .. } => source.kind(),
        }
    }

    /// Whether the retry layer may re-attempt this error.
    ///
    /// Network, rate-limit, and timeout kinds are retryable, as are
    /// internal errors whose text matches a known-transient pattern.
    pub fn is_retryable(&self) -> bool {
        match self.kind() {
            ErrorKind::Network | ErrorKind::RateLimit | ErrorKind::Timeout => true,
            ErrorKind::Internal => {
                let text = self.to_string().to_lowercase();
                TRANSIENT_PATTERNS.iter().any(|p| text.contains(p))
            }
            _ => false,
        }
    }

    /// Annotate this error with `(provider, region, service)` context.
    ///
    /// Already-annotated errors keep their original context.
    pub fn with_context(
        self,
        provider: impl Into<String>,
        region: impl Into<String>,
        service: impl Into<String>,
    ) -> Self {
        match self {
            DriftError::Annotated { .. } => self,
            other => DriftError::Annotated {
                provider: provider.into(),
                region: region.into(),
                service: service.into(),
                attempt: None,
                source: Box::new(other),
            },
        }
    }

    /// Record the retry attempt number that produced this error.
    pub fn with_attempt(self, n: u32) -> Self {
        match self {
            DriftError::Annotated {
                provider,
                region,
                service,
                source,
                ..
            } => DriftError::Annotated {
                provider,
                region,
                service,
                attempt: Some(n),
                source,
            },
            other => DriftError::Annotated {
                provider: String::new(),
                region: String::new(),
                service: String::new(),
                attempt: Some(n),
                source: Box::new(other),
            },
        }
    }

    /// The annotated context, if present: `(provider, region, service)`.
    pub fn context(&self) -> Option<(&str, &str, &str)> {
        match self {
            DriftError::Annotated {
                provider,
                region,
                service,
                ..
            } => Some((provider, region, service)),
            _ => None,
        }
    }

    /// The recorded retry attempt, if any.
    pub fn attempt(&self) -> Option<u32> {
        match self {
            DriftError::Annotated { attempt, .. } => *attempt,
            _ => None,
        }
    }
}

impl From<std::io::Error> for DriftError {
    fn from(err: std::io::Error) -> Self {
        DriftError::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for DriftError {
    fn from(err: serde_json::Error) -> Self {
        DriftError::Validation(format!("serialization: {}", err))
    }
}

impl From<reqwest::Error> for DriftError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            DriftError::Timeout {
                operation: "HTTP request".to_string(),
                duration: Duration::from_secs(30),
            }
        } else if err.is_connect() {
            DriftError::Network(NetworkError::Connection(err.to_string()))
        } else {
            DriftError::Network(NetworkError::Request(err.to_string()))
        }
    }
}

/// Network-specific errors.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Connection failed
    #[error("Connection failed: {0}")]
    Connection(String),

    /// DNS resolution failed
    #[error("DNS resolution failed: {0}")]
    DnsResolution(String),

    /// TLS/SSL error
    #[error("TLS error: {0}")]
    Tls(String),

    /// Request failed
    #[error("Request failed: {0}")]
    Request(String),

    /// Response parsing failed
    #[error("Failed to parse response: {0}")]
    ResponseParsing(String),
}
