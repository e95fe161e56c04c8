//! Error types for the reconciliation pipeline.
//!
//! This module provides a unified error type [`ReconError`] that covers every
//! failure the fetch-transform-export cycle can surface to the user.
//!
//! # Design
//!
//! The error hierarchy is organized by stage:
//! - [`ReconError::ConfigError`]: Missing or invalid configuration (fatal before any fetch)
//! - [`ReconError::FetchError`]: HTTP or explorer-reported failures (fatal for the fetch)
//! - [`ReconError::DecodingError`]: Raw rows with malformed numeric fields
//! - [`ReconError::EmptyExportError`]: Export attempted on zero records
//! - [`ReconError::ExportError`]: Spreadsheet or file writing failures
//! - [`ReconError::ChartError`]: Chart rendering failures
//!
//! The benign "no records found" explorer message is never turned into an
//! error; the fetcher treats it as end-of-data.
//!
//! # Example
//!
//! ```
//! use usdt_reconciliation::error::{ReconError, ReconResult};
//!
//! fn require_key(key: &str) -> ReconResult<()> {
//!     if key.is_empty() {
//!         return Err(ReconError::config("API key is empty", None));
//!     }
//!     Ok(())
//! }
//! ```

use std::fmt;

/// Result type alias using [`ReconError`].
pub type ReconResult<T> = Result<T, ReconError>;

/// Boxed source error carried by most variants.
type BoxedSource = Box<dyn std::error::Error + Send + Sync>;

/// Unified error type for the reconciliation pipeline.
#[derive(Debug)]
pub enum ReconError {
    /// Configuration errors.
    ///
    /// Variants include:
    /// - API key absent from both the secrets store and the environment
    /// - Chain id present but not an integer
    /// - Unreadable secrets file
    /// - Out-of-range fetch parameters
    ConfigError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// Explorer fetch errors.
    ///
    /// Carries the HTTP status when one was received. Transport failures
    /// (connection refused, timeout) have no status.
    FetchError {
        /// HTTP status code, if a response arrived
        status: Option<u16>,
        /// Response body or explorer message
        message: String,
    },

    /// A raw explorer row could not be normalized.
    DecodingError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// Export was requested for an empty record list.
    EmptyExportError,

    /// Spreadsheet generation or output file errors.
    ExportError {
        /// Human-readable error message
        message: String,
        /// Optional underlying error
        source: Option<BoxedSource>,
    },

    /// Chart rendering errors.
    ChartError {
        /// Human-readable error message
        message: String,
    },
}

impl ReconError {
    /// Create a new configuration error.
    ///
    /// # Example
    ///
    /// ```
    /// use usdt_reconciliation::error::ReconError;
    ///
    /// let err = ReconError::config("ETHERSCAN_API_KEY_Reconciliation not set", None);
    /// assert!(matches!(err, ReconError::ConfigError { .. }));
    /// ```
    #[must_use]
    pub fn config(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::ConfigError {
            message: message.into(),
            source,
        }
    }

    /// Create a new fetch error.
    ///
    /// # Example
    ///
    /// ```
    /// use usdt_reconciliation::error::ReconError;
    ///
    /// let err = ReconError::fetch(Some(502), "Bad Gateway");
    /// assert_eq!(err.to_string(), "Fetch error (HTTP 502): Bad Gateway");
    /// ```
    #[must_use]
    pub fn fetch(status: Option<u16>, message: impl Into<String>) -> Self {
        Self::FetchError {
            status,
            message: message.into(),
        }
    }

    /// Create a new decoding error.
    #[must_use]
    pub fn decoding(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::DecodingError {
            message: message.into(),
            source,
        }
    }

    /// Create a new export error.
    #[must_use]
    pub fn export(message: impl Into<String>, source: Option<BoxedSource>) -> Self {
        Self::ExportError {
            message: message.into(),
            source,
        }
    }

    /// Create a new chart error.
    #[must_use]
    pub fn chart(message: impl Into<String>) -> Self {
        Self::ChartError {
            message: message.into(),
        }
    }

    /// HTTP status attached to a fetch error, if any.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::FetchError { status, .. } => *status,
            _ => None,
        }
    }
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigError { message, .. } => write!(f, "Configuration error: {message}"),
            Self::FetchError {
                status: Some(status),
                message,
            } => write!(f, "Fetch error (HTTP {status}): {message}"),
            Self::FetchError {
                status: None,
                message,
            } => write!(f, "Fetch error: {message}"),
            Self::DecodingError { message, .. } => write!(f, "Decoding error: {message}"),
            Self::EmptyExportError => write!(f, "No records to export"),
            Self::ExportError { message, .. } => write!(f, "Export error: {message}"),
            Self::ChartError { message } => write!(f, "Chart error: {message}"),
        }
    }
}

impl std::error::Error for ReconError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ConfigError { source, .. }
            | Self::DecodingError { source, .. }
            | Self::ExportError { source, .. } => source
                .as_ref()
                .map(|e| e.as_ref() as &dyn std::error::Error),
            Self::FetchError { .. } | Self::EmptyExportError | Self::ChartError { .. } => None,
        }
    }
}

impl From<rust_xlsxwriter::XlsxError> for ReconError {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Self::ExportError {
            message: format!("spreadsheet writer failed: {err}"),
            source: Some(Box::new(err)),
        }
    }
}
