//! Error handling for the omgfile library.
//!
//! This module defines all error types that can occur while encoding records,
//! assembling containers, or reading them back.

use std::error::Error as StdError;
use thiserror::Error;

/// A specialized `Result` type for omgfile operations.
///
/// It's equivalent to `std::result::Result<T, OmgError>`.
///
/// # Examples
///
/// ```rust
/// use omgfile::{elias_fano, Result};
///
/// fn roundtrip(values: &[u32]) -> Result<Vec<u32>> {
///     let code = elias_fano::encode(values)?;
///     elias_fano::decode(&code)
/// }
/// assert_eq!(roundtrip(&[1, 1, 4]).unwrap(), vec![1, 1, 4]);
/// ```
pub type Result<T> = std::result::Result<T, OmgError>;

/// Error types for omgfile operations.
///
/// Nearly every variant is fatal to a conversion run: the pipeline stops, joins
/// its workers and hands the first root-cause error back to the caller.
///
/// # Examples
///
/// ```rust
/// use omgfile::{elias_fano, OmgError};
///
/// match elias_fano::encode(&[3u32, 2, 5]) {
///     Err(OmgError::Precondition(msg)) => println!("rejected: {}", msg),
///     Err(e) => println!("other error: {}", e),
///     Ok(_) => unreachable!(),
/// }
/// ```
#[derive(Error, Debug)]
pub enum OmgError {
    /// I/O error from the underlying file or stream.
    ///
    /// Covers temp file and container creation, seeks and short reads.
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    /// An input violated a codec precondition.
    ///
    /// Raised for empty or non-monotone Elias-Fano input and for values that
    /// do not fit the chosen word width.
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// A compressed block, Base64 text or Elias-Fano code could not be decoded.
    #[error("Decode error in {context}: {reason}")]
    Decode {
        context: &'static str,
        reason: String,
    },

    /// The container is structurally inconsistent.
    ///
    /// Malformed footer or offset table, entry count mismatch, missing header
    /// keys and similar problems land here.
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// A record handed to an encoder is malformed.
    #[error("Invalid record {id}: {reason}")]
    InvalidRecord { id: u32, reason: String },

    /// Entry index is out of bounds.
    #[error("Invalid index ({idx}) - Must be less than {max}")]
    InvalidIndex { idx: usize, max: usize },

    /// A configuration value is unusable.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// A pipeline channel closed before the stream was finished.
    ///
    /// This is the symptom seen by upstream stages when a downstream stage
    /// aborts; the pipeline reports the downstream cause instead when it has one.
    #[error("Pipeline closed: {0}")]
    PipelineClosed(&'static str),

    /// Error occurred inside a user-supplied processor or source.
    #[error("Processing error: {0}")]
    Process(Box<dyn StdError + Send + Sync>),
}

impl OmgError {
    pub(crate) fn decode(context: &'static str, reason: impl Into<String>) -> Self {
        OmgError::Decode {
            context,
            reason: reason.into(),
        }
    }

    pub(crate) fn integrity(reason: impl Into<String>) -> Self {
        OmgError::Integrity(reason.into())
    }

    pub(crate) fn precondition(reason: impl Into<String>) -> Self {
        OmgError::Precondition(reason.into())
    }

    /// Returns `true` for the secondary "channel closed" symptom.
    pub fn is_pipeline_closed(&self) -> bool {
        matches!(self, OmgError::PipelineClosed(_))
    }
}

/// Trait for converting errors into `OmgError::Process` variants.
///
/// This trait provides a convenient way to convert custom error types raised
/// by record sources or entry processors.
///
/// # Examples
///
/// ```rust
/// use omgfile::{IntoOmgError, OmgError};
/// use std::fmt;
///
/// #[derive(Debug)]
/// struct VendorError(String);
///
/// impl fmt::Display for VendorError {
///     fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
///         write!(f, "vendor error: {}", self.0)
///     }
/// }
///
/// impl std::error::Error for VendorError {}
///
/// let err = VendorError("bad frame".to_string()).into_omg_error();
/// assert!(matches!(err, OmgError::Process(_)));
/// ```
pub trait IntoOmgError {
    /// Converts the error into an `OmgError`.
    fn into_omg_error(self) -> OmgError;
}

impl<E> IntoOmgError for E
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn into_omg_error(self) -> OmgError {
        OmgError::Process(self.into())
    }
}
