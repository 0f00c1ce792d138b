//! # Error Types
//!
//! Every fallible operation in the crate returns [`DaasResult`]. Errors split into two
//! groups:
//!
//! - **Pre-send errors** (request shape, time decoding, family selection) abort a whole
//!   selection before any network traffic happens.
//! - **Per-request errors** (remote error codes, transport failures, malformed payloads)
//!   are logged by the dispatcher and turn the affected slot into a missing result.

use thiserror::Error;

/// Error code reported for client-side failures (transport, decoding, unparsable
/// gateway replies). Remote services never use it.
pub const OTHER_ERROR: i32 = -10001;

/// Errors that can occur while building, sending or decoding queries
#[derive(Error, Debug)]
pub enum DaasError {
    #[error("Invalid spatial shape: {0}")]
    InvalidSpatialShape(String),

    #[error("Invalid time shape: {0}")]
    InvalidTimeShape(String),

    #[error("Underspecified time: {0}")]
    UnderspecifiedTime(String),

    #[error("Conflicting spatial filter: {0}")]
    ConflictingSpatialFilter(String),

    #[error("Remote query failed with code {code}: {message}")]
    RemoteQuery { code: i32, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("All {0} requests failed")]
    AllRequestsFailed(usize),

    #[error("Unsupported data source family: {0}")]
    UnsupportedDataSourceFamily(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Protobuf decode error: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("Incompatible merge: {0}")]
    IncompatibleMerge(String),

    #[error("Empty selection: {0}")]
    EmptySelection(String),

    #[error("Output error: {0}")]
    Output(String),
}

/// Result type used across the crate
pub type DaasResult<T> = Result<T, DaasError>;

impl DaasError {
    /// Numeric code in the remote service's convention.
    ///
    /// Remote failures keep the code the service sent; everything raised on the client
    /// side maps to [`OTHER_ERROR`].
    pub fn code(&self) -> i32 {
        match self {
            DaasError::RemoteQuery { code, .. } => *code,
            _ => OTHER_ERROR,
        }
    }

    /// True for errors detected before any call was sent.
    pub fn is_pre_send(&self) -> bool {
        matches!(
            self,
            DaasError::InvalidSpatialShape(_)
                | DaasError::InvalidTimeShape(_)
                | DaasError::UnderspecifiedTime(_)
                | DaasError::ConflictingSpatialFilter(_)
                | DaasError::UnsupportedDataSourceFamily(_)
                | DaasError::EmptySelection(_)
        )
    }
}

impl From<reqwest::Error> for DaasError {
    fn from(error: reqwest::Error) -> Self {
        DaasError::Transport(error.to_string())
    }
}

impl From<serde_json::Error> for DaasError {
    fn from(error: serde_json::Error) -> Self {
        DaasError::Config(format!("JSON: {}", error))
    }
}

impl From<serde_yaml::Error> for DaasError {
    fn from(error: serde_yaml::Error) -> Self {
        DaasError::Config(format!("YAML: {}", error))
    }
}

#[cfg(feature = "netcdf")]
impl From<netcdf::Error> for DaasError {
    fn from(error: netcdf::Error) -> Self {
        DaasError::Output(format!("NetCDF: {}", error))
    }
}
