//! Error types for the cldisco library
//!
//! Every native OpenCL call returns a status code. [`report_error`] (usually
//! reached through the [`cl_check!`](crate::cl_check) macro) turns a
//! non-success status into a [`DiscoveryError::Native`] that remembers where
//! the call was made.

use std::fmt;
use std::io;
use thiserror::Error;

use crate::mappings::status_name;

/// Status code returned by an OpenCL entry point (`cl_int`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct ClStatus(pub i32);

impl ClStatus {
    /// `CL_SUCCESS`, the only status treated as success
    pub const SUCCESS: ClStatus = ClStatus(0);
    /// `CL_DEVICE_NOT_FOUND`
    pub const DEVICE_NOT_FOUND: ClStatus = ClStatus(-1);
    /// `CL_INVALID_VALUE`
    pub const INVALID_VALUE: ClStatus = ClStatus(-30);
    /// `CL_INVALID_DEVICE_TYPE`
    pub const INVALID_DEVICE_TYPE: ClStatus = ClStatus(-31);
    /// `CL_INVALID_PLATFORM`
    pub const INVALID_PLATFORM: ClStatus = ClStatus(-32);
    /// `CL_INVALID_DEVICE`
    pub const INVALID_DEVICE: ClStatus = ClStatus(-33);
    /// `CL_PLATFORM_NOT_FOUND_KHR`, returned by ICD loaders with no vendors installed
    pub const PLATFORM_NOT_FOUND_KHR: ClStatus = ClStatus(-1001);

    /// Raw numeric code
    pub fn code(self) -> i32 {
        self.0
    }

    /// Whether this is `CL_SUCCESS`
    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }

    /// Symbolic `CL_*` name, if the code is a known one
    pub fn name(self) -> Option<&'static str> {
        status_name(self.0)
    }
}

impl From<i32> for ClStatus {
    fn from(code: i32) -> Self {
        ClStatus(code)
    }
}

impl fmt::Display for ClStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} ({})", self.0, name),
            None => write!(f, "{} (unknown status)", self.0),
        }
    }
}

/// Source location of a native call, captured with `file!()` / `line!()`
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct CallSite {
    /// Source file of the call
    pub file: &'static str,
    /// Line within `file`
    pub line: u32,
    /// Name of the OpenCL entry point
    pub call: &'static str,
}

impl CallSite {
    /// Create a call site tag
    pub const fn new(file: &'static str, line: u32, call: &'static str) -> Self {
        Self { file, line, call }
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.file, self.line, self.call)
    }
}

/// Main error type for cldisco operations
#[derive(Error, Debug)]
pub enum DiscoveryError {
    /// The OpenCL runtime could not be loaded or bound
    #[error("Can't init OpenCL driver: {0}")]
    DriverUnavailable(String),

    /// A native call returned a status other than `CL_SUCCESS`
    #[error("OpenCL error code {status} encountered at {site}")]
    Native {
        /// Status returned by the driver
        status: ClStatus,
        /// Where the call was issued
        site: CallSite,
    },

    /// The driver answered a query inconsistently (size phase vs value phase)
    #[error("Driver protocol violation: {0}")]
    Protocol(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Writing the report failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DiscoveryError {
    /// Native status carried by this error, if it came from a driver call
    pub fn status(&self) -> Option<ClStatus> {
        match self {
            DiscoveryError::Native { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Call site carried by this error, if it came from a driver call
    pub fn call_site(&self) -> Option<CallSite> {
        match self {
            DiscoveryError::Native { site, .. } => Some(*site),
            _ => None,
        }
    }
}

/// Result type for cldisco operations
pub type DiscoveryResult<T> = std::result::Result<T, DiscoveryError>;

/// Pass `CL_SUCCESS` through, turn anything else into [`DiscoveryError::Native`].
pub fn report_error(status: ClStatus, site: CallSite) -> DiscoveryResult<()> {
    if status.is_success() {
        return Ok(());
    }

    Err(DiscoveryError::Native { status, site })
}

/// Check the status of a native call, tagging failures with the current source location.
///
/// ```
/// use cldisco::cl_check;
/// use cldisco::error::ClStatus;
///
/// assert!(cl_check!("clGetPlatformIDs", ClStatus::SUCCESS).is_ok());
///
/// let err = cl_check!("clGetPlatformIDs", ClStatus(-30)).unwrap_err();
/// assert!(err.to_string().contains("-30"));
/// ```
#[macro_export]
macro_rules! cl_check {
    ($call:expr, $status:expr) => {
        $crate::error::report_error(
            $status,
            $crate::error::CallSite::new(file!(), line!(), $call),
        )
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_success_passes_through() {
        let site = CallSite::new("main.rs", 1, "clGetPlatformIDs");
        assert!(report_error(ClStatus::SUCCESS, site).is_ok());
    }

    #[rstest]
    #[case(-1)]
    #[case(-30)]
    #[case(-33)]
    #[case(-1001)]
    #[case(1)]
    #[case(-424242)]
    fn test_failure_embeds_code(#[case] code: i32) {
        let site = CallSite::new("src/discovery/mod.rs", 42, "clGetDeviceInfo");
        let err = report_error(ClStatus(code), site).unwrap_err();

        assert_eq!(err.status(), Some(ClStatus(code)));
        assert_eq!(err.call_site(), Some(site));

        let message = err.to_string();
        assert!(message.contains(&code.to_string()), "{message}");
        assert!(message.contains("src/discovery/mod.rs:42"), "{message}");
    }

    #[test]
    fn test_message_names_known_codes() {
        let site = CallSite::new("main.rs", 7, "clGetPlatformInfo");
        let err = report_error(ClStatus::INVALID_VALUE, site).unwrap_err();
        assert_eq!(
            err.to_string(),
            "OpenCL error code -30 (CL_INVALID_VALUE) encountered at main.rs:7 (clGetPlatformInfo)"
        );
    }

    #[test]
    fn test_macro_captures_location() {
        let err = cl_check!("clGetDeviceIDs", ClStatus::DEVICE_NOT_FOUND).unwrap_err();
        let site = err.call_site().unwrap();
        assert_eq!(site.file, file!());
        assert_eq!(site.call, "clGetDeviceIDs");
        assert!(site.line > 0);
    }

    #[test]
    fn test_unknown_status_display() {
        assert_eq!(ClStatus(-9999).to_string(), "-9999 (unknown status)");
    }
}
