//! # CLDISCO - OpenCL Platform and Device Discovery
//!
//! A small Rust library for listing the OpenCL platforms installed on a
//! system and the devices each of them exposes.
//!
//! ## Features
//!
//! - **Runtime driver binding**: the ICD loader is opened with `dlopen`, no
//!   link-time OpenCL dependency
//! - **Two-phase queries**: every variable-length attribute is sized by the
//!   driver before it is fetched
//! - **Error reporter**: every non-success status carries its code and the
//!   call site that produced it
//! - **Device classification**: GPU, CPU, Accelerator, Custom, Default
//! - **Streaming text report** and **JSON export**
//! - **Scripted driver** for deterministic tests without OpenCL installed
//!
//! ## Quick Start
//!
//! ```no_run
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let report = cldisco::discover()?;
//!     for platform in &report.platforms {
//!         println!("{} ({} devices)", platform.info.name, platform.devices.len());
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod discovery;
pub mod driver;
pub mod error;
pub mod mappings;
pub mod report;
pub mod selectors;

use std::io::Write;

// Re-export main API for easy access
pub use discovery::{DiscoveryConfig, DiscoveryObserver, Enumerator, FailurePolicy, Verbosity};
pub use driver::{ClApi, DriverContext, OpenClLibrary};
pub use error::{ClStatus, DiscoveryError, DiscoveryResult};
pub use mappings::{classify_device_type, DeviceCategory, DeviceType};
pub use report::{
    DeviceEntry, DeviceInfo, DiscoveryReport, PlatformInfo, PlatformReport, TextReporter,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

fn load_context(config: &DiscoveryConfig) -> DiscoveryResult<DriverContext> {
    config.validate()?;
    DriverContext::load_with(config.library_path.as_deref())
}

/// Enumerate every platform and device with the default configuration
///
/// # Example
///
/// ```no_run
/// match cldisco::discover() {
///     Ok(report) => println!("{} device(s)", report.device_count()),
///     Err(e) => eprintln!("Error: {}", e),
/// }
/// ```
pub fn discover() -> DiscoveryResult<DiscoveryReport> {
    discover_with(&DiscoveryConfig::default())
}

/// Enumerate with a custom configuration
///
/// # Example
///
/// ```no_run
/// use cldisco::{DeviceType, DiscoveryConfig};
///
/// let config = DiscoveryConfig::tolerant().with_device_type(DeviceType::GPU);
/// let report = cldisco::discover_with(&config)?;
/// # Ok::<(), cldisco::DiscoveryError>(())
/// ```
pub fn discover_with(config: &DiscoveryConfig) -> DiscoveryResult<DiscoveryReport> {
    let context = load_context(config)?;
    let report = context.enumerator(config.clone()).collect()?;
    log::info!(
        "Discovered {} platform(s), {} device(s)",
        report.platforms.len(),
        report.device_count()
    );
    Ok(report)
}

/// Stream the text report to `out`
///
/// Lines are written as soon as each attribute set is known, so on a fatal
/// error `out` holds everything reported before the failing call and nothing
/// after it.
///
/// # Example
///
/// ```no_run
/// let stdout = std::io::stdout();
/// cldisco::write_report(&cldisco::DiscoveryConfig::default(), stdout.lock())?;
/// # Ok::<(), cldisco::DiscoveryError>(())
/// ```
pub fn write_report<W: Write>(config: &DiscoveryConfig, out: W) -> DiscoveryResult<()> {
    let context = load_context(config)?;
    let mut reporter = TextReporter::new(out, config.verbosity);
    context.enumerator(config.clone()).run(&mut reporter)?;
    reporter.into_inner().flush()?;
    Ok(())
}

/// Quick check for a usable OpenCL installation
///
/// Returns `true` if the driver loads and reports at least one platform.
///
/// # Example
///
/// ```no_run
/// if cldisco::is_supported() {
///     println!("OpenCL is available");
/// }
/// ```
pub fn is_supported() -> bool {
    is_supported_with(&DiscoveryConfig::default())
}

/// Like [`is_supported`], loading the library `config` points at
///
/// # Example
///
/// ```no_run
/// use cldisco::DiscoveryConfig;
///
/// let config = DiscoveryConfig::default().with_library_path("/opt/rocm/lib/libOpenCL.so");
/// if !cldisco::is_supported_with(&config) {
///     eprintln!("ROCm OpenCL runtime not usable");
/// }
/// ```
pub fn is_supported_with(config: &DiscoveryConfig) -> bool {
    match DriverContext::load_with(config.library_path.as_deref()) {
        Ok(context) => {
            let (status, count) = discovery::probe_platform_count(&context);
            status.is_success() && count > 0
        }
        Err(e) => {
            log::debug!("OpenCL not available: {}", e);
            false
        }
    }
}

/// Get library information
///
/// # Example
///
/// ```no_run
/// println!("Using cldisco v{}", cldisco::version());
/// ```
pub fn version() -> &'static str {
    VERSION
}


/// Prelude module for convenient imports
///
/// # Example
///
/// ```no_run
/// use cldisco::prelude::*;
///
/// let report = discover_with(&DiscoveryConfig::tolerant())?;
/// # Ok::<(), DiscoveryError>(())
/// ```
pub mod prelude {
    pub use crate::discovery::{DiscoveryConfig, DiscoveryObserver, FailurePolicy, Verbosity};
    pub use crate::driver::{ClApi, DriverContext};
    pub use crate::error::{DiscoveryError, DiscoveryResult};
    pub use crate::mappings::{DeviceCategory, DeviceType};
    pub use crate::report::{DeviceEntry, DeviceInfo, DiscoveryReport, PlatformInfo};
    pub use crate::{
        discover, discover_with, is_supported, is_supported_with, version, write_report,
    };
}
