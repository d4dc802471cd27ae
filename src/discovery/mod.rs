//! Platform and device enumeration engine
//!
//! Every variable-length attribute (and every handle list) is fetched with
//! the same two calls: a size phase that asks the driver how much room the
//! value needs, then a value phase into a zero-filled buffer of exactly that
//! size. Fixed-size attributes skip the size phase.

mod observer;

pub use observer::{DiscoveryObserver, ReportCollector};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cl_check;
use crate::driver::{ClApi, DeviceId, DriverContext, PlatformId};
use crate::error::{ClStatus, DiscoveryError, DiscoveryResult};
use crate::mappings::DeviceType;
use crate::report::{DeviceInfo, DiscoveryReport, PlatformInfo};
use crate::selectors::{decode_c_string, DeviceAttribute, FixedSizeValue, PlatformAttribute};

/// What to do when a single device cannot be queried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Any failure ends the run
    #[default]
    Abort,
    /// Record the failing device and continue with its siblings
    IsolateDevices,
}

/// Verbosity level for the text report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verbosity {
    /// Name, vendor, type, memory, driver version and profile
    #[default]
    Normal,
    /// Every attribute the enumerator collects
    Detailed,
}

/// Discovery configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Text report verbosity
    pub verbosity: Verbosity,
    /// Device types requested from `clGetDeviceIDs`
    pub device_type: DeviceType,
    /// Failure handling for device attribute queries
    pub failure_policy: FailurePolicy,
    /// Explicit OpenCL library to load instead of the default search
    pub library_path: Option<PathBuf>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            verbosity: Verbosity::Normal,
            device_type: DeviceType::ALL,
            failure_policy: FailurePolicy::Abort,
            library_path: None,
        }
    }
}

impl DiscoveryConfig {
    /// All-or-nothing enumeration (the default)
    pub fn strict() -> Self {
        Self::default()
    }

    /// Keep enumerating when a device fails, report everything
    pub fn tolerant() -> Self {
        Self {
            verbosity: Verbosity::Detailed,
            failure_policy: FailurePolicy::IsolateDevices,
            ..Self::default()
        }
    }

    /// Set the device type filter
    pub fn with_device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = device_type;
        self
    }

    /// Set the failure policy
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Set the report verbosity
    pub fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set the OpenCL library path
    pub fn with_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.library_path = Some(path.into());
        self
    }

    /// Load a configuration from a JSON file; missing fields take defaults
    pub fn from_json_file(path: &Path) -> DiscoveryResult<Self> {
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot produce a report
    pub fn validate(&self) -> DiscoveryResult<()> {
        if self.device_type.bits() == 0 {
            return Err(DiscoveryError::Config(
                "device_type must select at least one type".to_string(),
            ));
        }
        Ok(())
    }
}

/// Walks platforms and devices of one driver
pub struct Enumerator<'ctx, A: ClApi> {
    context: &'ctx DriverContext<A>,
    config: DiscoveryConfig,
}

impl<'ctx, A: ClApi> Enumerator<'ctx, A> {
    /// Create an enumerator over `context`
    pub fn new(context: &'ctx DriverContext<A>, config: DiscoveryConfig) -> Self {
        Self { context, config }
    }

    /// Active configuration
    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    fn api(&self) -> &'ctx A {
        self.context.api()
    }

    /// All platform handles, in driver order
    pub fn platform_ids(&self) -> DiscoveryResult<Vec<PlatformId>> {
        let mut count = 0u32;
        cl_check!("clGetPlatformIDs", self.api().get_platform_ids(None, Some(&mut count)))?;
        log::debug!("clGetPlatformIDs reported {} platform(s)", count);

        if count == 0 {
            return Ok(Vec::new());
        }

        let mut platforms = vec![PlatformId::NULL; count as usize];
        cl_check!(
            "clGetPlatformIDs",
            self.api().get_platform_ids(Some(platforms.as_mut_slice()), None)
        )?;

        Ok(platforms)
    }

    /// Device handles of `platform` matching the configured device type
    pub fn device_ids(&self, platform: PlatformId) -> DiscoveryResult<Vec<DeviceId>> {
        let device_type = self.config.device_type;

        let mut count = 0u32;
        cl_check!(
            "clGetDeviceIDs",
            self.api().get_device_ids(platform, device_type, None, Some(&mut count))
        )?;
        log::debug!("clGetDeviceIDs reported {} device(s) for {:?}", count, platform);

        if count == 0 {
            return Ok(Vec::new());
        }

        let mut devices = vec![DeviceId::NULL; count as usize];
        cl_check!(
            "clGetDeviceIDs",
            self.api().get_device_ids(platform, device_type, Some(devices.as_mut_slice()), None)
        )?;

        Ok(devices)
    }

    /// Raw bytes of a platform attribute, fetched with the two-phase protocol
    pub fn query_platform_attribute(
        &self,
        platform: PlatformId,
        attribute: PlatformAttribute,
    ) -> DiscoveryResult<Vec<u8>> {
        let api = self.api();

        let mut size = 0usize;
        cl_check!(
            "clGetPlatformInfo",
            api.get_platform_info(platform, attribute.0, None, Some(&mut size))
        )?;

        if size == 0 {
            return Ok(Vec::new());
        }

        let mut value = vec![0u8; size];
        let mut written = 0usize;
        cl_check!(
            "clGetPlatformInfo",
            api.get_platform_info(
                platform,
                attribute.0,
                Some(value.as_mut_slice()),
                Some(&mut written)
            )
        )?;

        log::debug!("{} of {:?}: {} byte(s)", attribute, platform, size);
        check_written(written, size, &attribute.to_string())?;
        Ok(value)
    }

    /// Raw bytes of a device attribute, fetched with the two-phase protocol
    pub fn query_device_attribute(
        &self,
        device: DeviceId,
        attribute: DeviceAttribute,
    ) -> DiscoveryResult<Vec<u8>> {
        let api = self.api();

        let mut size = 0usize;
        cl_check!(
            "clGetDeviceInfo",
            api.get_device_info(device, attribute.0, None, Some(&mut size))
        )?;

        if size == 0 {
            return Ok(Vec::new());
        }

        let mut value = vec![0u8; size];
        let mut written = 0usize;
        cl_check!(
            "clGetDeviceInfo",
            api.get_device_info(
                device,
                attribute.0,
                Some(value.as_mut_slice()),
                Some(&mut written)
            )
        )?;

        log::debug!("{} of {:?}: {} byte(s)", attribute, device, size);
        check_written(written, size, &attribute.to_string())?;
        Ok(value)
    }

    /// String-valued platform attribute
    pub fn platform_string(
        &self,
        platform: PlatformId,
        attribute: PlatformAttribute,
    ) -> DiscoveryResult<String> {
        Ok(decode_c_string(&self.query_platform_attribute(platform, attribute)?))
    }

    /// String-valued device attribute
    pub fn device_string(
        &self,
        device: DeviceId,
        attribute: DeviceAttribute,
    ) -> DiscoveryResult<String> {
        Ok(decode_c_string(&self.query_device_attribute(device, attribute)?))
    }

    /// Fixed-size device attribute; no size phase
    pub fn device_value<T: FixedSizeValue>(
        &self,
        device: DeviceId,
        attribute: DeviceAttribute,
    ) -> DiscoveryResult<T> {
        let mut value = vec![0u8; T::WIDTH];
        let mut written = 0usize;
        cl_check!(
            "clGetDeviceInfo",
            self.api().get_device_info(
                device,
                attribute.0,
                Some(value.as_mut_slice()),
                Some(&mut written)
            )
        )?;

        if written != T::WIDTH {
            return Err(DiscoveryError::Protocol(format!(
                "{} returned {} byte(s), expected {}",
                attribute,
                written,
                T::WIDTH
            )));
        }

        T::from_ne_slice(&value).ok_or_else(|| {
            DiscoveryError::Protocol(format!("{} could not be decoded", attribute))
        })
    }

    /// Fixed attribute set of one platform
    pub fn platform_info(&self, platform: PlatformId) -> DiscoveryResult<PlatformInfo> {
        let extensions = self.platform_string(platform, PlatformAttribute::EXTENSIONS)?;

        Ok(PlatformInfo {
            name: self.platform_string(platform, PlatformAttribute::NAME)?,
            vendor: self.platform_string(platform, PlatformAttribute::VENDOR)?,
            version: self.platform_string(platform, PlatformAttribute::VERSION)?,
            profile: self.platform_string(platform, PlatformAttribute::PROFILE)?,
            extensions: extensions.split_whitespace().map(str::to_string).collect(),
        })
    }

    /// Fixed attribute set of one device
    pub fn device_info(&self, device: DeviceId) -> DiscoveryResult<DeviceInfo> {
        let name = self.device_string(device, DeviceAttribute::NAME)?;
        let device_type = DeviceType(self.device_value::<u64>(device, DeviceAttribute::TYPE)?);

        Ok(DeviceInfo {
            name,
            vendor: self.device_string(device, DeviceAttribute::VENDOR)?,
            device_type,
            category: device_type.classify(),
            global_mem_size: self.device_value(device, DeviceAttribute::GLOBAL_MEM_SIZE)?,
            local_mem_size: self.device_value(device, DeviceAttribute::LOCAL_MEM_SIZE)?,
            max_mem_alloc_size: self.device_value(device, DeviceAttribute::MAX_MEM_ALLOC_SIZE)?,
            max_compute_units: self.device_value(device, DeviceAttribute::MAX_COMPUTE_UNITS)?,
            max_clock_frequency: self.device_value(device, DeviceAttribute::MAX_CLOCK_FREQUENCY)?,
            max_work_group_size: self.device_value(device, DeviceAttribute::MAX_WORK_GROUP_SIZE)?,
            driver_version: self.device_string(device, DeviceAttribute::DRIVER_VERSION)?,
            profile: self.device_string(device, DeviceAttribute::PROFILE)?,
            version: self.device_string(device, DeviceAttribute::VERSION)?,
        })
    }

    /// Enumerate everything, feeding `observer` as results become available
    ///
    /// Under [`FailurePolicy::Abort`] the first error ends the walk and no
    /// further events are emitted.
    pub fn run<O: DiscoveryObserver + ?Sized>(&self, observer: &mut O) -> DiscoveryResult<()> {
        let platforms = self.platform_ids()?;
        observer.platforms_found(platforms.len())?;

        for (platform_index, &platform) in platforms.iter().enumerate() {
            let platform_info = self.platform_info(platform)?;
            observer.platform(platform_index, platforms.len(), &platform_info)?;

            let devices = self.device_ids(platform)?;
            for (device_index, &device) in devices.iter().enumerate() {
                match self.device_info(device) {
                    Ok(info) => observer.device(device_index, devices.len(), &info)?,
                    Err(e) if self.config.failure_policy == FailurePolicy::IsolateDevices => {
                        log::warn!(
                            "Skipping device {}/{} of platform '{}': {}",
                            device_index + 1,
                            devices.len(),
                            platform_info.name,
                            e
                        );
                        observer.device_failed(device_index, devices.len(), &e)?;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(())
    }

    /// Enumerate everything into a [`DiscoveryReport`]
    pub fn collect(&self) -> DiscoveryResult<DiscoveryReport> {
        let mut collector = ReportCollector::new();
        self.run(&mut collector)?;
        Ok(collector.finish())
    }
}

fn check_written(written: usize, allocated: usize, attribute: &str) -> DiscoveryResult<()> {
    if written > allocated {
        return Err(DiscoveryError::Protocol(format!(
            "{attribute} wrote {written} byte(s) into a {allocated} byte buffer"
        )));
    }
    Ok(())
}

/// Status of the driver's answer to a count query, for callers that want to
/// probe without failing (e.g. [`crate::is_supported`])
pub fn probe_platform_count<A: ClApi>(context: &DriverContext<A>) -> (ClStatus, u32) {
    let mut count = 0u32;
    let status = context.api().get_platform_ids(None, Some(&mut count));
    (status, count)
}
