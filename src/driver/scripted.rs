//! In-memory driver that answers discovery calls from a fixed description
//!
//! Used by tests, benchmarks and demos to exercise the enumerator without an
//! OpenCL runtime. It follows the argument validation rules of the real
//! entry points and records every call so the query protocol can be checked.

use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::c_void;

use super::{ClApi, DeviceId, PlatformId};
use crate::error::ClStatus;
use crate::mappings::DeviceType;
use crate::selectors::{DeviceAttribute, PlatformAttribute};

/// One call received by a [`ScriptedDriver`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverCall {
    /// `clGetPlatformIDs` with the given array capacity (`None` = no array)
    PlatformIds {
        /// Length of the handle array passed in
        capacity: Option<usize>,
    },
    /// `clGetPlatformInfo`
    PlatformInfo {
        /// Index of the queried platform
        platform: usize,
        /// Selector value
        param: u32,
        /// Length of the value buffer passed in
        capacity: Option<usize>,
    },
    /// `clGetDeviceIDs`
    DeviceIds {
        /// Index of the platform
        platform: usize,
        /// Length of the handle array passed in
        capacity: Option<usize>,
    },
    /// `clGetDeviceInfo`
    DeviceInfo {
        /// Index of the platform owning the device
        platform: usize,
        /// Index of the device within its platform
        device: usize,
        /// Selector value
        param: u32,
        /// Length of the value buffer passed in
        capacity: Option<usize>,
    },
}

/// Deviation from a well-behaved answer for one selector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueQuirk {
    /// Size phase succeeds, value phase returns the status
    FailValuePhase(ClStatus),
    /// Size phase reports this size instead of the stored length
    ReportSize(usize),
    /// Value phase claims this many more bytes than it wrote
    OverstateWritten(usize),
}

/// Scripted device: a map from selector to raw value bytes
#[derive(Debug, Clone, Default)]
pub struct ScriptedDevice {
    device_type: u64,
    attributes: HashMap<u32, Vec<u8>>,
    quirks: HashMap<u32, ValueQuirk>,
}

impl ScriptedDevice {
    /// Device with the attributes the enumerator reads by default
    pub fn new(name: &str, device_type: DeviceType, global_mem_size: u64) -> Self {
        Self::empty()
            .with_type(device_type)
            .with_string(DeviceAttribute::NAME, name)
            .with_string(DeviceAttribute::VENDOR, "Scripted Vendor")
            .with_string(DeviceAttribute::DRIVER_VERSION, "1.0")
            .with_string(DeviceAttribute::PROFILE, "FULL_PROFILE")
            .with_string(DeviceAttribute::VERSION, "OpenCL 3.0")
            .with_value(DeviceAttribute::GLOBAL_MEM_SIZE, global_mem_size)
            .with_value(DeviceAttribute::LOCAL_MEM_SIZE, 64 * 1024u64)
            .with_value(DeviceAttribute::MAX_MEM_ALLOC_SIZE, global_mem_size / 4)
            .with_value(DeviceAttribute::MAX_COMPUTE_UNITS, 8u32)
            .with_value(DeviceAttribute::MAX_CLOCK_FREQUENCY, 1500u32)
            .with_value(DeviceAttribute::MAX_WORK_GROUP_SIZE, 1024usize)
    }

    /// Device without any attribute
    pub fn empty() -> Self {
        Self::default()
    }

    /// Set `CL_DEVICE_TYPE`
    pub fn with_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = device_type.bits();
        self.attributes.insert(
            DeviceAttribute::TYPE.0,
            device_type.bits().to_ne_bytes().to_vec(),
        );
        self
    }

    /// Set a string attribute (stored NUL-terminated)
    pub fn with_string(self, attribute: DeviceAttribute, value: &str) -> Self {
        self.with_bytes(attribute, c_string_bytes(value))
    }

    /// Set a fixed-size numeric attribute
    pub fn with_value<T: NativeBytes>(self, attribute: DeviceAttribute, value: T) -> Self {
        self.with_bytes(attribute, value.native_bytes())
    }

    /// Set raw attribute bytes
    pub fn with_bytes(mut self, attribute: DeviceAttribute, bytes: Vec<u8>) -> Self {
        self.attributes.insert(attribute.0, bytes);
        self
    }

    /// Remove an attribute so that querying it fails with `CL_INVALID_VALUE`
    pub fn without(mut self, attribute: DeviceAttribute) -> Self {
        self.attributes.remove(&attribute.0);
        self
    }

    /// Answer queries of `attribute` with `quirk`
    pub fn with_quirk(mut self, attribute: DeviceAttribute, quirk: ValueQuirk) -> Self {
        self.quirks.insert(attribute.0, quirk);
        self
    }
}

/// Scripted platform with its devices
#[derive(Debug, Clone, Default)]
pub struct ScriptedPlatform {
    attributes: HashMap<u32, Vec<u8>>,
    quirks: HashMap<u32, ValueQuirk>,
    devices: Vec<ScriptedDevice>,
}

impl ScriptedPlatform {
    /// Platform with name, vendor and the usual version strings
    pub fn new(name: &str, vendor: &str) -> Self {
        Self::default()
            .with_string(PlatformAttribute::NAME, name)
            .with_string(PlatformAttribute::VENDOR, vendor)
            .with_string(PlatformAttribute::VERSION, "OpenCL 3.0")
            .with_string(PlatformAttribute::PROFILE, "FULL_PROFILE")
            .with_string(PlatformAttribute::EXTENSIONS, "cl_khr_icd cl_khr_fp64")
    }

    /// Set a string attribute (stored NUL-terminated)
    pub fn with_string(mut self, attribute: PlatformAttribute, value: &str) -> Self {
        self.attributes.insert(attribute.0, c_string_bytes(value));
        self
    }

    /// Remove an attribute so that querying it fails with `CL_INVALID_VALUE`
    pub fn without(mut self, attribute: PlatformAttribute) -> Self {
        self.attributes.remove(&attribute.0);
        self
    }

    /// Answer queries of `attribute` with `quirk`
    pub fn with_quirk(mut self, attribute: PlatformAttribute, quirk: ValueQuirk) -> Self {
        self.quirks.insert(attribute.0, quirk);
        self
    }

    /// Append a device
    pub fn with_device(mut self, device: ScriptedDevice) -> Self {
        self.devices.push(device);
        self
    }
}

/// [`ClApi`] implementation backed by scripted platforms
#[derive(Debug, Default)]
pub struct ScriptedDriver {
    platforms: Vec<ScriptedPlatform>,
    platform_ids_status: Option<ClStatus>,
    calls: RefCell<Vec<DriverCall>>,
}

impl ScriptedDriver {
    /// Driver without platforms
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a platform
    pub fn with_platform(mut self, platform: ScriptedPlatform) -> Self {
        self.platforms.push(platform);
        self
    }

    /// Make every `clGetPlatformIDs` call return `status`
    pub fn failing_platform_ids(mut self, status: ClStatus) -> Self {
        self.platform_ids_status = Some(status);
        self
    }

    /// Calls received so far, in order
    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.borrow().clone()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.calls.borrow_mut().clear();
    }

    /// Handle of platform `index`
    pub fn platform_id(index: usize) -> PlatformId {
        PlatformId::from_raw(((index + 1) << 16) as *mut c_void)
    }

    /// Handle of device `device` on platform `platform`
    pub fn device_id(platform: usize, device: usize) -> DeviceId {
        DeviceId::from_raw((((platform + 1) << 16) | (device + 1)) as *mut c_void)
    }

    fn record(&self, call: DriverCall) {
        self.calls.borrow_mut().push(call);
    }

    fn platform_index(&self, platform: PlatformId) -> Option<usize> {
        let raw = platform.as_raw() as usize;
        if raw & 0xFFFF != 0 {
            return None;
        }
        let index = (raw >> 16).checked_sub(1)?;
        (index < self.platforms.len()).then_some(index)
    }

    fn device_index(&self, device: DeviceId) -> Option<(usize, usize)> {
        let raw = device.as_raw() as usize;
        let platform = (raw >> 16).checked_sub(1)?;
        let device = (raw & 0xFFFF).checked_sub(1)?;
        let devices = &self.platforms.get(platform)?.devices;
        (device < devices.len()).then_some((platform, device))
    }
}

impl ClApi for ScriptedDriver {
    fn get_platform_ids(
        &self,
        platforms: Option<&mut [PlatformId]>,
        num_platforms: Option<&mut u32>,
    ) -> ClStatus {
        self.record(DriverCall::PlatformIds {
            capacity: platforms.as_ref().map(|p| p.len()),
        });

        if let Some(status) = self.platform_ids_status {
            return status;
        }

        fill_handles(
            platforms,
            num_platforms,
            (0..self.platforms.len()).map(Self::platform_id),
        )
    }

    fn get_platform_info(
        &self,
        platform: PlatformId,
        param_name: u32,
        param_value: Option<&mut [u8]>,
        param_value_size_ret: Option<&mut usize>,
    ) -> ClStatus {
        let index = self.platform_index(platform);
        self.record(DriverCall::PlatformInfo {
            platform: index.unwrap_or(usize::MAX),
            param: param_name,
            capacity: param_value.as_ref().map(|v| v.len()),
        });

        let Some(index) = index else {
            return ClStatus::INVALID_PLATFORM;
        };

        let platform = &self.platforms[index];
        match platform.attributes.get(&param_name) {
            Some(data) => copy_value(
                data,
                platform.quirks.get(&param_name).copied(),
                param_value,
                param_value_size_ret,
            ),
            None => ClStatus::INVALID_VALUE,
        }
    }

    fn get_device_ids(
        &self,
        platform: PlatformId,
        device_type: DeviceType,
        devices: Option<&mut [DeviceId]>,
        num_devices: Option<&mut u32>,
    ) -> ClStatus {
        let index = self.platform_index(platform);
        self.record(DriverCall::DeviceIds {
            platform: index.unwrap_or(usize::MAX),
            capacity: devices.as_ref().map(|d| d.len()),
        });

        let Some(index) = index else {
            return ClStatus::INVALID_PLATFORM;
        };
        if device_type.bits() == 0 {
            return ClStatus::INVALID_DEVICE_TYPE;
        }

        let matching: Vec<DeviceId> = self.platforms[index]
            .devices
            .iter()
            .enumerate()
            .filter(|(_, d)| {
                device_type == DeviceType::ALL || d.device_type & device_type.bits() != 0
            })
            .map(|(i, _)| Self::device_id(index, i))
            .collect();

        if matching.is_empty() {
            return ClStatus::DEVICE_NOT_FOUND;
        }

        fill_handles(devices, num_devices, matching.into_iter())
    }

    fn get_device_info(
        &self,
        device: DeviceId,
        param_name: u32,
        param_value: Option<&mut [u8]>,
        param_value_size_ret: Option<&mut usize>,
    ) -> ClStatus {
        let location = self.device_index(device);
        let (platform, index) = location.unwrap_or((usize::MAX, usize::MAX));
        self.record(DriverCall::DeviceInfo {
            platform,
            device: index,
            param: param_name,
            capacity: param_value.as_ref().map(|v| v.len()),
        });

        if location.is_none() {
            return ClStatus::INVALID_DEVICE;
        }

        let device = &self.platforms[platform].devices[index];
        match device.attributes.get(&param_name) {
            Some(data) => copy_value(
                data,
                device.quirks.get(&param_name).copied(),
                param_value,
                param_value_size_ret,
            ),
            None => ClStatus::INVALID_VALUE,
        }
    }
}

/// Numbers that can be stored as scripted attribute bytes
pub trait NativeBytes {
    /// Native-endian representation
    fn native_bytes(self) -> Vec<u8>;
}

macro_rules! impl_native_bytes {
    ($($ty:ty),*) => {
        $(
            impl NativeBytes for $ty {
                fn native_bytes(self) -> Vec<u8> {
                    self.to_ne_bytes().to_vec()
                }
            }
        )*
    };
}

impl_native_bytes!(u32, u64, usize);

fn c_string_bytes(value: &str) -> Vec<u8> {
    let mut bytes = value.as_bytes().to_vec();
    bytes.push(0);
    bytes
}

/// `clGet*IDs` argument rules: at least one output, non-empty array if given
fn fill_handles<T: Copy>(
    out: Option<&mut [T]>,
    count_out: Option<&mut u32>,
    handles: impl Iterator<Item = T>,
) -> ClStatus {
    if out.is_none() && count_out.is_none() {
        return ClStatus::INVALID_VALUE;
    }

    let handles: Vec<T> = handles.collect();

    if let Some(out) = out {
        if out.is_empty() {
            return ClStatus::INVALID_VALUE;
        }
        for (slot, handle) in out.iter_mut().zip(&handles) {
            *slot = *handle;
        }
    }

    if let Some(count_out) = count_out {
        *count_out = handles.len() as u32;
    }

    ClStatus::SUCCESS
}

/// `clGet*Info` argument rules: a buffer smaller than the value is an error
fn copy_value(
    data: &[u8],
    quirk: Option<ValueQuirk>,
    out: Option<&mut [u8]>,
    size_out: Option<&mut usize>,
) -> ClStatus {
    let mut reported = data.len();

    match out {
        Some(out) => {
            if let Some(ValueQuirk::FailValuePhase(status)) = quirk {
                return status;
            }
            if out.len() < data.len() {
                return ClStatus::INVALID_VALUE;
            }
            out[..data.len()].copy_from_slice(data);
            if let Some(ValueQuirk::OverstateWritten(extra)) = quirk {
                reported += extra;
            }
        }
        None => {
            if let Some(ValueQuirk::ReportSize(size)) = quirk {
                reported = size;
            }
        }
    }

    if let Some(size_out) = size_out {
        *size_out = reported;
    }

    ClStatus::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver() -> ScriptedDriver {
        ScriptedDriver::new().with_platform(
            ScriptedPlatform::new("Test Platform", "Test Vendor")
                .with_device(ScriptedDevice::new("cpu0", DeviceType::CPU, 1 << 30))
                .with_device(ScriptedDevice::new("gpu0", DeviceType::GPU, 1 << 32)),
        )
    }

    #[test]
    fn test_platform_count_and_handles() {
        let driver = driver();
        let mut count = 0;
        assert_eq!(driver.get_platform_ids(None, Some(&mut count)), ClStatus::SUCCESS);
        assert_eq!(count, 1);

        let mut ids = [PlatformId::NULL; 1];
        assert_eq!(driver.get_platform_ids(Some(&mut ids[..]), None), ClStatus::SUCCESS);
        assert_eq!(ids[0], ScriptedDriver::platform_id(0));

        assert_eq!(driver.get_platform_ids(None, None), ClStatus::INVALID_VALUE);
        assert_eq!(driver.get_platform_ids(Some(&mut [][..]), None), ClStatus::INVALID_VALUE);
    }

    #[test]
    fn test_info_rejects_short_buffer() {
        let driver = driver();
        let platform = ScriptedDriver::platform_id(0);
        let mut size = 0;
        let status =
            driver.get_platform_info(platform, PlatformAttribute::NAME.0, None, Some(&mut size));
        assert_eq!(status, ClStatus::SUCCESS);
        assert_eq!(size, "Test Platform".len() + 1);

        let mut short = vec![0u8; size - 1];
        let status = driver.get_platform_info(
            platform,
            PlatformAttribute::NAME.0,
            Some(short.as_mut_slice()),
            None,
        );
        assert_eq!(status, ClStatus::INVALID_VALUE);
    }

    #[test]
    fn test_device_type_filter() {
        let driver = driver();
        let platform = ScriptedDriver::platform_id(0);

        let mut count = 0;
        driver.get_device_ids(platform, DeviceType::GPU, None, Some(&mut count));
        assert_eq!(count, 1);

        let status =
            driver.get_device_ids(platform, DeviceType::ACCELERATOR, None, Some(&mut count));
        assert_eq!(status, ClStatus::DEVICE_NOT_FOUND);
    }

    #[test]
    fn test_invalid_handles() {
        let driver = driver();
        let bogus_platform = ScriptedDriver::platform_id(7);
        let bogus_device = ScriptedDriver::device_id(0, 5);
        let mut size = 0;

        assert_eq!(
            driver.get_platform_info(
                bogus_platform,
                PlatformAttribute::NAME.0,
                None,
                Some(&mut size)
            ),
            ClStatus::INVALID_PLATFORM
        );
        assert_eq!(
            driver.get_device_info(bogus_device, DeviceAttribute::NAME.0, None, Some(&mut size)),
            ClStatus::INVALID_DEVICE
        );
        assert_eq!(driver.calls().len(), 2);
    }

    #[test]
    fn test_quirks_apply_to_their_phase_only() {
        let driver = ScriptedDriver::new().with_platform(
            ScriptedPlatform::new("p", "v").with_device(
                ScriptedDevice::new("d", DeviceType::GPU, 1)
                    .with_quirk(DeviceAttribute::NAME, ValueQuirk::ReportSize(8))
                    .with_quirk(
                        DeviceAttribute::VENDOR,
                        ValueQuirk::FailValuePhase(ClStatus::INVALID_DEVICE),
                    ),
            ),
        );
        let device = ScriptedDriver::device_id(0, 0);
        let mut size = 0;
        let mut buffer = vec![0u8; 16];

        driver.get_device_info(device, DeviceAttribute::NAME.0, None, Some(&mut size));
        assert_eq!(size, 8);
        let status = driver.get_device_info(
            device,
            DeviceAttribute::NAME.0,
            Some(buffer.as_mut_slice()),
            Some(&mut size),
        );
        assert_eq!(status, ClStatus::SUCCESS);
        assert_eq!(size, 2);

        let status =
            driver.get_device_info(device, DeviceAttribute::VENDOR.0, None, Some(&mut size));
        assert_eq!(status, ClStatus::SUCCESS);
        let status = driver.get_device_info(
            device,
            DeviceAttribute::VENDOR.0,
            Some(buffer.as_mut_slice()),
            None,
        );
        assert_eq!(status, ClStatus::INVALID_DEVICE);
    }
}
