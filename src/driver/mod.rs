//! Driver bindings: the native OpenCL call surface and its lifetime
//!
//! [`ClApi`] mirrors the four discovery entry points of the OpenCL runtime.
//! [`OpenClLibrary`] binds them from the system ICD loader at runtime;
//! [`ScriptedDriver`] answers them from memory. A [`DriverContext`] owns one
//! implementation for the duration of an enumeration pass.

mod library;
mod scripted;

pub use library::{OpenClLibrary, DEFAULT_LIBRARY_PATHS};
pub use scripted::{
    DriverCall, NativeBytes, ScriptedDevice, ScriptedDriver, ScriptedPlatform, ValueQuirk,
};

use std::ffi::c_void;
use std::path::Path;

use crate::discovery::{DiscoveryConfig, Enumerator};
use crate::error::{ClStatus, DiscoveryResult};
use crate::mappings::DeviceType;

/// Opaque `cl_platform_id`
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlatformId(*mut c_void);

impl PlatformId {
    /// Null handle, used to zero-fill handle arrays
    pub const NULL: PlatformId = PlatformId(std::ptr::null_mut());

    /// Wrap a raw handle
    pub fn from_raw(raw: *mut c_void) -> Self {
        PlatformId(raw)
    }

    /// Raw handle for FFI
    pub fn as_raw(self) -> *mut c_void {
        self.0
    }
}

/// Opaque `cl_device_id`
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(*mut c_void);

impl DeviceId {
    /// Null handle, used to zero-fill handle arrays
    pub const NULL: DeviceId = DeviceId(std::ptr::null_mut());

    /// Wrap a raw handle
    pub fn from_raw(raw: *mut c_void) -> Self {
        DeviceId(raw)
    }

    /// Raw handle for FFI
    pub fn as_raw(self) -> *mut c_void {
        self.0
    }
}

/// The native discovery call surface
///
/// Each method follows the OpenCL calling convention: an optional output
/// array or buffer (its length is the capacity passed to the driver) and an
/// optional out-parameter receiving the count or the size in bytes. The
/// returned status is not interpreted here.
pub trait ClApi {
    /// `clGetPlatformIDs`
    fn get_platform_ids(
        &self,
        platforms: Option<&mut [PlatformId]>,
        num_platforms: Option<&mut u32>,
    ) -> ClStatus;

    /// `clGetPlatformInfo`
    fn get_platform_info(
        &self,
        platform: PlatformId,
        param_name: u32,
        param_value: Option<&mut [u8]>,
        param_value_size_ret: Option<&mut usize>,
    ) -> ClStatus;

    /// `clGetDeviceIDs`
    fn get_device_ids(
        &self,
        platform: PlatformId,
        device_type: DeviceType,
        devices: Option<&mut [DeviceId]>,
        num_devices: Option<&mut u32>,
    ) -> ClStatus;

    /// `clGetDeviceInfo`
    fn get_device_info(
        &self,
        device: DeviceId,
        param_name: u32,
        param_value: Option<&mut [u8]>,
        param_value_size_ret: Option<&mut usize>,
    ) -> ClStatus;
}

/// Initialised driver bindings, held for one enumeration pass
///
/// Dropping the context releases the bindings (for [`OpenClLibrary`] this
/// closes the shared library).
pub struct DriverContext<A: ClApi = OpenClLibrary> {
    api: A,
}

impl DriverContext<OpenClLibrary> {
    /// Load the system OpenCL runtime from the default locations
    pub fn load() -> DiscoveryResult<Self> {
        Ok(Self::with_api(OpenClLibrary::load()?))
    }

    /// Load the OpenCL runtime from a specific file
    pub fn load_from(path: &Path) -> DiscoveryResult<Self> {
        Ok(Self::with_api(OpenClLibrary::load_from(path)?))
    }

    /// Load from `path` when given, otherwise from the default locations
    pub fn load_with(path: Option<&Path>) -> DiscoveryResult<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => Self::load(),
        }
    }
}

impl<A: ClApi> DriverContext<A> {
    /// Wrap an already initialised implementation
    pub fn with_api(api: A) -> Self {
        Self { api }
    }

    /// The bound call surface
    pub fn api(&self) -> &A {
        &self.api
    }

    /// Create an enumerator over this driver
    pub fn enumerator(&self, config: DiscoveryConfig) -> Enumerator<'_, A> {
        Enumerator::new(self, config)
    }
}

impl<A: ClApi> Drop for DriverContext<A> {
    fn drop(&mut self) {
        log::debug!("Releasing OpenCL driver context");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_identity_only() {
        let a = PlatformId::from_raw(0x10 as *mut c_void);
        let b = PlatformId::from_raw(0x10 as *mut c_void);
        assert_eq!(a, b);
        assert_ne!(a, PlatformId::NULL);
        assert_eq!(a.as_raw() as usize, 0x10);
        assert_eq!(std::mem::size_of::<DeviceId>(), std::mem::size_of::<*mut c_void>());
    }

    #[test]
    fn test_context_wraps_api() {
        let context = DriverContext::with_api(ScriptedDriver::new());
        assert!(context.api().calls().is_empty());
    }
}
