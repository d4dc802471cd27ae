//! Runtime binding of the system OpenCL ICD loader

use std::ffi::{c_void, CStr, CString};
use std::path::Path;
use std::ptr;

use super::{ClApi, DeviceId, PlatformId};
use crate::error::{ClStatus, DiscoveryError, DiscoveryResult};
use crate::mappings::DeviceType;

/// Library names tried by [`OpenClLibrary::load`], in order
pub const DEFAULT_LIBRARY_PATHS: &[&str] = &[
    "libOpenCL.so.1",
    "libOpenCL.so",
    "/usr/lib/x86_64-linux-gnu/libOpenCL.so.1",
    "/system/vendor/lib64/libOpenCL.so",
    "/System/Library/Frameworks/OpenCL.framework/OpenCL",
];

type ClGetPlatformIdsFn = unsafe extern "C" fn(u32, *mut PlatformId, *mut u32) -> i32;
type ClGetPlatformInfoFn =
    unsafe extern "C" fn(PlatformId, u32, usize, *mut c_void, *mut usize) -> i32;
type ClGetDeviceIdsFn = unsafe extern "C" fn(PlatformId, u64, u32, *mut DeviceId, *mut u32) -> i32;
type ClGetDeviceInfoFn = unsafe extern "C" fn(DeviceId, u32, usize, *mut c_void, *mut usize) -> i32;

/// OpenCL runtime bound with `dlopen` / `dlsym`
pub struct OpenClLibrary {
    handle: *mut c_void,
    path: String,
    cl_get_platform_ids: ClGetPlatformIdsFn,
    cl_get_platform_info: ClGetPlatformInfoFn,
    cl_get_device_ids: ClGetDeviceIdsFn,
    cl_get_device_info: ClGetDeviceInfoFn,
}

impl OpenClLibrary {
    /// Try every entry of [`DEFAULT_LIBRARY_PATHS`]
    pub fn load() -> DiscoveryResult<Self> {
        let mut failures = Vec::new();

        for path in DEFAULT_LIBRARY_PATHS {
            match Self::try_load(path) {
                Ok(library) => return Ok(library),
                Err(reason) => {
                    log::debug!("Skipping {}: {}", path, reason);
                    failures.push(format!("{path}: {reason}"));
                }
            }
        }

        Err(DiscoveryError::DriverUnavailable(format!(
            "no OpenCL runtime found ({})",
            failures.join("; ")
        )))
    }

    /// Load a specific library file
    pub fn load_from(path: &Path) -> DiscoveryResult<Self> {
        let path = path.to_str().ok_or_else(|| {
            DiscoveryError::DriverUnavailable(format!("non UTF-8 library path {}", path.display()))
        })?;

        Self::try_load(path)
            .map_err(|reason| DiscoveryError::DriverUnavailable(format!("{path}: {reason}")))
    }

    /// Path the runtime was loaded from
    pub fn path(&self) -> &str {
        &self.path
    }

    #[allow(clippy::missing_transmute_annotations)]
    fn try_load(path: &str) -> Result<Self, String> {
        let path_cstr = CString::new(path).map_err(|e| e.to_string())?;

        // SAFETY: dlopen/dlsym are called with valid NUL-terminated strings.
        // The resolved symbols are the OpenCL 1.0 discovery entry points whose
        // C signatures match the function pointer types above; the handle is
        // closed on every early return and otherwise in Drop.
        unsafe {
            let handle = libc::dlopen(path_cstr.as_ptr(), libc::RTLD_NOW | libc::RTLD_LOCAL);
            if handle.is_null() {
                return Err(last_dl_error());
            }

            macro_rules! load_fn {
                ($name:literal) => {{
                    let sym_name = CString::new($name).map_err(|e| e.to_string())?;
                    let sym = libc::dlsym(handle, sym_name.as_ptr());
                    if sym.is_null() {
                        libc::dlclose(handle);
                        return Err(format!("missing symbol {}", $name));
                    }
                    std::mem::transmute(sym)
                }};
            }

            let library = Self {
                handle,
                path: path.to_string(),
                cl_get_platform_ids: load_fn!("clGetPlatformIDs"),
                cl_get_platform_info: load_fn!("clGetPlatformInfo"),
                cl_get_device_ids: load_fn!("clGetDeviceIDs"),
                cl_get_device_info: load_fn!("clGetDeviceInfo"),
            };

            log::info!("Loaded OpenCL runtime from {}", path);
            Ok(library)
        }
    }
}

/// Read and clear the thread's `dlerror` message
fn last_dl_error() -> String {
    // SAFETY: dlerror returns either null or a pointer to a NUL-terminated
    // string owned by libc that stays valid until the next dl* call.
    unsafe {
        let message = libc::dlerror();
        if message.is_null() {
            "dlopen failed".to_string()
        } else {
            CStr::from_ptr(message).to_string_lossy().into_owned()
        }
    }
}

fn slice_parts<T>(slice: Option<&mut [T]>) -> (usize, *mut T) {
    match slice {
        Some(slice) => (slice.len(), slice.as_mut_ptr()),
        None => (0, ptr::null_mut()),
    }
}

fn out_ptr<T>(out: Option<&mut T>) -> *mut T {
    out.map_or(ptr::null_mut(), |out| out as *mut T)
}

// SAFETY (all methods): the function pointers were resolved from the OpenCL
// runtime in try_load. Every pointer argument is either null or derived from
// a live Rust slice/reference whose length is passed alongside it, which is
// exactly the contract of the OpenCL query functions.
impl ClApi for OpenClLibrary {
    fn get_platform_ids(
        &self,
        platforms: Option<&mut [PlatformId]>,
        num_platforms: Option<&mut u32>,
    ) -> ClStatus {
        let (len, data) = slice_parts(platforms);
        let Ok(num_entries) = u32::try_from(len) else {
            return ClStatus::INVALID_VALUE;
        };
        ClStatus(unsafe { (self.cl_get_platform_ids)(num_entries, data, out_ptr(num_platforms)) })
    }

    fn get_platform_info(
        &self,
        platform: PlatformId,
        param_name: u32,
        param_value: Option<&mut [u8]>,
        param_value_size_ret: Option<&mut usize>,
    ) -> ClStatus {
        let (len, data) = slice_parts(param_value);
        ClStatus(unsafe {
            (self.cl_get_platform_info)(
                platform,
                param_name,
                len,
                data.cast::<c_void>(),
                out_ptr(param_value_size_ret),
            )
        })
    }

    fn get_device_ids(
        &self,
        platform: PlatformId,
        device_type: DeviceType,
        devices: Option<&mut [DeviceId]>,
        num_devices: Option<&mut u32>,
    ) -> ClStatus {
        let (len, data) = slice_parts(devices);
        let Ok(num_entries) = u32::try_from(len) else {
            return ClStatus::INVALID_VALUE;
        };
        ClStatus(unsafe {
            (self.cl_get_device_ids)(
                platform,
                device_type.bits(),
                num_entries,
                data,
                out_ptr(num_devices),
            )
        })
    }

    fn get_device_info(
        &self,
        device: DeviceId,
        param_name: u32,
        param_value: Option<&mut [u8]>,
        param_value_size_ret: Option<&mut usize>,
    ) -> ClStatus {
        let (len, data) = slice_parts(param_value);
        ClStatus(unsafe {
            (self.cl_get_device_info)(
                device,
                param_name,
                len,
                data.cast::<c_void>(),
                out_ptr(param_value_size_ret),
            )
        })
    }
}

impl Drop for OpenClLibrary {
    fn drop(&mut self) {
        if !self.handle.is_null() {
            // SAFETY: handle came from a successful dlopen and is closed once.
            unsafe {
                libc::dlclose(self.handle);
            }
            self.handle = ptr::null_mut();
        }
    }
}
