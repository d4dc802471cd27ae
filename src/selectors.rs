//! Attribute selectors for `clGetPlatformInfo` / `clGetDeviceInfo`
//!
//! Selectors are thin wrappers over the `cl_platform_info` / `cl_device_info`
//! values from `cl.h`. Any value can be built, including ones the driver does
//! not recognise; those make the query fail with `CL_INVALID_VALUE`.

use std::fmt;
use std::mem;

/// `cl_platform_info` selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlatformAttribute(pub u32);

impl PlatformAttribute {
    /// `CL_PLATFORM_PROFILE`
    pub const PROFILE: PlatformAttribute = PlatformAttribute(0x0900);
    /// `CL_PLATFORM_VERSION`
    pub const VERSION: PlatformAttribute = PlatformAttribute(0x0901);
    /// `CL_PLATFORM_NAME`
    pub const NAME: PlatformAttribute = PlatformAttribute(0x0902);
    /// `CL_PLATFORM_VENDOR`
    pub const VENDOR: PlatformAttribute = PlatformAttribute(0x0903);
    /// `CL_PLATFORM_EXTENSIONS`
    pub const EXTENSIONS: PlatformAttribute = PlatformAttribute(0x0904);

    /// Symbolic name, if this is a known selector
    pub fn name(self) -> Option<&'static str> {
        match self {
            Self::PROFILE => Some("CL_PLATFORM_PROFILE"),
            Self::VERSION => Some("CL_PLATFORM_VERSION"),
            Self::NAME => Some("CL_PLATFORM_NAME"),
            Self::VENDOR => Some("CL_PLATFORM_VENDOR"),
            Self::EXTENSIONS => Some("CL_PLATFORM_EXTENSIONS"),
            _ => None,
        }
    }
}

impl fmt::Display for PlatformAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:04x}", self.0),
        }
    }
}

/// `cl_device_info` selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceAttribute(pub u32);

impl DeviceAttribute {
    /// `CL_DEVICE_TYPE` (`cl_device_type`)
    pub const TYPE: DeviceAttribute = DeviceAttribute(0x1000);
    /// `CL_DEVICE_MAX_COMPUTE_UNITS` (`cl_uint`)
    pub const MAX_COMPUTE_UNITS: DeviceAttribute = DeviceAttribute(0x1002);
    /// `CL_DEVICE_MAX_WORK_GROUP_SIZE` (`size_t`)
    pub const MAX_WORK_GROUP_SIZE: DeviceAttribute = DeviceAttribute(0x1004);
    /// `CL_DEVICE_MAX_CLOCK_FREQUENCY` (`cl_uint`, MHz)
    pub const MAX_CLOCK_FREQUENCY: DeviceAttribute = DeviceAttribute(0x100C);
    /// `CL_DEVICE_MAX_MEM_ALLOC_SIZE` (`cl_ulong`)
    pub const MAX_MEM_ALLOC_SIZE: DeviceAttribute = DeviceAttribute(0x1010);
    /// `CL_DEVICE_GLOBAL_MEM_SIZE` (`cl_ulong`)
    pub const GLOBAL_MEM_SIZE: DeviceAttribute = DeviceAttribute(0x101F);
    /// `CL_DEVICE_LOCAL_MEM_SIZE` (`cl_ulong`)
    pub const LOCAL_MEM_SIZE: DeviceAttribute = DeviceAttribute(0x1023);
    /// `CL_DEVICE_NAME`
    pub const NAME: DeviceAttribute = DeviceAttribute(0x102B);
    /// `CL_DEVICE_VENDOR`
    pub const VENDOR: DeviceAttribute = DeviceAttribute(0x102C);
    /// `CL_DRIVER_VERSION`
    pub const DRIVER_VERSION: DeviceAttribute = DeviceAttribute(0x102D);
    /// `CL_DEVICE_PROFILE`
    pub const PROFILE: DeviceAttribute = DeviceAttribute(0x102E);
    /// `CL_DEVICE_VERSION`
    pub const VERSION: DeviceAttribute = DeviceAttribute(0x102F);
    /// `CL_DEVICE_EXTENSIONS`
    pub const EXTENSIONS: DeviceAttribute = DeviceAttribute(0x1030);

    /// Symbolic name, if this is a known selector
    pub fn name(self) -> Option<&'static str> {
        match self {
            Self::TYPE => Some("CL_DEVICE_TYPE"),
            Self::MAX_COMPUTE_UNITS => Some("CL_DEVICE_MAX_COMPUTE_UNITS"),
            Self::MAX_WORK_GROUP_SIZE => Some("CL_DEVICE_MAX_WORK_GROUP_SIZE"),
            Self::MAX_CLOCK_FREQUENCY => Some("CL_DEVICE_MAX_CLOCK_FREQUENCY"),
            Self::MAX_MEM_ALLOC_SIZE => Some("CL_DEVICE_MAX_MEM_ALLOC_SIZE"),
            Self::GLOBAL_MEM_SIZE => Some("CL_DEVICE_GLOBAL_MEM_SIZE"),
            Self::LOCAL_MEM_SIZE => Some("CL_DEVICE_LOCAL_MEM_SIZE"),
            Self::NAME => Some("CL_DEVICE_NAME"),
            Self::VENDOR => Some("CL_DEVICE_VENDOR"),
            Self::DRIVER_VERSION => Some("CL_DRIVER_VERSION"),
            Self::PROFILE => Some("CL_DEVICE_PROFILE"),
            Self::VERSION => Some("CL_DEVICE_VERSION"),
            Self::EXTENSIONS => Some("CL_DEVICE_EXTENSIONS"),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceAttribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "0x{:04x}", self.0),
        }
    }
}

/// Attribute value whose byte width is known from its type
///
/// These skip the size phase: the caller passes a buffer of exactly
/// [`FixedSizeValue::WIDTH`] bytes.
pub trait FixedSizeValue: Copy {
    /// Width of the value in bytes
    const WIDTH: usize;

    /// Decode from native-endian bytes; `None` if `bytes` has the wrong width
    fn from_ne_slice(bytes: &[u8]) -> Option<Self>;
}

macro_rules! impl_fixed_size_value {
    ($($ty:ty),*) => {
        $(
            impl FixedSizeValue for $ty {
                const WIDTH: usize = mem::size_of::<$ty>();

                fn from_ne_slice(bytes: &[u8]) -> Option<Self> {
                    Some(<$ty>::from_ne_bytes(bytes.try_into().ok()?))
                }
            }
        )*
    };
}

impl_fixed_size_value!(u32, u64, usize);

/// Decode a NUL-terminated string attribute
///
/// Stops at the first NUL byte; bytes that are not valid UTF-8 are replaced.
pub fn decode_c_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
