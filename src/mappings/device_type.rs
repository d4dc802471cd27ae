//! Device type flags and their classification

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;

/// `cl_device_type` bit field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceType(pub u64);

impl DeviceType {
    /// `CL_DEVICE_TYPE_DEFAULT`
    pub const DEFAULT: DeviceType = DeviceType(1 << 0);
    /// `CL_DEVICE_TYPE_CPU`
    pub const CPU: DeviceType = DeviceType(1 << 1);
    /// `CL_DEVICE_TYPE_GPU`
    pub const GPU: DeviceType = DeviceType(1 << 2);
    /// `CL_DEVICE_TYPE_ACCELERATOR`
    pub const ACCELERATOR: DeviceType = DeviceType(1 << 3);
    /// `CL_DEVICE_TYPE_CUSTOM`
    pub const CUSTOM: DeviceType = DeviceType(1 << 4);
    /// `CL_DEVICE_TYPE_ALL`
    pub const ALL: DeviceType = DeviceType(0xFFFF_FFFF);

    /// Raw bits
    pub fn bits(self) -> u64 {
        self.0
    }

    /// True if any bit of `flag` is set in `self`
    pub fn intersects(self, flag: DeviceType) -> bool {
        self.0 & flag.0 != 0
    }

    /// Primary category according to [`CLASSIFICATION_RULES`]
    pub fn classify(self) -> DeviceCategory {
        classify_device_type(self)
    }

    /// Every category whose bit is set, in priority order
    pub fn categories(self) -> Vec<DeviceCategory> {
        CLASSIFICATION_RULES
            .iter()
            .filter(|(flag, _)| self.intersects(*flag))
            .map(|(_, category)| *category)
            .collect()
    }
}

impl BitOr for DeviceType {
    type Output = DeviceType;

    fn bitor(self, rhs: DeviceType) -> DeviceType {
        DeviceType(self.0 | rhs.0)
    }
}

/// Classification label of a device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceCategory {
    /// Graphics processor
    Gpu,
    /// General-purpose processor
    Cpu,
    /// Dedicated accelerator (DSP, FPGA, Cell, ...)
    Accelerator,
    /// Custom device without full OpenCL C support
    Custom,
    /// The platform's default device
    Default,
    /// No recognised type bit was set
    #[default]
    Unclassified,
}

impl DeviceCategory {
    /// Short label used in reports
    pub fn label(self) -> &'static str {
        match self {
            DeviceCategory::Gpu => "GPU",
            DeviceCategory::Cpu => "CPU",
            DeviceCategory::Accelerator => "Accelerator",
            DeviceCategory::Custom => "Custom",
            DeviceCategory::Default => "Default",
            DeviceCategory::Unclassified => "Unclassified",
        }
    }
}

impl fmt::Display for DeviceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Classification rules, first match wins.
///
/// Drivers may set several bits at once (a GPU that is also the platform
/// default), so the order decides which label a device gets.
pub const CLASSIFICATION_RULES: &[(DeviceType, DeviceCategory)] = &[
    (DeviceType::GPU, DeviceCategory::Gpu),
    (DeviceType::CPU, DeviceCategory::Cpu),
    (DeviceType::ACCELERATOR, DeviceCategory::Accelerator),
    (DeviceType::CUSTOM, DeviceCategory::Custom),
    (DeviceType::DEFAULT, DeviceCategory::Default),
];

/// Classify a raw device type bit field
pub fn classify_device_type(device_type: DeviceType) -> DeviceCategory {
    CLASSIFICATION_RULES
        .iter()
        .find(|(flag, _)| device_type.intersects(*flag))
        .map(|(_, category)| *category)
        .unwrap_or(DeviceCategory::Unclassified)
}
