//! Lookup tables for OpenCL constants

pub mod device_type;
pub mod status;

// Re-exports for convenient usage
pub use device_type::{classify_device_type, DeviceCategory, DeviceType, CLASSIFICATION_RULES};
pub use status::{status_name, STATUS_CODES};
