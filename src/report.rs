//! Discovery results: data model, text rendering and JSON export

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::discovery::{DiscoveryObserver, Verbosity};
use crate::error::{DiscoveryError, DiscoveryResult};
use crate::mappings::{DeviceCategory, DeviceType};

const BYTES_PER_MB: u64 = 1024 * 1024;
const BYTES_PER_KB: u64 = 1024;

/// Identifying attributes of one platform
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformInfo {
    /// `CL_PLATFORM_NAME`
    pub name: String,
    /// `CL_PLATFORM_VENDOR`
    pub vendor: String,
    /// `CL_PLATFORM_VERSION`
    pub version: String,
    /// `CL_PLATFORM_PROFILE`
    pub profile: String,
    /// `CL_PLATFORM_EXTENSIONS`, split on whitespace
    pub extensions: Vec<String>,
}

/// Identifying and capability attributes of one device
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// `CL_DEVICE_NAME`
    pub name: String,
    /// `CL_DEVICE_VENDOR`
    pub vendor: String,
    /// Raw `CL_DEVICE_TYPE` flags
    pub device_type: DeviceType,
    /// Classification of `device_type`
    pub category: DeviceCategory,
    /// `CL_DEVICE_GLOBAL_MEM_SIZE` in bytes
    pub global_mem_size: u64,
    /// `CL_DEVICE_LOCAL_MEM_SIZE` in bytes
    pub local_mem_size: u64,
    /// `CL_DEVICE_MAX_MEM_ALLOC_SIZE` in bytes
    pub max_mem_alloc_size: u64,
    /// `CL_DEVICE_MAX_COMPUTE_UNITS`
    pub max_compute_units: u32,
    /// `CL_DEVICE_MAX_CLOCK_FREQUENCY` in MHz
    pub max_clock_frequency: u32,
    /// `CL_DEVICE_MAX_WORK_GROUP_SIZE`
    pub max_work_group_size: usize,
    /// `CL_DRIVER_VERSION`
    pub driver_version: String,
    /// `CL_DEVICE_PROFILE`
    pub profile: String,
    /// `CL_DEVICE_VERSION`
    pub version: String,
}

impl DeviceInfo {
    /// Global memory in whole megabytes (truncated)
    pub fn global_mem_mb(&self) -> u64 {
        self.global_mem_size / BYTES_PER_MB
    }
}

/// One device slot of a platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeviceEntry {
    /// All attributes were fetched
    Available(DeviceInfo),
    /// The device could not be queried and was skipped
    Failed {
        /// Position of the device within its platform
        index: usize,
        /// Native status, when the failure came from a driver call
        status: Option<i32>,
        /// Diagnostic message
        error: String,
    },
}

impl DeviceEntry {
    /// Device attributes, if available
    pub fn info(&self) -> Option<&DeviceInfo> {
        match self {
            DeviceEntry::Available(info) => Some(info),
            DeviceEntry::Failed { .. } => None,
        }
    }
}

/// One platform with its devices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformReport {
    /// Platform attributes
    pub info: PlatformInfo,
    /// Devices in driver order
    pub devices: Vec<DeviceEntry>,
}

/// Result of a full enumeration pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryReport {
    /// When the report was produced
    pub generated_at: DateTime<Utc>,
    /// Version of cldisco that produced it
    pub cldisco_version: String,
    /// Platforms in driver order
    pub platforms: Vec<PlatformReport>,
}

impl DiscoveryReport {
    /// Report stamped with the current time
    pub fn new(platforms: Vec<PlatformReport>) -> Self {
        Self {
            generated_at: Utc::now(),
            cldisco_version: crate::VERSION.to_string(),
            platforms,
        }
    }

    /// Total number of device slots, failed ones included
    pub fn device_count(&self) -> usize {
        self.platforms.iter().map(|p| p.devices.len()).sum()
    }

    /// Devices of every platform that were fetched successfully
    pub fn devices(&self) -> impl Iterator<Item = &DeviceInfo> {
        self.platforms
            .iter()
            .flat_map(|p| p.devices.iter())
            .filter_map(DeviceEntry::info)
    }

    /// Render as the text report
    pub fn render_text(&self, verbosity: Verbosity) -> DiscoveryResult<String> {
        let mut out = Vec::new();
        self.write_text(&mut out, verbosity)?;
        // every line is formatted from `String`s
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    /// Write the text report to `writer`
    pub fn write_text<W: Write>(&self, writer: W, verbosity: Verbosity) -> DiscoveryResult<()> {
        let mut reporter = TextReporter::new(writer, verbosity);
        reporter.platforms_found(self.platforms.len())?;

        for (index, platform) in self.platforms.iter().enumerate() {
            reporter.platform(index, self.platforms.len(), &platform.info)?;

            let total = platform.devices.len();
            for (device_index, entry) in platform.devices.iter().enumerate() {
                match entry {
                    DeviceEntry::Available(info) => reporter.device(device_index, total, info)?,
                    DeviceEntry::Failed { error, .. } => {
                        reporter.write_device_failure(device_index, total, error)?
                    }
                }
            }
        }

        Ok(())
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> DiscoveryResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Export to a JSON file
    pub fn export_json(&self, path: &Path) -> DiscoveryResult<()> {
        let file = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Load a previously exported report
    pub fn import_json(path: &Path) -> DiscoveryResult<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(io::BufReader::new(file))?)
    }
}

/// Streams the text report as enumeration events arrive
pub struct TextReporter<W: Write> {
    out: W,
    verbosity: Verbosity,
}

impl<W: Write> TextReporter<W> {
    /// Reporter writing to `out`
    pub fn new(out: W, verbosity: Verbosity) -> Self {
        Self { out, verbosity }
    }

    /// Give back the writer
    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_device_failure(
        &mut self,
        index: usize,
        total: usize,
        error: &str,
    ) -> DiscoveryResult<()> {
        writeln!(
            self.out,
            "    Device #{}/{} query failed: {}",
            index + 1,
            total,
            error
        )?;
        Ok(())
    }
}

impl<W: Write> DiscoveryObserver for TextReporter<W> {
    fn platforms_found(&mut self, count: usize) -> DiscoveryResult<()> {
        writeln!(self.out, "Number of OpenCL platforms: {}", count)?;
        Ok(())
    }

    fn platform(&mut self, index: usize, total: usize, info: &PlatformInfo) -> DiscoveryResult<()> {
        let out = &mut self.out;
        writeln!(out, "Platform #{}/{}", index + 1, total)?;
        writeln!(out, "    Platform name: {}", info.name)?;
        writeln!(out, "    Vendor name: {}", info.vendor)?;

        if self.verbosity == Verbosity::Detailed {
            writeln!(out, "    Platform version: {}", info.version)?;
            writeln!(out, "    Platform profile: {}", info.profile)?;
            writeln!(out, "    Extensions: {}", info.extensions.len())?;
        }
        Ok(())
    }

    fn device(&mut self, index: usize, total: usize, info: &DeviceInfo) -> DiscoveryResult<()> {
        let out = &mut self.out;
        writeln!(out, "    Device #{}/{}", index + 1, total)?;
        writeln!(out, "        Device name: {}", info.name)?;
        writeln!(out, "        Device type: {}", info.category)?;
        writeln!(out, "        Global mem size: {} MB", info.global_mem_mb())?;
        writeln!(out, "        Device driver version: {}", info.driver_version)?;
        writeln!(out, "        Device profile: {}", info.profile)?;

        if self.verbosity == Verbosity::Detailed {
            let flags: Vec<&str> = info
                .device_type
                .categories()
                .iter()
                .map(|c| c.label())
                .collect();
            writeln!(
                out,
                "        Device type flags: 0x{:x} [{}]",
                info.device_type.bits(),
                flags.join(", ")
            )?;
            writeln!(out, "        Device vendor: {}", info.vendor)?;
            writeln!(out, "        Device version: {}", info.version)?;
            writeln!(out, "        Max compute units: {}", info.max_compute_units)?;
            writeln!(out, "        Max clock frequency: {} MHz", info.max_clock_frequency)?;
            writeln!(out, "        Max work group size: {}", info.max_work_group_size)?;
            writeln!(out, "        Local mem size: {} KB", info.local_mem_size / BYTES_PER_KB)?;
            writeln!(
                out,
                "        Max mem alloc size: {} MB",
                info.max_mem_alloc_size / BYTES_PER_MB
            )?;
        }
        Ok(())
    }

    fn device_failed(
        &mut self,
        index: usize,
        total: usize,
        error: &DiscoveryError,
    ) -> DiscoveryResult<()> {
        self.write_device_failure(index, total, &error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FAILURE: &str = concat!(
        "OpenCL error code -30 (CL_INVALID_VALUE) ",
        "encountered at x.rs:1 (clGetDeviceInfo)"
    );

    fn gpu() -> DeviceInfo {
        DeviceInfo {
            name: "GeForce RTX 3060".to_string(),
            vendor: "NVIDIA Corporation".to_string(),
            device_type: DeviceType::GPU | DeviceType::DEFAULT,
            category: DeviceCategory::Gpu,
            global_mem_size: 6_442_450_944,
            local_mem_size: 49_152,
            max_mem_alloc_size: 1_610_612_736,
            max_compute_units: 30,
            max_clock_frequency: 1702,
            max_work_group_size: 1024,
            driver_version: "535.54".to_string(),
            profile: "FULL_PROFILE".to_string(),
            version: "OpenCL 3.0 CUDA".to_string(),
        }
    }

    fn report() -> DiscoveryReport {
        DiscoveryReport::new(vec![PlatformReport {
            info: PlatformInfo {
                name: "NVIDIA CUDA".to_string(),
                vendor: "NVIDIA Corporation".to_string(),
                version: "OpenCL 3.0 CUDA 12.2".to_string(),
                profile: "FULL_PROFILE".to_string(),
                extensions: vec!["cl_khr_icd".to_string()],
            },
            devices: vec![
                DeviceEntry::Available(gpu()),
                DeviceEntry::Failed {
                    index: 1,
                    status: Some(-30),
                    error: FAILURE.to_string(),
                },
            ],
        }])
    }

    #[test]
    fn test_global_mem_mb_truncates() {
        assert_eq!(gpu().global_mem_mb(), 6144);
        let odd = DeviceInfo {
            global_mem_size: 2 * BYTES_PER_MB - 1,
            ..DeviceInfo::default()
        };
        assert_eq!(odd.global_mem_mb(), 1);
    }

    #[test]
    fn test_render_text_normal() {
        let text = report().render_text(Verbosity::Normal).unwrap();
        let expected = "\
Number of OpenCL platforms: 1
Platform #1/1
    Platform name: NVIDIA CUDA
    Vendor name: NVIDIA Corporation
    Device #1/2
        Device name: GeForce RTX 3060
        Device type: GPU
        Global mem size: 6144 MB
        Device driver version: 535.54
        Device profile: FULL_PROFILE
    Device #2/2 query failed: OpenCL error code -30 (CL_INVALID_VALUE) encountered at x.rs:1 (clGetDeviceInfo)
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_render_text_detailed() {
        let text = report().render_text(Verbosity::Detailed).unwrap();
        assert!(text.contains("    Platform version: OpenCL 3.0 CUDA 12.2\n"));
        assert!(text.contains("        Device type flags: 0x5 [GPU, Default]\n"));
        assert!(text.contains("        Max clock frequency: 1702 MHz\n"));
        assert!(text.contains("        Local mem size: 48 KB\n"));
        assert!(text.contains("        Max mem alloc size: 1536 MB\n"));
    }

    #[test]
    fn test_json_export_and_import() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        let original = report();

        original.export_json(&path).unwrap();
        let loaded = DiscoveryReport::import_json(&path).unwrap();

        assert_eq!(loaded.platforms, original.platforms);
        assert_eq!(loaded.cldisco_version, crate::VERSION);

        let json = original.to_json().unwrap();
        assert!(json.contains("\"outcome\": \"failed\""));
        assert!(json.contains("\"status\": -30"));
        assert!(json.contains("\"category\": \"gpu\""));
    }

    #[test]
    fn test_failed_entry_round_trips_with_its_status() {
        let entry = DeviceEntry::Failed {
            index: 3,
            status: Some(-33),
            error: "invalid device".to_string(),
        };

        let json = serde_json::to_string(&entry).unwrap();
        assert_eq!(
            json,
            r#"{"outcome":"failed","index":3,"status":-33,"error":"invalid device"}"#
        );
        let back: DeviceEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }

    #[test]
    fn test_device_iteration_skips_failures() {
        let report = report();
        assert_eq!(report.device_count(), 2);
        assert_eq!(report.devices().count(), 1);
    }
}
