//! Event sinks fed by [`Enumerator::run`](super::Enumerator::run)

use crate::error::{DiscoveryError, DiscoveryResult};
use crate::report::{DeviceEntry, DeviceInfo, DiscoveryReport, PlatformInfo, PlatformReport};

/// Receives enumeration results in driver order
///
/// Indices are zero-based; `total` is the number of elements at that level.
pub trait DiscoveryObserver {
    /// Number of platforms, reported once before any platform
    fn platforms_found(&mut self, _count: usize) -> DiscoveryResult<()> {
        Ok(())
    }

    /// A platform and its attributes, before any of its devices
    fn platform(&mut self, index: usize, total: usize, info: &PlatformInfo) -> DiscoveryResult<()>;

    /// A device of the most recently reported platform
    fn device(&mut self, index: usize, total: usize, info: &DeviceInfo) -> DiscoveryResult<()>;

    /// A device whose attributes could not be fetched (isolating policy only)
    fn device_failed(
        &mut self,
        _index: usize,
        _total: usize,
        _error: &DiscoveryError,
    ) -> DiscoveryResult<()> {
        Ok(())
    }
}

/// Builds a [`DiscoveryReport`] from enumeration events
#[derive(Debug, Default)]
pub struct ReportCollector {
    platforms: Vec<PlatformReport>,
}

impl ReportCollector {
    /// Empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Finish collection
    pub fn finish(self) -> DiscoveryReport {
        DiscoveryReport::new(self.platforms)
    }

    fn current_platform(&mut self) -> DiscoveryResult<&mut PlatformReport> {
        self.platforms.last_mut().ok_or_else(|| {
            DiscoveryError::Protocol("device reported before its platform".to_string())
        })
    }
}

impl DiscoveryObserver for ReportCollector {
    fn platforms_found(&mut self, count: usize) -> DiscoveryResult<()> {
        self.platforms.reserve(count);
        Ok(())
    }

    fn platform(
        &mut self,
        _index: usize,
        _total: usize,
        info: &PlatformInfo,
    ) -> DiscoveryResult<()> {
        self.platforms.push(PlatformReport {
            info: info.clone(),
            devices: Vec::new(),
        });
        Ok(())
    }

    fn device(&mut self, _index: usize, _total: usize, info: &DeviceInfo) -> DiscoveryResult<()> {
        self.current_platform()?
            .devices
            .push(DeviceEntry::Available(info.clone()));
        Ok(())
    }

    fn device_failed(
        &mut self,
        index: usize,
        _total: usize,
        error: &DiscoveryError,
    ) -> DiscoveryResult<()> {
        self.current_platform()?.devices.push(DeviceEntry::Failed {
            index,
            status: error.status().map(|s| s.code()),
            error: error.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_without_platform_is_rejected() {
        let mut collector = ReportCollector::new();
        let info = DeviceInfo::default();
        assert!(matches!(
            collector.device(0, 1, &info),
            Err(DiscoveryError::Protocol(_))
        ));
    }

    #[test]
    fn test_collects_in_event_order() {
        let mut collector = ReportCollector::new();
        let platform = PlatformInfo {
            name: "p".to_string(),
            ..PlatformInfo::default()
        };
        collector.platforms_found(1).unwrap();
        collector.platform(0, 1, &platform).unwrap();
        collector.device(0, 2, &DeviceInfo::default()).unwrap();
        collector
            .device_failed(1, 2, &DiscoveryError::Protocol("boom".to_string()))
            .unwrap();

        let report = collector.finish();
        assert_eq!(report.platforms.len(), 1);
        assert_eq!(report.platforms[0].devices.len(), 2);
        assert!(matches!(
            report.platforms[0].devices[1],
            DeviceEntry::Failed { index: 1, status: None, .. }
        ));
    }
}
