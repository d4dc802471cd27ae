#[cfg(test)]
mod integration_tests {
    use cldisco::driver::{DriverCall, ScriptedDevice, ScriptedDriver, ScriptedPlatform};
    use cldisco::prelude::*;
    use cldisco::selectors::DeviceAttribute;
    use cldisco::{ClStatus, TextReporter};
    use pretty_assertions::assert_eq;
    use serial_test::serial;

    fn workstation() -> ScriptedDriver {
        ScriptedDriver::new()
            .with_platform(
                ScriptedPlatform::new("NVIDIA CUDA", "NVIDIA Corporation").with_device(
                    ScriptedDevice::new("GeForce RTX 3060", DeviceType::GPU, 6_442_450_944)
                        .with_string(DeviceAttribute::DRIVER_VERSION, "535.54"),
                ),
            )
            .with_platform(
                ScriptedPlatform::new("Portable Computing Language", "The pocl project")
                    .with_device(
                        ScriptedDevice::new("pthread-cpu", DeviceType::CPU, 16 << 30)
                            .with_string(DeviceAttribute::DRIVER_VERSION, "5.0"),
                    ),
            )
    }

    fn stream(driver: ScriptedDriver, config: DiscoveryConfig) -> (DiscoveryResult<()>, String) {
        let context = DriverContext::with_api(driver);
        let mut reporter = TextReporter::new(Vec::new(), config.verbosity);
        let result = context.enumerator(config).run(&mut reporter);
        let text = String::from_utf8(reporter.into_inner()).unwrap();
        (result, text)
    }

    #[test]
    fn test_two_platform_text_report() {
        let (result, text) = stream(workstation(), DiscoveryConfig::default());
        result.unwrap();

        let expected = "\
Number of OpenCL platforms: 2
Platform #1/2
    Platform name: NVIDIA CUDA
    Vendor name: NVIDIA Corporation
    Device #1/1
        Device name: GeForce RTX 3060
        Device type: GPU
        Global mem size: 6144 MB
        Device driver version: 535.54
        Device profile: FULL_PROFILE
Platform #2/2
    Platform name: Portable Computing Language
    Vendor name: The pocl project
    Device #1/1
        Device name: pthread-cpu
        Device type: CPU
        Global mem size: 16384 MB
        Device driver version: 5.0
        Device profile: FULL_PROFILE
";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_failed_query_stops_output_at_failure_point() {
        let driver = ScriptedDriver::new().with_platform(
            ScriptedPlatform::new("Broken", "Acme")
                .with_device(ScriptedDevice::new("ok", DeviceType::GPU, 1 << 30))
                .with_device(
                    ScriptedDevice::new("no-driver-version", DeviceType::GPU, 1 << 30)
                        .without(DeviceAttribute::DRIVER_VERSION),
                )
                .with_device(ScriptedDevice::new("never-reached", DeviceType::CPU, 1 << 30)),
        );

        let (result, text) = stream(driver, DiscoveryConfig::strict());
        let err = result.unwrap_err();

        assert_eq!(err.status(), Some(ClStatus::INVALID_VALUE));
        let site = err.call_site().unwrap();
        assert_eq!(site.call, "clGetDeviceInfo");
        assert!(site.file.ends_with(".rs"));

        let message = err.to_string();
        assert!(message.starts_with("OpenCL error code -30"), "{message}");
        assert!(message.contains(site.file));

        assert!(text.contains("Device name: ok"));
        assert!(!text.contains("no-driver-version"));
        assert!(!text.contains("never-reached"));
        assert!(text.ends_with("        Device profile: FULL_PROFILE\n"));
    }

    #[test]
    fn test_isolation_policy_reports_failure_and_continues() {
        let driver = ScriptedDriver::new().with_platform(
            ScriptedPlatform::new("Broken", "Acme")
                .with_device(
                    ScriptedDevice::new("no-name", DeviceType::GPU, 1 << 30)
                        .without(DeviceAttribute::NAME),
                )
                .with_device(ScriptedDevice::new("survivor", DeviceType::CPU, 1 << 30)),
        );

        let config = DiscoveryConfig::default().with_failure_policy(FailurePolicy::IsolateDevices);
        let (result, text) = stream(driver, config);
        result.unwrap();

        assert!(text.contains("    Device #1/2 query failed: OpenCL error code -30"));
        assert!(text.contains("    Device #2/2\n        Device name: survivor\n"));
    }

    #[test]
    fn test_platform_count_failure_is_fatal_before_any_output() {
        let driver = workstation().failing_platform_ids(ClStatus::PLATFORM_NOT_FOUND_KHR);
        let (result, text) = stream(driver, DiscoveryConfig::tolerant());

        assert_eq!(result.unwrap_err().status(), Some(ClStatus::PLATFORM_NOT_FOUND_KHR));
        assert!(text.is_empty());
    }

    #[test]
    fn test_every_variable_length_query_is_sized_first() {
        let context = DriverContext::with_api(workstation());
        context.enumerator(DiscoveryConfig::default()).collect().unwrap();

        let calls = context.api().calls();
        assert_eq!(
            &calls[..2],
            &[
                DriverCall::PlatformIds { capacity: None },
                DriverCall::PlatformIds { capacity: Some(2) },
            ]
        );

        for pair in calls.windows(2) {
            match (&pair[0], &pair[1]) {
                (
                    DriverCall::PlatformInfo { param: sized, capacity: None, .. },
                    DriverCall::PlatformInfo { param, capacity: Some(n), .. },
                ) => {
                    assert_eq!(sized, param);
                    assert!(*n > 0);
                }
                (_, DriverCall::PlatformInfo { capacity: Some(_), .. }) => {
                    panic!("value phase without a size phase: {:?}", pair)
                }
                _ => {}
            }
        }
    }

    #[test]
    fn test_json_export_matches_collected_report() {
        let context = DriverContext::with_api(workstation());
        let report = context.enumerator(DiscoveryConfig::default()).collect().unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("opencl.json");
        report.export_json(&path).unwrap();

        let loaded = DiscoveryReport::import_json(&path).unwrap();
        assert_eq!(loaded.platforms, report.platforms);
        let gpu = loaded.platforms[0].devices[0].info().unwrap();
        assert_eq!(gpu.category, DeviceCategory::Gpu);
        assert_eq!(gpu.global_mem_mb(), 6144);
    }

    #[test]
    fn test_gpu_filter_on_cpu_only_platform_is_fatal() {
        let config = DiscoveryConfig::default().with_device_type(DeviceType::GPU);
        let (result, text) = stream(workstation(), config);

        assert_eq!(result.unwrap_err().status(), Some(ClStatus::DEVICE_NOT_FOUND));
        assert!(text.contains("Device name: GeForce RTX 3060"));
        assert!(text.ends_with("    Vendor name: The pocl project\n"));
    }

    #[test]
    #[serial]
    fn test_real_driver_if_present() {
        assert!(!cldisco::version().is_empty());
        if !cldisco::is_supported() {
            return;
        }

        let report = cldisco::discover_with(&DiscoveryConfig::tolerant()).unwrap();
        assert!(!report.platforms.is_empty());
        for platform in &report.platforms {
            assert!(!platform.info.name.is_empty());
        }
    }
}
