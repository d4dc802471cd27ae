//! Run the enumerator against an in-memory driver, no OpenCL install needed

use cldisco::driver::{ScriptedDevice, ScriptedDriver, ScriptedPlatform};
use cldisco::selectors::DeviceAttribute;
use cldisco::{DeviceType, DiscoveryConfig, DriverContext, FailurePolicy, TextReporter, Verbosity};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let driver = ScriptedDriver::new()
        .with_platform(
            ScriptedPlatform::new("NVIDIA CUDA", "NVIDIA Corporation").with_device(
                ScriptedDevice::new("GeForce RTX 3060", DeviceType::GPU, 6_442_450_944)
                    .with_value(DeviceAttribute::MAX_COMPUTE_UNITS, 28u32),
            ),
        )
        .with_platform(
            ScriptedPlatform::new("Portable Computing Language", "The pocl project")
                .with_device(ScriptedDevice::new("pthread-cpu", DeviceType::CPU, 16 << 30))
                // a device whose driver rejects the name query
                .with_device(
                    ScriptedDevice::new("broken", DeviceType::ACCELERATOR, 1 << 30)
                        .without(DeviceAttribute::NAME),
                ),
        );

    let context = DriverContext::with_api(driver);
    let config = DiscoveryConfig::default()
        .with_verbosity(Verbosity::Detailed)
        .with_failure_policy(FailurePolicy::IsolateDevices);

    let mut reporter = TextReporter::new(std::io::stdout().lock(), config.verbosity);
    context.enumerator(config.clone()).run(&mut reporter)?;

    println!("\n{} driver call(s) issued", context.api().calls().len());

    let report = context.enumerator(config).collect()?;
    println!("{}", report.to_json()?);

    Ok(())
}
