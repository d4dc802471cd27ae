//! Simple example showing basic OpenCL device listing

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("cldisco OpenCL Information Example");
    println!("==================================\n");

    let config = cldisco::DiscoveryConfig::default();
    if !cldisco::is_supported_with(&config) {
        println!("No OpenCL platform found.");
        return Ok(());
    }

    let report = cldisco::discover_with(&config)?;
    for platform in &report.platforms {
        println!("{} ({})", platform.info.name, platform.info.vendor);

        for device in platform.devices.iter().filter_map(|d| d.info()) {
            println!("  {} [{}]", device.name, device.category);
            println!("    Global memory: {} MB", device.global_mem_mb());
            println!("    Compute units: {}", device.max_compute_units);
            println!("    Driver: {}", device.driver_version);
        }
    }

    Ok(())
}
