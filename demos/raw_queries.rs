//! Issue individual attribute queries, including one with a selector the
//! driver does not know

use cldisco::selectors::{DeviceAttribute, PlatformAttribute};
use cldisco::{DiscoveryConfig, DriverContext};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let context = DriverContext::load()?;
    let enumerator = context.enumerator(DiscoveryConfig::default());

    for platform in enumerator.platform_ids()? {
        let raw = enumerator.query_platform_attribute(platform, PlatformAttribute::NAME)?;
        println!("{:?}: {} raw byte(s)", platform, raw.len());
        println!("  {}", enumerator.platform_string(platform, PlatformAttribute::VERSION)?);

        for device in enumerator.device_ids(platform)? {
            let mem: u64 = enumerator.device_value(device, DeviceAttribute::GLOBAL_MEM_SIZE)?;
            let name = enumerator.device_string(device, DeviceAttribute::NAME)?;
            println!("  {}: {} byte(s)", name, mem);

            match enumerator.query_device_attribute(device, DeviceAttribute(52)) {
                Ok(bytes) => println!("  selector 52 answered with {} byte(s)", bytes.len()),
                Err(e) => println!("  selector 52 rejected: {}", e),
            }
        }
    }

    Ok(())
}
