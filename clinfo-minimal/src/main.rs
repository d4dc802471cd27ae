//! Minimal OpenCL platform/device lister

use std::io;
use std::process;

fn main() {
    env_logger::init();

    let stdout = io::stdout();
    if let Err(e) = cldisco::write_report(&cldisco::DiscoveryConfig::default(), stdout.lock()) {
        log::debug!("enumeration aborted: {:?}", e);
        eprintln!("{}", e);
        process::exit(1);
    }
}
