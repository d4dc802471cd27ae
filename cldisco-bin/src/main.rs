//! Command-line interface for cldisco

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, Write};
use std::path::PathBuf;

use cldisco::{DeviceType, DiscoveryConfig, FailurePolicy, Verbosity};

#[derive(Parser)]
#[command(name = "cldisco")]
#[command(version = cldisco::VERSION)]
#[command(about = "List OpenCL platforms and devices", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// OpenCL library to load instead of the default search
    #[arg(long, global = true, env = "CLDISCO_LIBRARY")]
    library: Option<PathBuf>,

    /// JSON configuration file; flags override its values
    #[arg(long, global = true, env = "CLDISCO_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every platform and its devices
    Report {
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Include every collected attribute
        #[arg(short, long)]
        detailed: bool,

        /// Device types to request
        #[arg(long, value_enum)]
        device_type: Option<DeviceTypeArg>,

        /// Skip devices whose attributes cannot be read instead of aborting
        #[arg(short, long)]
        keep_going: bool,

        /// Export the report to a JSON file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List platform names only
    Platforms,

    /// Show version information
    Version,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum DeviceTypeArg {
    All,
    Gpu,
    Cpu,
    Accelerator,
    Custom,
    Default,
}

impl From<DeviceTypeArg> for DeviceType {
    fn from(arg: DeviceTypeArg) -> Self {
        match arg {
            DeviceTypeArg::All => DeviceType::ALL,
            DeviceTypeArg::Gpu => DeviceType::GPU,
            DeviceTypeArg::Cpu => DeviceType::CPU,
            DeviceTypeArg::Accelerator => DeviceType::ACCELERATOR,
            DeviceTypeArg::Custom => DeviceType::CUSTOM,
            DeviceTypeArg::Default => DeviceType::DEFAULT,
        }
    }
}

fn base_config(cli: &Cli) -> Result<DiscoveryConfig> {
    let mut config = match &cli.config {
        Some(path) => DiscoveryConfig::from_json_file(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => DiscoveryConfig::default(),
    };
    if let Some(library) = &cli.library {
        config = config.with_library_path(library);
    }
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match &cli.command {
        Commands::Report {
            format,
            detailed,
            device_type,
            keep_going,
            output,
        } => {
            let mut config = base_config(&cli)?;
            if *detailed {
                config = config.with_verbosity(Verbosity::Detailed);
            }
            if let Some(device_type) = device_type {
                config = config.with_device_type((*device_type).into());
            }
            if *keep_going {
                config = config.with_failure_policy(FailurePolicy::IsolateDevices);
            }

            match (format, output) {
                // streaming keeps partial output when a later query fails
                (OutputFormat::Text, None) => {
                    let stdout = io::stdout();
                    cldisco::write_report(&config, stdout.lock())?;
                }
                (format, output) => {
                    let report = cldisco::discover_with(&config)?;
                    match format {
                        OutputFormat::Text => print!("{}", report.render_text(config.verbosity)?),
                        OutputFormat::Json => println!("{}", report.to_json()?),
                    }
                    if let Some(path) = output {
                        report
                            .export_json(path)
                            .with_context(|| format!("Failed to write {}", path.display()))?;
                        eprintln!("Report exported to: {}", path.display());
                    }
                }
            }
        }

        Commands::Platforms => {
            let config = base_config(&cli)?;
            let report = cldisco::discover_with(&config)?;
            let mut stdout = io::stdout().lock();
            for platform in &report.platforms {
                writeln!(stdout, "{}", platform.info.name)?;
            }
        }

        Commands::Version => {
            println!("cldisco v{}", cldisco::version());
            println!("OpenCL platform and device discovery");
        }
    }

    Ok(())
}
