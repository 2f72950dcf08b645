//! `fpgainfo`: board information for FPGA accelerator cards.
//!
//! ```text
//! USAGE:
//!   fpgainfo mac                     MAC addresses
//!   fpgainfo phy                     PHY group status
//!   fpgainfo security                Security state
//!   fpgainfo fme                     FME details
//!   fpgainfo boot                    Boot page selection
//!   fpgainfo image                   Flash image versions
//!   fpgainfo events [FIRST] [LAST]   BMC event log
//! ```
//!
//! Every report comes from the board support module matching the card;
//! reports a module does not implement are listed as not supported.

use anyhow::{Context, Result};
use board_plugin::{
    BoardConfig, BoardDevice, BoardResolver, DeviceManager, Dispatch, EventLogFilter,
    ModuleLoader, Request, SysfsDevice,
};
use clap::{Args, Parser, Subcommand};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fpgainfo", about = "FPGA board information", version)]
struct Cli {
    /// PCIe address of the board (e.g. 0000:b1:00.0). Default: every board.
    #[arg(short = 'S', long, global = true)]
    device: Option<String>,

    /// Extra directory searched for board modules. Repeatable.
    #[arg(long = "module-path", global = true)]
    module_paths: Vec<PathBuf>,

    /// Alternate sysfs mount point.
    #[arg(long, global = true)]
    sysfs_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Print MAC addresses.
    Mac,
    /// Print PHY group status for every group the board reports.
    Phy,
    /// Print security state.
    Security,
    /// Print verbose FME information.
    Fme,
    /// Print boot page selection.
    Boot,
    /// Print flash image versions.
    Image,
    /// Print the BMC event log.
    Events(EventArgs),
}

#[derive(Args)]
struct EventArgs {
    /// List the available logs.
    #[arg(long)]
    list: bool,

    /// Include sensor readings.
    #[arg(long)]
    sensors: bool,

    /// Include raw bit fields.
    #[arg(long)]
    bits: bool,

    /// Print every log.
    #[arg(long, conflicts_with_all = ["first", "last"])]
    all: bool,

    /// First log to print (0 is the most recent).
    first: Option<u32>,

    /// Last log to print. Default: FIRST + 1.
    last: Option<u32>,
}

impl EventArgs {
    fn filter(&self) -> EventLogFilter {
        let (first, last) = if self.all {
            (0, u32::MAX)
        } else {
            let first = self.first.unwrap_or(0);
            (first, self.last.unwrap_or_else(|| first.saturating_add(1)))
        };

        EventLogFilter {
            first,
            last,
            print_list: self.list,
            print_sensors: self.sensors,
            print_bits: self.bits,
        }
    }
}

/// One report section: header title, text for the unsupported case, request
struct Section {
    title: &'static str,
    what: &'static str,
    request: Request,
}

impl Cmd {
    fn section(&self) -> Section {
        let (title, what, request) = match self {
            Self::Mac => ("MAC", "mac info", Request::MacInfo),
            Self::Phy => ("PHY", "phy group info", Request::PhyInfo),
            Self::Security => ("SEC", "Security info", Request::SecInfo),
            Self::Fme => ("FME", "FME info", Request::FmeVerboseInfo),
            Self::Boot => ("BOOT", "Boot info", Request::BootInfo),
            Self::Image => ("IMAGE", "Image info", Request::ImageInfo),
            Self::Events(args) => ("EVENTS", "Event log", Request::EventLog(args.filter())),
        };
        Section {
            title,
            what,
            request,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();

    let cli = Cli::parse();

    let mut config = BoardConfig::from_env();
    config.prepend_search_paths(cli.module_paths.iter().cloned());
    if let Some(root) = &cli.sysfs_root {
        config.sysfs_root.clone_from(root);
    }

    let resolver = BoardResolver::from_config(&config);
    let section = cli.command.section();

    let outcome = cmd_report(&resolver, &config, cli.device.as_deref(), &section);
    let unloaded = resolver
        .unload_all()
        .context("Failed to unload board modules");

    outcome?;
    unloaded
}

fn cmd_report(
    resolver: &BoardResolver,
    config: &BoardConfig,
    device: Option<&str>,
    section: &Section,
) -> Result<()> {
    let devices = match device {
        Some(addr) => vec![SysfsDevice::open(config, addr)?],
        None => DeviceManager::discover(config)
            .context("No FPGA boards found")?
            .devices()
            .to_vec(),
    };

    for dev in &devices {
        if let Err(e) = report_device(resolver, dev, section) {
            eprintln!("{}: {e:#}", dev.pcie_address());
        }
    }

    Ok(())
}

fn report_device(resolver: &BoardResolver, dev: &SysfsDevice, section: &Section) -> Result<()> {
    let id = dev
        .identity()
        .with_context(|| format!("Cannot identify {}", dev.pcie_address()))?;

    board_banner(resolver, dev, &mut io::stdout())?;

    println!("//****** {} ******//", section.title);
    println!("{:<33}: {}", "PCIe s:b:d.f", dev.pcie_address());
    println!("{:<33}: {:#06x}", "Vendor Id", id.vendor_id);
    println!("{:<33}: {:#06x}", "Device Id", id.device_id);
    println!("{:<33}: {:#06x}", "SubVendor Id", id.subsystem_vendor_id);
    println!("{:<33}: {:#06x}", "SubDevice Id", id.subsystem_device_id);

    run(resolver, dev, &section.request, section.what);
    Ok(())
}

/// Product name and `print_board_info`, printed only once the module loads
fn board_banner<L: ModuleLoader>(
    resolver: &BoardResolver<L>,
    dev: &dyn BoardDevice,
    out: &mut impl Write,
) -> Result<()> {
    let handle = match resolver.resolve(dev) {
        Ok(handle) => handle,
        Err(e) => {
            tracing::debug!("Failed to load board module: {e}");
            return Ok(());
        }
    };

    match resolver.product_name(dev) {
        Ok(name) => writeln!(out, "{name}")?,
        Err(e) => tracing::debug!("Failed to get product name: {e}"),
    }
    // the module writes through its own stdio buffer
    out.flush()?;

    match resolver.invoke(&handle, dev, &Request::BoardInfo)? {
        Dispatch::Completed(0) => {}
        Dispatch::Completed(status) => tracing::warn!("print_board_info returned {status}"),
        Dispatch::Unsupported => {
            tracing::error!("No print_board_info entry point in {}", handle.name());
        }
    }
    Ok(())
}

fn run(resolver: &BoardResolver, dev: &SysfsDevice, request: &Request, what: &str) {
    match resolver.dispatch(dev, request) {
        Ok(Dispatch::Completed(0)) => {}
        Ok(Dispatch::Completed(status)) => {
            eprintln!("{what} failed: {request} returned {status}");
        }
        Ok(Dispatch::Unsupported) => println!("{what} is not supported"),
        Err(e) => {
            tracing::debug!("{}: {e}", dev.pcie_address());
            println!("{what} is not supported");
        }
    }
}
