use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use swipe_registry::table::{collect_disks, ExternalTools};
use swipe_registry::{
    Device, DeviceEnumerator, DiskEntry, Identity, MonitorUpdate, RegistryConfig, UsageMonitor,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "swipe-registry")]
#[command(about = "Block device inventory with ATA/NVMe identity and live usage monitoring")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Configuration file (TOML)
    #[arg(long, global = true, env = "SWIPE_REGISTRY_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// List all block devices with identity and security data
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Show identity data for one device
    Identify {
        /// Device name or path (e.g., sda or /dev/sda)
        device: String,

        #[arg(long)]
        json: bool,
    },

    /// Print the joined topology and usage table once
    Usage {
        #[arg(long)]
        json: bool,
    },

    /// Watch topology and usage, printing a fresh table on every change
    Monitor {
        /// Poll interval, e.g. "500ms" or "2s"
        #[arg(short, long, value_parser = humantime::parse_duration)]
        interval: Option<Duration>,

        /// Print one JSON object per update
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.debug);

    let mut config =
        RegistryConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::List { json } => {
            warn_if_not_root();
            list_devices(&config, json)?;
        }
        Commands::Identify { device, json } => {
            warn_if_not_root();
            identify_device(&config, &device, json)?;
        }
        Commands::Usage { json } => {
            show_usage(&config, json)?;
        }
        Commands::Monitor { interval, json } => {
            if let Some(interval) = interval {
                config.poll_interval = interval;
            }
            monitor_usage(&config, json).await?;
        }
    }

    Ok(())
}

fn init_logging(debug: bool) {
    let filter = if debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

fn warn_if_not_root() {
    if !is_root() {
        eprintln!("Warning: not running as root, identity probes will likely fail.");
        eprintln!("Model, serial and security fields will show defaults.");
    }
}

fn list_devices(config: &RegistryConfig, json: bool) -> Result<()> {
    let devices = DeviceEnumerator::new(config)
        .enumerate()
        .context("Failed to enumerate block devices")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&devices)?);
        return Ok(());
    }

    if devices.is_empty() {
        println!("No block devices detected.");
        return Ok(());
    }

    println!(
        "{:<15} {:<24} {:<18} {:<10} {:<8} {:<10}",
        "Device", "Model", "Serial", "Size", "Type", "Security"
    );
    println!("{}", "-".repeat(90));

    for device in &devices {
        println!(
            "{:<15} {:<24} {:<18} {:<10} {:<8} {:<10}",
            device.path,
            truncate_string(&device.model_name, 24),
            truncate_string(&device.serial_number, 18),
            format!("{}GB", device.total_bytes / (1024 * 1024 * 1024)),
            device.device_type,
            security_summary(device)
        );
    }

    Ok(())
}

fn identify_device(config: &RegistryConfig, device: &str, json: bool) -> Result<()> {
    let device = DeviceEnumerator::new(config)
        .enumerate_one(device)
        .with_context(|| format!("Failed to identify {}", device))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&device)?);
    } else {
        print_device_detailed(&device);
    }

    Ok(())
}

fn print_device_detailed(device: &Device) {
    println!("\n{}", "=".repeat(60));
    println!("Device: {}", device.path);
    println!("Type: {}", device.device_type);
    println!("Model: {}", device.model_name);
    println!("Serial: {}", device.serial_number);
    println!(
        "Size: {} GB ({} bytes)",
        device.total_bytes / (1024 * 1024 * 1024),
        device.total_bytes
    );

    let geometry = &device.geometry;
    println!(
        "Sectors: {} x {} bytes (physical {} bytes)",
        geometry.user_addressable_sectors,
        geometry.logical_sector_size,
        geometry.physical_sector_size
    );

    match &device.identity {
        Some(Identity::Ata(ata)) => {
            println!("Firmware: {}", ata.firmware_revision);
            println!("DMA: {}", ata.dma_support);
            if ata.enhanced_security_erase_time_minutes > 0 {
                println!(
                    "Enhanced erase time: {} min",
                    ata.enhanced_security_erase_time_minutes
                );
            }
        }
        Some(Identity::Nvme(nvme)) => {
            println!("Firmware: {}", nvme.firmware_revision);
            println!("Vendor: {}", nvme.vendor_id);
            println!("Controller: {}", nvme.controller_id);
            println!("NVMe version: {}", nvme.nvme_version);
            if nvme.critical_composite_temperature > 0 {
                println!(
                    "Critical temperature: {} K",
                    nvme.critical_composite_temperature
                );
            }
        }
        None => println!("Identity: unavailable"),
    }

    let security = &device.security;
    println!("\nSecurity:");
    println!("  Supported: {}", security.supported);
    println!("  Enabled: {}", security.enabled);
    println!("  Locked: {}", security.locked);
    println!("  Frozen: {}", security.frozen);
    println!("  Enhanced Erase: {}", security.enhanced_erase_supported);

    if !security.supported_sanitization_methods.is_empty() {
        let methods: Vec<&str> = security
            .supported_sanitization_methods
            .iter()
            .map(|m| m.as_str())
            .collect();
        println!("  Sanitize: {}", methods.join(", "));
    }
}

fn security_summary(device: &Device) -> String {
    let security = &device.security;
    if !security.supported_sanitization_methods.is_empty() {
        "sanitize".to_string()
    } else if security.locked {
        "locked".to_string()
    } else if security.frozen {
        "frozen".to_string()
    } else if security.supported {
        "ata-sec".to_string()
    } else {
        "-".to_string()
    }
}

fn show_usage(config: &RegistryConfig, json: bool) -> Result<()> {
    let disks = collect_disks(&ExternalTools::from_config(config));

    if json {
        println!("{}", serde_json::to_string_pretty(&disks)?);
    } else {
        print_disk_table(&disks);
    }

    Ok(())
}

fn print_disk_table(disks: &[DiskEntry]) {
    println!(
        "{:<16} {:<10} {:<6} {:<8} {:<6} {:<20} {:<20}",
        "Name", "Size", "Type", "FS", "Use%", "Mountpoint", "Model"
    );
    println!("{}", "-".repeat(92));

    for disk in disks {
        println!(
            "{:<16} {:<10} {:<6} {:<8} {:<6} {:<20} {:<20}",
            truncate_string(&disk.name, 16),
            format!("{}GB", disk.size / (1024 * 1024 * 1024)),
            disk.kind,
            disk.fstype,
            disk.usage.usage_percent,
            truncate_string(&disk.mountpoint, 20),
            truncate_string(&disk.model, 20)
        );
    }
}

async fn monitor_usage(config: &RegistryConfig, json: bool) -> Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
        signal_hook::flag::register(signal, Arc::clone(&shutdown))
            .context("Failed to install signal handler")?;
    }

    let (monitor, mut updates) = UsageMonitor::from_config(config);
    monitor.start().context("Failed to start usage monitor")?;
    eprintln!(
        "Monitoring every {} (Ctrl+C to stop)...",
        humantime::format_duration(monitor.interval())
    );

    while !shutdown.load(Ordering::SeqCst) {
        match tokio::time::timeout(Duration::from_millis(200), updates.recv()).await {
            Ok(Some(update)) => print_update(&update, json)?,
            Ok(None) => break,
            Err(_) => continue,
        }
    }

    monitor.stop();
    Ok(())
}

fn print_update(update: &MonitorUpdate, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(update)?);
    } else {
        println!("\n[{}]", update.captured_at.format("%Y-%m-%d %H:%M:%S"));
        print_disk_table(&update.disks);
    }
    Ok(())
}

fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
