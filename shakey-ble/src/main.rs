//! Command line tool for Shakey devices
//!
//! Scans for devices, lists their services and sends the string a device
//! types when shaken.

use clap::{Parser, Subcommand};
use shakey_ble_controller::{BindingSender, BtleLink, HostConfig, spawn_worker};
use std::io::Write as _;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "shakey-ble")]
#[command(about = "Configure Shakey shake-to-type devices over BLE")]
struct Cli {
    /// Config file (defaults to $SHAKEY_HOME/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for BLE devices
    Scan {
        /// Scan duration in seconds
        #[arg(short, long)]
        duration: Option<u64>,
    },
    /// Connect to a device and list its services
    Discover {
        /// Device name or address to connect to
        #[arg(short, long)]
        device: Option<String>,
    },
    /// Set the string a device types when shaken
    Send {
        /// Text to type
        text: String,
        /// Device name or address to connect to
        #[arg(short, long)]
        device: Option<String>,
    },
    /// Read bindings from stdin, one per line, and send each
    Interactive {
        /// Device name or address to connect to
        #[arg(short, long)]
        device: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => HostConfig::load_from(path)?,
        None => HostConfig::load()?,
    };

    match cli.command {
        Commands::Scan { duration } => {
            if let Some(secs) = duration {
                config.scan_secs = secs;
            }
            scan_devices(&config).await?;
        }
        Commands::Discover { device } => {
            override_device(&mut config, device);
            discover_device(&config).await?;
        }
        Commands::Send { text, device } => {
            override_device(&mut config, device);
            send_binding(&config, &text).await?;
        }
        Commands::Interactive { device } => {
            override_device(&mut config, device);
            interactive(&config).await?;
        }
    }

    Ok(())
}

/// `--device` matches by name or address, so it replaces both
fn override_device(config: &mut HostConfig, device: Option<String>) {
    if device.is_some() {
        config.device_address = device;
    }
}

async fn scan_devices(config: &HostConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("Scanning for BLE devices ({} seconds)...", config.scan_secs);

    let devices = shakey_ble_controller::scan(config.target(), config.scan_duration()).await?;

    println!("\nFound {} devices:", devices.len());
    for device in devices {
        let rssi = device
            .rssi
            .map(|r| format!("{} dBm", r))
            .unwrap_or_else(|| "N/A".to_string());
        let marker = if device.is_target { " [SHAKEY]" } else { "" };

        println!("  {} ({}) RSSI: {}{}", device.name, device.address, rssi, marker);
    }

    Ok(())
}

async fn discover_device(config: &HostConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("Looking for {}...", config.target());

    let (device, services) =
        shakey_ble_controller::discover(config.target(), config.scan_duration()).await?;

    println!("Found device: {} ({})", device.name, device.address);
    for service in services {
        println!("Service: {}", service.uuid);
        for c in service.characteristics {
            println!("  Characteristic: {} {:?}", c.uuid, c.properties);
        }
    }

    Ok(())
}

async fn send_binding(config: &HostConfig, text: &str) -> Result<(), Box<dyn std::error::Error>> {
    let link = BtleLink::new(config.target(), config.scan_duration());
    let mut sender = BindingSender::from_config(link, config);

    println!("Connecting to {}...", config.target());
    sender.connect().await?;
    println!("Connected!");

    let sent = sender.send_binding(text).await?;
    println!("Sent binding '{}' ({} packets)", sent.text, sent.fragments);
    Ok(())
}

async fn interactive(config: &HostConfig) -> Result<(), Box<dyn std::error::Error>> {
    let link = BtleLink::new(config.target(), config.scan_duration());
    let (worker, mut statuses) = spawn_worker(BindingSender::from_config(link, config));

    let printer = tokio::spawn(async move {
        while let Some(status) = statuses.recv().await {
            println!("{status}");
        }
    });

    println!("Enter a key binding per line, Ctrl-D to quit.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim_end_matches('\r');
        if line.is_empty() {
            continue;
        }
        worker.send(line)?;
    }

    worker.shutdown().await;
    printer.await?;
    Ok(())
}
