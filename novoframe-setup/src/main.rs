//! Setup tool for NovoFrame picture frames
//!
//! Finds frames in setup mode over BLE, sends them WiFi credentials and a
//! fresh encryption key, and pairs them with a NovoFrame account.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, Subcommand};
use novoframe_ble_controller::{
    Central, DeviceId, DiscoveredDevice, HttpFrameApi, KeyStore, KeyringStore, MemoryKeyStore, Provisioner,
    Remedy, SetupConfig, SetupError, SetupFlow, SimulatedCentral, SimulatedTiming, WifiCredentials, novoframe_home,
    select_central,
};

#[derive(Parser)]
#[command(name = "novoframe-setup")]
#[command(about = "Provision NovoFrame picture frames over Bluetooth")]
struct Cli {
    /// Use simulated frames instead of the Bluetooth adapter
    #[arg(long, global = true)]
    simulate: bool,
    /// Directory holding config.json (default: $NOVOFRAME_HOME or ~/.novoframe)
    #[arg(long, global = true)]
    home: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan for frames in setup mode
    Scan {
        /// Scan duration in seconds
        #[arg(short, long)]
        duration: Option<u64>,
    },
    /// Send WiFi credentials and a new encryption key to a frame
    Provision {
        /// Frame identity to connect to; strongest frame found if omitted
        #[arg(short, long)]
        device: Option<String>,
        /// WiFi credentials file (SSID on line 1, password on line 2)
        #[arg(short, long, default_value = "wifi_credentials.txt", conflicts_with = "ssid")]
        file: String,
        #[arg(long, requires = "password")]
        ssid: Option<String>,
        #[arg(long, requires = "ssid")]
        password: Option<String>,
        /// Pair the frame under this name once it is online
        #[arg(short, long)]
        name: Option<String>,
        /// Seconds to wait for the frame to join WiFi
        #[arg(long)]
        wifi_timeout: Option<u64>,
    },
    /// Pair an already provisioned frame with your account
    Pair {
        #[arg(short, long)]
        mac: String,
        #[arg(short, long)]
        name: String,
    },
    /// Inspect or forget a stored frame key
    Key {
        #[arg(short, long)]
        mac: String,
        /// Remove the key instead of showing its fingerprint
        #[arg(long)]
        delete: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let home = match &cli.home {
        Some(home) => home.clone(),
        None => novoframe_home()?,
    };
    let config = SetupConfig::load(&home)?;

    let simulated = SimulatedCentral::default().with_timing(SimulatedTiming {
        status_step: config.simulated_step(),
        ..SimulatedTiming::default()
    });
    let central = select_central(cli.simulate, simulated).await;
    let provisioner = Provisioner::new(central)
        .with_setup_name(config.setup_name.clone())
        .with_write_pacing(config.write_pacing());

    // Keys of simulated frames never reach the keychain
    if provisioner.central().is_simulated() {
        run(cli.command, &config, provisioner, MemoryKeyStore::new()).await
    } else {
        run(cli.command, &config, provisioner, KeyringStore::new()).await
    }
}

async fn run<C: Central, K: KeyStore>(
    command: Commands,
    config: &SetupConfig,
    provisioner: Provisioner<C>,
    keys: K,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut flow = SetupFlow::new(provisioner, keys)
        .with_scan_timeout(config.scan_timeout())
        .with_wifi_timeout(config.wifi_timeout());
    let api = HttpFrameApi::new(config.api_base_url.clone()).with_token(config.api_token.clone());

    let result = match command {
        Commands::Scan { duration } => {
            if let Some(secs) = duration {
                flow = flow.with_scan_timeout(Duration::from_secs(secs));
            }
            scan_frames(&mut flow).await
        }
        Commands::Provision {
            device,
            file,
            ssid,
            password,
            name,
            wifi_timeout,
        } => {
            if let Some(secs) = wifi_timeout {
                flow = flow.with_wifi_timeout(Duration::from_secs(secs));
            }
            let credentials = match (ssid, password) {
                (Some(ssid), Some(password)) => WifiCredentials::new(ssid, password)?,
                _ => read_wifi_credentials(Path::new(&file))?,
            };
            provision_frame(&mut flow, &api, device, &credentials, name).await
        }
        Commands::Pair { mac, name } => {
            let frame = flow.pair(&api, &mac, &name).await?;
            println!("Paired {} as {:?}", frame.mac_address, frame.name);
            Ok(())
        }
        Commands::Key { mac, delete } => manage_key(flow.keys(), &mac, delete),
    };

    flow.teardown().await;
    result
}

fn read_wifi_credentials(file: &Path) -> Result<WifiCredentials, Box<dyn std::error::Error>> {
    let content = std::fs::read_to_string(file)?;
    let mut lines = content.lines();
    let ssid = lines.next().ok_or("Missing SSID in credentials file")?.trim().to_string();
    let password = lines.next().ok_or("Missing password in credentials file")?.trim().to_string();
    Ok(WifiCredentials::new(ssid, password)?)
}

async fn scan_frames<C: Central, K: KeyStore>(flow: &mut SetupFlow<C, K>) -> Result<(), Box<dyn std::error::Error>> {
    flow.bluetooth_ready().await?;
    println!("Scanning for NovoFrame frames...");
    let frames = flow.scan(print_frame).await?;
    println!("\nFound {} frames", frames.len());
    Ok(())
}

fn print_frame(frame: &DiscoveredDevice) {
    let bars = "▮".repeat(frame.signal_bars() as usize);
    println!("  {} ({}) RSSI: {} dBm {bars}", frame.name, frame.id, frame.rssi);
}

async fn provision_frame<C: Central, K: KeyStore>(
    flow: &mut SetupFlow<C, K>,
    api: &HttpFrameApi,
    target: Option<String>,
    credentials: &WifiCredentials,
    name: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    flow.bluetooth_ready().await?;

    let device = match target {
        Some(id) => DeviceId::new(id),
        None => {
            println!("Scanning for NovoFrame frames...");
            let frames = flow.scan(print_frame).await?;
            let strongest = frames.into_iter().max_by_key(|f| f.rssi).ok_or("No NovoFrame frame found")?;
            strongest.id
        }
    };

    println!("Setting up {device} on {:?}...", credentials.ssid());
    let frame = match flow
        .provision(&device, credentials, |status| println!("  {}", status.message()))
        .await
    {
        Ok(frame) => frame,
        Err(e) => {
            report_failure(&e);
            return Err(e.into());
        }
    };
    println!("Frame {} is online (key {})", frame.mac_address, frame.encryption_key.fingerprint());

    if let Some(name) = name {
        let paired = flow.pair(api, &frame.mac_address, &name).await?;
        println!("Paired as {:?}", paired.name);
    }
    Ok(())
}

fn report_failure(e: &SetupError) {
    eprintln!("Setup failed: {e}");
    match e.remedy() {
        Remedy::ChangeWifi => eprintln!("Check the WiFi network name and password, then try again."),
        Remedy::Rescan => eprintln!("Make sure the frame is in setup mode and nearby, then scan again."),
    }
}

fn manage_key<K: KeyStore>(keys: &K, mac: &str, delete: bool) -> Result<(), Box<dyn std::error::Error>> {
    if delete {
        keys.delete_encryption_key(mac)?;
        println!("Forgot key for {mac}");
        return Ok(());
    }
    match keys.encryption_key(mac)? {
        Some(key) => println!("{mac}: {}", key.fingerprint()),
        None => println!("No key stored for {mac}"),
    }
    Ok(())
}
