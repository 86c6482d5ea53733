use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use camconfig::{Config, encryption};
use camscan::{DeviceReport, FfprobeInspector, NoopInspector, ScanSettings, Scanner, StreamInspector};
use serde_yaml::Value;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
Usage: camscan [OPTIONS]

Finds ONVIF cameras on the local private networks.

Options:
  --port <PORT>              TCP port scanned on every host (default 80)
  --username <NAME>          Camera username
  --password <PASSWORD>      Camera password
  --level <LEVEL>            Log level: trace, debug, info, warn, error
  --config-dir <DIR>         Configuration directory (default ~/.camscan)
  --json                     Print the reports as JSON
  --no-inspect               Do not inspect the streams with ffprobe
  --encrypt-password <PW>    Print the encrypted form of PW for config.yaml
  -h, --help                 Show this help";

#[derive(Debug, Default)]
struct Args {
    port: Option<u16>,
    username: Option<String>,
    password: Option<String>,
    level: Option<String>,
    config_dir: Option<PathBuf>,
    json: bool,
    no_inspect: bool,
    encrypt_password: Option<String>,
    help: bool,
}

fn parse_args<I>(args: I) -> Result<Args>
where
    I: IntoIterator<Item = String>,
{
    let mut parsed = Args::default();
    let mut args = args.into_iter();

    while let Some(arg) = args.next() {
        let mut value = |name: &str| {
            args.next()
                .ok_or_else(|| anyhow!("missing value for {}", name))
        };

        match arg.as_str() {
            "--port" => {
                let port = value("--port")?;
                parsed.port = Some(
                    port.parse()
                        .with_context(|| format!("invalid port: {}", port))?,
                );
            }
            "--username" => parsed.username = Some(value("--username")?),
            "--password" => parsed.password = Some(value("--password")?),
            "--level" => parsed.level = Some(value("--level")?),
            "--config-dir" => parsed.config_dir = Some(PathBuf::from(value("--config-dir")?)),
            "--encrypt-password" => parsed.encrypt_password = Some(value("--encrypt-password")?),
            "--json" => parsed.json = true,
            "--no-inspect" => parsed.no_inspect = true,
            "-h" | "--help" => parsed.help = true,
            other => bail!("unknown argument: {}\n\n{}", other, USAGE),
        }
    }

    Ok(parsed)
}

/// Command line values win over the configuration file.
fn apply_cli(config: &mut Config, args: &Args) -> Result<()> {
    if let Some(port) = args.port {
        config.set_value(&["scan", "port"], Value::from(port))?;
    }
    if let Some(username) = &args.username {
        config.set_value(&["camera", "username"], Value::from(username.as_str()))?;
    }
    if let Some(password) = &args.password {
        config.set_value(&["camera", "password"], Value::from(password.as_str()))?;
    }
    if let Some(level) = &args.level {
        config.set_value(&["logger", "min_level"], Value::from(level.as_str()))?;
    }
    if args.no_inspect {
        config.set_value(&["inspect", "enabled"], Value::Bool(false))?;
    }
    Ok(())
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.to_lowercase()))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_summary(reports: &[DeviceReport]) {
    if reports.is_empty() {
        println!("No ONVIF device found.");
        return;
    }

    for report in reports {
        let device = &report.device;
        let info = &device.information;

        println!("{}", device.address());
        println!(
            "  {} {} (firmware {}, serial {})",
            info.manufacturer, info.model, info.firmware_version, info.serial_number
        );
        if let Some(e) = report.status.error() {
            println!("  incomplete: {}", e);
        }

        for profile in &device.profiles {
            match &profile.bounds {
                Some(b) => println!(
                    "  [{}] {} {}x{} {}",
                    profile.token, profile.name, b.width, b.height, profile.uri
                ),
                None => println!("  [{}] {} {}", profile.token, profile.name, profile.uri),
            }
            for stream in &profile.streams {
                println!(
                    "      #{} {} {} {}x{} {}",
                    stream.index,
                    stream.codec_type,
                    stream.codec_name,
                    stream.width,
                    stream.height,
                    stream.avg_frame_rate
                );
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = parse_args(env::args().skip(1))?;

    if args.help {
        println!("{}", USAGE);
        return Ok(());
    }

    if let Some(password) = &args.encrypt_password {
        println!("{}", encryption::encrypt_password(password)?);
        return Ok(());
    }

    let mut config = Config::load(args.config_dir.as_deref())?;
    apply_cli(&mut config, &args)?;
    init_tracing(&config.log_min_level());

    if let Some(dir) = config.config_dir() {
        info!(config_dir = %dir.display(), "configuration loaded");
    }

    let settings = ScanSettings::from_config(&config)?;
    let inspector: Arc<dyn StreamInspector> = if config.inspect_enabled() {
        Arc::new(FfprobeInspector::new(
            config.ffprobe_path(),
            config.inspect_timeout(),
        ))
    } else {
        Arc::new(NoopInspector)
    };

    let scanner = Scanner::new(settings, inspector)?;
    let reports = scanner.run().await.map_err(|e| {
        error!(error = %e, "scan aborted");
        e
    })?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        print_summary(&reports);
    }

    info!(devices = reports.len(), "✅ scan finished");
    Ok(())
}
