use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use env_logger::Env;
use log::{debug, error, info};
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use layerscope::config::{DEFAULT_DOCKER_BINARY, DEFAULT_ROOT};
use layerscope::{report, DriverKind, InspectMode, Notifier, ScanConfig, Scanner};

/// Report produced, nothing skipped
const EXIT_OK: u8 = 0;
/// Report produced, some containers skipped
const EXIT_PARTIAL: u8 = 1;
/// Nothing could be reported
const EXIT_FATAL: u8 = 2;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum Format {
    Text,
    Json,
}

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(
        short,
        long,
        default_value = "aufs",
        value_parser = parse_driver,
        help = "Storage driver used by the Docker daemon (aufs, overlay2, devicemapper)"
    )]
    driver: DriverKind,

    #[arg(
        short,
        long,
        default_value = DEFAULT_ROOT,
        help = "Docker storage root"
    )]
    root: PathBuf,

    #[arg(
        short,
        long,
        value_enum,
        default_value = "text",
        help = "Output format"
    )]
    format: Format,

    #[arg(long, help = "Do not call docker inspect; name containers by their id")]
    no_inspect: bool,

    #[arg(
        long,
        default_value = DEFAULT_DOCKER_BINARY,
        help = "Docker CLI used to inspect containers"
    )]
    docker_bin: String,

    #[arg(
        long,
        default_value_t = 10,
        help = "Seconds to wait for docker inspect per container"
    )]
    inspect_timeout: u64,

    #[arg(
        long,
        default_value_t = 60,
        help = "Seconds allowed for measuring one diff folder (0 disables the limit)"
    )]
    size_timeout: u64,

    #[arg(
        long,
        default_value_t = layerscope::chain::DEFAULT_MAX_DEPTH,
        help = "Maximum number of layers in one parent chain"
    )]
    max_depth: usize,

    #[arg(
        short,
        long,
        action = clap::ArgAction::Count,
        help = "Verbose mode (-v for info, -vv for debug, -vvv for trace). Also disables the progress bar"
    )]
    verbose: u8,
}

fn parse_driver(name: &str) -> Result<DriverKind, layerscope::ScanError> {
    name.parse()
}

impl Cli {
    fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            root: self.root.clone(),
            driver: self.driver,
            inspect: if self.no_inspect {
                InspectMode::Offline
            } else {
                InspectMode::Docker {
                    binary: self.docker_bin.clone(),
                }
            },
            inspect_timeout: Duration::from_secs(self.inspect_timeout),
            size_timeout: (self.size_timeout > 0).then(|| Duration::from_secs(self.size_timeout)),
            max_chain_depth: self.max_depth,
        }
    }
}

fn run(cli: &Cli, notifier: Notifier) -> Result<bool> {
    let config = cli.scan_config();
    debug!("Configuration: {:?}", config);

    let scan = Scanner::from_config(config, notifier)
        .scan()
        .with_context(|| format!("Failed to scan {}", cli.root.display()))?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.format {
        Format::Text => report::render_text(&scan, &mut out).context("Failed to write report")?,
        Format::Json => {
            report::render_json(&scan, &mut out).context("Failed to write report")?;
            writeln!(out)?;
        }
    }

    info!(
        "Reported {} containers, skipped {}, {} orphaned diffs",
        scan.containers.len(),
        scan.skipped.len(),
        scan.orphans.len()
    );
    Ok(scan.is_complete())
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let notifier = Notifier::new(cli.verbose, cli.format == Format::Text);
    env_logger::Builder::from_env(Env::default())
        .filter_level(notifier.log_level())
        .init();

    match run(&cli, notifier) {
        Ok(true) => ExitCode::from(EXIT_OK),
        Ok(false) => ExitCode::from(EXIT_PARTIAL),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}
