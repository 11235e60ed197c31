//! vcinv
//!
//! Ansible dynamic inventory for VMware vCenter: groups every VM by the guest
//! id VMware Tools reports and prints the result as inventory JSON.

use std::io;
use std::path::PathBuf;

use clap::{ArgGroup, Parser};
use color_eyre::Result;
use eyre::WrapErr;
use tracing_subscriber::EnvFilter;

mod app;
mod config;

use app::{Mode, RestConnector};
use config::Config;

#[derive(Parser)]
#[command(name = "vcinv")]
#[command(about = "Ansible dynamic inventory for VMware vCenter", version, long_about = None)]
#[command(group(ArgGroup::new("mode").required(true).args(["list", "host"])))]
struct Cli {
    /// Print the full inventory, grouped by guest id
    #[arg(long)]
    list: bool,

    /// Print the variables of a single host
    #[arg(long, value_name = "ADDRESS")]
    host: Option<String>,

    /// Config file (defaults to $VCINV_CONFIG, ./vcinv.toml, /etc/vcinv/vcinv.toml, then the
    /// user config dir)
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log more to stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn mode(&self) -> Mode {
        match &self.host {
            Some(host) => Mode::Host(host.clone()),
            None => Mode::List,
        }
    }
}

/// Log to stderr only; stdout carries the inventory document
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = Config::locate(cli.config.as_deref()).wrap_err("invalid configuration")?;

    let stdout = io::stdout();
    app::run(&cli.mode(), &config, &RestConnector, &mut stdout.lock())
        .await
        .wrap_err_with(|| format!("inventory of {} failed", config.server))?;

    Ok(())
}
