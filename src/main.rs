mod api;
mod app;
mod reconciler;
mod state;
mod ui;
mod utils;

use std::path::PathBuf;

use clap::Parser;
use log::{error, warn};

use crate::app::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "wa-inbox", version, about = "Terminal inbox for a WhatsApp-style messaging backend")]
struct Args {
    /// Config file (defaults to <config dir>/wa-inbox.toml)
    #[arg(long)]
    config: Option<PathBuf>,
    /// Backend base URL, e.g. http://localhost:8000
    #[arg(long)]
    base_url: Option<String>,
    /// Your own phone number, used to tell outgoing messages apart
    #[arg(long)]
    self_number: Option<String>,
    /// Seconds between polls
    #[arg(long)]
    poll_interval: Option<u64>,
    /// Write the effective configuration back to the config file
    #[arg(long)]
    save: bool,
    /// More log output (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(url) = &self.base_url {
            config.base_url = crate::utils::normalize_url(url);
        }
        if let Some(number) = &self.self_number {
            config.self_number = number.trim().to_string();
        }
        if let Some(secs) = self.poll_interval {
            config.poll_interval_secs = secs;
        }
    }
}

fn main() {
    let args = Args::parse();
    let level = match args.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let path = match AppConfig::resolve_path(args.config.clone()) {
        Ok(path) => path,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    let mut config = match AppConfig::load(&path) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    args.apply(&mut config);

    if args.save {
        if let Err(e) = config.save(&path) {
            error!("{}", e);
        }
    }
    if config.self_number.is_empty() {
        warn!("self_number is not set; every message will be treated as incoming");
    }

    if let Err(e) = crate::utils::RUNTIME.block_on(crate::ui::main_window::show_main_window(config)) {
        error!("{}", e);
        std::process::exit(1);
    }
}
