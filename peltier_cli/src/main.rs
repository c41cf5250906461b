#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
//! `peltier` binary: serial host for a Peltier temperature controller.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands, FILE_GUARD, JSON_MODE};
use eyre::{Result, WrapErr};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    color_eyre::install()?;
    let args = Cli::parse();
    let _ = JSON_MODE.set(args.json);

    let cfg = load_config(&args)?;
    init_logging(&args, &cfg.logging);

    match args.cmd {
        Commands::Ports => commands::ports(),
        Commands::Monitor { port, sim, record } => {
            commands::monitor(&cfg, port.as_deref(), sim, record.as_deref())
        }
        Commands::Send { port, sim, temp } => commands::send(&cfg, port.as_deref(), sim, temp),
        Commands::Run {
            port,
            sim,
            profile,
            lag_offset_s,
            record,
        } => commands::run(
            &cfg,
            port.as_deref(),
            sim,
            &profile,
            lag_offset_s,
            record.as_deref(),
        ),
        Commands::View {
            log,
            profile,
            start_offset_s,
        } => commands::view(&log, profile.as_deref(), start_offset_s),
    }
}

/// Read and validate the config file; an absent file yields defaults.
fn load_config(args: &Cli) -> Result<peltier_config::Config> {
    let cfg = if args.config.exists() {
        let text = std::fs::read_to_string(&args.config)
            .wrap_err_with(|| format!("failed to read {}", args.config.display()))?;
        peltier_config::load_toml(&text)
            .wrap_err_with(|| format!("failed to parse {}", args.config.display()))?
    } else {
        peltier_config::Config::default()
    };
    cfg.validate().wrap_err("invalid configuration")?;
    Ok(cfg)
}

/// Console subscriber honoring `--log-level`/config, optionally teeing JSON
/// lines to a file via a non-blocking appender.
fn init_logging(args: &Cli, logging: &peltier_config::Logging) {
    let level = args
        .log_level
        .clone()
        .or_else(|| logging.level.clone())
        .unwrap_or_else(|| "info".to_string());
    let filter = EnvFilter::try_new(&level).unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(path) = &logging.file {
        let appender = tracing_appender::rolling::never(".", path);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let _ = FILE_GUARD.set(guard);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .with_writer(writer)
            .init();
        return;
    }

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if args.json || logging.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
