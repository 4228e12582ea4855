use crate::{
    modules::taskbar::{Taskbar, action::MouseButton},
    render::JsonRenderer,
    services::{compositor::niri, xdg_icons::XdgIconResolver},
};
use anyhow::{Context, bail};
use clap::Parser;
use flexi_logger::{
    Age, Cleanup, Criterion, Duplicate, FileSpec, LogSpecBuilder, Logger, LoggerHandle, Naming,
};
use futures::StreamExt;
use log::{error, info, warn};
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

mod config;
mod modules;
mod render;
mod services;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Path of the TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Output to list windows for, defaults to the focused one
    #[arg(short, long)]
    output: Option<String>,
}

fn start_logger(log_level: &str) -> anyhow::Result<LoggerHandle> {
    let level = log_level.parse::<log::LevelFilter>().unwrap_or_else(|_| {
        eprintln!("Invalid log level {log_level:?}, using warn");
        log::LevelFilter::Warn
    });

    Logger::with(
        LogSpecBuilder::new()
            .module(
                "niri_taskbar",
                if cfg!(debug_assertions) {
                    log::LevelFilter::Info
                } else {
                    level
                },
            )
            .build(),
    )
    .log_to_file(FileSpec::default().directory("/tmp/niri-taskbar"))
    .duplicate_to_stderr(Duplicate::All)
    .rotate(
        Criterion::Age(Age::Day),
        Naming::Timestamps,
        Cleanup::KeepLogFiles(7),
    )
    .start()
    .context("Failed to start logger")
}

/// `<window id> <left|middle|right>`, buttons may also be given as 1, 2 or 3.
fn parse_click(line: &str) -> Option<(u64, MouseButton)> {
    let mut parts = line.split_whitespace();
    let window_id = parts.next()?.parse().ok()?;
    let button = match parts.next()? {
        "left" => MouseButton::Primary,
        "middle" => MouseButton::Middle,
        "right" => MouseButton::Secondary,
        other => MouseButton::from_number(other.parse().ok()?)?,
    };

    if parts.next().is_some() {
        return None;
    }

    Some((window_id, button))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = config::read_config(args.config.as_deref())?;
    let _logger = start_logger(&config.log_level)?;

    if !niri::is_available() {
        bail!("Niri is not running: NIRI_SOCKET is not set");
    }

    let service = niri::connect().await?;
    let output = match args.output {
        Some(output) => output,
        None => niri::focused_output().await?,
    };
    let icons = XdgIconResolver::new(config.taskbar.icon_themes(), config.taskbar.icon_size);
    let mut taskbar = Taskbar::new(
        output,
        config.taskbar,
        service,
        JsonRenderer::new(std::io::stdout()),
        icons,
    );
    info!("Starting taskbar on output {}", taskbar.output());
    let waiter = taskbar.events().waiter();

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    let signals_handle = signals.handle();
    let mut clicks = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = waiter.wait() => taskbar.update_if_requested(),
            line = clicks.next_line() => match line {
                Ok(Some(line)) => match parse_click(&line) {
                    Some((window_id, button)) => {
                        taskbar.on_click(window_id, button);
                    }
                    None => warn!("Ignoring malformed click {line:?}"),
                },
                Ok(None) => {
                    info!("stdin closed, exiting");
                    break;
                }
                Err(e) => {
                    error!("Failed to read clicks from stdin: {e}");
                    break;
                }
            },
            signal = signals.next() => {
                info!("Received signal {signal:?}, exiting");
                break;
            }
        }
    }

    signals_handle.close();
    taskbar.shutdown();

    Ok(())
}
