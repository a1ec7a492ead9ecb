#![deny(unused_must_use)]
#[macro_use]
extern crate lazy_static;

use args::TopLevelCmd;
use errors::AppError;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

use crate::app::App;

use rolling_file::{BasicRollingFileAppender, RollingConditionBasic};
use tracing::{info, warn};
use tracing_subscriber::{filter, prelude::*};
use tracing_subscriber::{fmt::time::ChronoLocal, layer::SubscriberExt, util::SubscriberInitExt};

#[cfg(not(any(debug_assertions, feature = "portable")))]
use directories::BaseDirs;

pub mod args;
pub mod errors;

pub mod app;
pub mod dispenser;
pub mod medication;
pub mod payload;
pub mod qr;
pub mod scan;
pub mod settings;
pub mod store;
pub mod structs;
pub mod transmit;

pub async fn run(arg_config: TopLevelCmd) -> Result<(), AppError> {
    let working_directory = determine_working_directory().ok_or(AppError::WorkDir)?;
    if !working_directory.exists() {
        std::fs::create_dir_all(&working_directory).map_err(|e| AppError::CreateDir {
            path: working_directory.clone(),
            source: e,
        })?;
    }
    std::env::set_current_dir(&working_directory)?;
    let log_name = std::env::current_exe()?
        .with_extension("log")
        .file_name()
        .ok_or(AppError::WorkDir)?
        .to_owned();
    let file_appender = BasicRollingFileAppender::new(
        log_name,
        RollingConditionBasic::new().max_size(1024 * 1024 * 5),
        2,
    )?;
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let time_fmt = ChronoLocal::new("%Y-%m-%d %H:%M:%S%.6f".to_owned());
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_file(false)
        .with_ansi(false)
        .with_target(true)
        .with_timer(time_fmt)
        .with_line_number(true)
        .with_filter(filter::LevelFilter::DEBUG);
    let (file_layer, reload_handle) = tracing_subscriber::reload::Layer::new(file_layer);
    // Warnings (like rejected QR lines) also go to the terminal
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(filter::LevelFilter::WARN);
    // Allow everything through but limit the BLE backends to just info, they're chatty
    let env_filter = tracing_subscriber::EnvFilter::new("trace,btleplug=info,bluez_async=info");
    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stderr_layer)
        .init();

    info!("Starting app... v{}", env!("CARGO_PKG_VERSION"));

    let cancel_token = CancellationToken::new();
    let ctrl_c_token = cancel_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Got Ctrl-C, stopping");
            ctrl_c_token.cancel();
        }
    });

    let mut app = App::build(&arg_config, Some(cancel_token))?;

    // Starting off at DEBUG, and setting to whatever user has defined
    reload_handle
        .modify(|layer| *layer.filter_mut() = app.settings.get_log_level())
        .map_err(|e| AppError::Logging(e.to_string()))?;

    // Write out a config with all defaults filled in
    app.save_settings()?;

    info!("Loaded config from: {}", app.config_path.display());
    info!("Using medication list: {}", app.store.path().display());

    let result = app.run_command(&arg_config.subcommands).await;
    info!("Shutting down...");
    result
}

/// Runs a command without touching the working directory or the global logger.
pub async fn run_headless(
    arg_config: TopLevelCmd,
    parent_token: CancellationToken,
) -> Result<(), AppError> {
    let mut app = App::build(&arg_config, Some(parent_token))?;
    app.save_settings()?;
    app.run_command(&arg_config.subcommands).await
}

/// Returns the directory that logs, config, and the medication list should be placed in by default.
// The rules for how it determines the directory is as follows:
// If the app is built with the portable feature, it will just return it's parent directory.
// If there is a config file present adjacent to the executable, the executable's parent path is returned.
// Otherwise, it will return the `directories` `config_dir` output.
//
// Debug builds are always portable. Release builds can optionally have the "portable" feature enabled.
fn determine_working_directory() -> Option<PathBuf> {
    let portable = is_portable();
    let exe_path = std::env::current_exe().ok()?;
    let exe_parent = exe_path.parent()?.to_path_buf();
    let config_path = exe_path.with_extension("toml");

    if portable || config_path.exists() {
        Some(exe_parent)
    } else {
        get_user_dir()
    }
}

#[cfg(any(debug_assertions, feature = "portable"))]
fn is_portable() -> bool {
    true
}

#[cfg(not(any(debug_assertions, feature = "portable")))]
fn is_portable() -> bool {
    false
}

#[cfg(any(debug_assertions, feature = "portable"))]
fn get_user_dir() -> Option<PathBuf> {
    None
}

#[cfg(not(any(debug_assertions, feature = "portable")))]
fn get_user_dir() -> Option<PathBuf> {
    if let Some(base_dirs) = BaseDirs::new() {
        let mut config_dir = base_dirs.config_dir().to_owned();
        config_dir.push(env!("CARGO_PKG_NAME"));
        Some(config_dir)
    } else {
        None
    }
}
