// # seedboxd - Dynamic Seedbox Keeper Daemon
//
// This daemon is a thin integration layer. All decisions live in
// seedbox-core; this file only:
// 1. Reads configuration from environment variables
// 2. Sets up logging
// 3. Wires the HTTP IP provider and the MAM transport into a Controller
// 4. Maps fatal conditions onto exit codes
//
// ## Configuration
//
// - `MAM_ID`: Session credential (required)
// - `DEBUG`: Any non-empty value enables detailed logging
// - `SEEDBOX_STATE_PATH`: State file (default `/data/mamapi.json`)
// - `SEEDBOX_IP_URL`: IP-echo endpoint (default `https://api.ipify.org`)
// - `SEEDBOX_NOTIFY_URL`: Notification endpoint
// - `SEEDBOX_HTTP_TIMEOUT_SECS`: Per-request timeout (default 30)
//
// ## Example
//
// ```bash
// export MAM_ID=your_session_cookie
// export SEEDBOX_STATE_PATH=/var/lib/seedbox/mamapi.json
//
// seedboxd
// ```

use anyhow::{Context, Result};
use seedbox_core::{
    Controller, Credential, Error, FatalReason, FileStateStore, NotificationClient, SeedboxConfig,
};
use seedbox_ip_http::HttpIpProvider;
use seedbox_notify_mam::MamTransport;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::{Level, error, info, warn};
use tracing_subscriber::fmt::writer::MakeWriterExt;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Exit codes for different termination scenarios
///
/// The keeper never finishes on its own, so 0 only follows a shutdown signal.
#[derive(Debug, Clone, Copy)]
enum SeedboxExitCode {
    /// Shutdown signal received
    CleanShutdown = 0,
    /// Missing or invalid configuration
    ConfigError = 1,
    /// Local failure: storage, permissions, runtime
    RuntimeError = 2,
    /// The remote rejected the session or credential
    SessionRejected = 3,
}

impl From<SeedboxExitCode> for ExitCode {
    fn from(code: SeedboxExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

impl From<&Error> for SeedboxExitCode {
    fn from(err: &Error) -> Self {
        match err {
            Error::Fatal(FatalReason::MissingCredential) | Error::Config(_) => Self::ConfigError,
            Error::Fatal(reason) if reason.is_remote_rejection() => Self::SessionRejected,
            _ => Self::RuntimeError,
        }
    }
}

/// Read configuration from environment variables
fn config_from_env() -> Result<SeedboxConfig> {
    let mut config = SeedboxConfig::new(Credential::new(
        env::var("MAM_ID").unwrap_or_default().trim(),
    ));

    config.debug = env::var("DEBUG").is_ok_and(|v| !v.is_empty());

    if let Ok(path) = env::var("SEEDBOX_STATE_PATH") {
        config.state_path = PathBuf::from(path);
    }
    if let Ok(url) = env::var("SEEDBOX_IP_URL") {
        config.ip_endpoint = url;
    }
    if let Ok(url) = env::var("SEEDBOX_NOTIFY_URL") {
        config.notify_endpoint = url;
    }
    if let Ok(secs) = env::var("SEEDBOX_HTTP_TIMEOUT_SECS") {
        config.http_timeout_secs = secs
            .parse()
            .with_context(|| format!("SEEDBOX_HTTP_TIMEOUT_SECS is not a number: {}", secs))?;
    }

    Ok(config)
}

/// Install the global subscriber: warnings and errors to stderr, the rest to stdout
fn init_tracing(debug: bool) -> Result<()> {
    let level = if debug { Level::DEBUG } else { Level::INFO };
    let writer = std::io::stderr
        .with_max_level(Level::WARN)
        .or_else(std::io::stdout);

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(writer)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")
}

fn log_banner(config: &SeedboxConfig) {
    info!("Starting seedboxd {}", env!("CARGO_PKG_VERSION"));
    if config.debug {
        info!("Logger level: DEBUG (enabled by DEBUG env var)");
    } else {
        info!("Logger level: INFO (default)");
        info!("Routine IP checks are not logged");
        info!("Log may appear empty if there are no IP changes");
    }
    info!("Checking for IP changes every 5 minutes");
    info!("State file: {}", config.state_path.display());
}

fn main() -> ExitCode {
    let config = match config_from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return SeedboxExitCode::ConfigError.into();
        }
    };

    if let Err(e) = init_tracing(config.debug) {
        eprintln!("{:#}", e);
        return SeedboxExitCode::ConfigError.into();
    }

    log_banner(&config);

    if let Err(e) = config.validate() {
        if e.fatal_reason() == Some(&FatalReason::MissingCredential) {
            error!("No mam_id assigned to the MAM_ID environment variable");
        } else {
            error!("Configuration validation error: {}", e);
        }
        error!("The keeper will now exit");
        return SeedboxExitCode::from(&e).into();
    }

    if config.uses_plain_http() {
        warn!("An endpoint uses HTTP (not HTTPS); the credential travels unencrypted");
    }

    // One thread of control for the whole loop
    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return SeedboxExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        tokio::select! {
            err = run_keeper(config) => {
                error!("{}", err);
                error!("The keeper will now exit");
                SeedboxExitCode::from(&err)
            }
            signal = wait_for_shutdown() => {
                match signal {
                    Ok(name) => {
                        info!("Received shutdown signal: {}", name);
                        SeedboxExitCode::CleanShutdown
                    }
                    Err(e) => {
                        error!("Shutdown error: {:#}", e);
                        SeedboxExitCode::RuntimeError
                    }
                }
            }
        }
    })
    .into()
}

/// Build the controller and run it; returns only the error that stopped it
async fn run_keeper(config: SeedboxConfig) -> Error {
    let timeout = Duration::from_secs(config.http_timeout_secs);

    let state_store = match FileStateStore::new(&config.state_path).await {
        Ok(store) => store,
        Err(e) => return e,
    };

    let controller = Controller::start(
        Box::new(HttpIpProvider::with_timeout(&config.ip_endpoint, timeout)),
        NotificationClient::new(Box::new(MamTransport::with_timeout(
            &config.notify_endpoint,
            timeout,
        ))),
        Box::new(state_store),
        config.credential,
    )
    .await;

    let mut controller = match controller {
        Ok(controller) => controller,
        Err(e) => return e,
    };

    match controller.run().await {
        Ok(never) => match never {},
        Err(e) => e,
    }
}

/// Wait for SIGTERM or SIGINT
#[cfg(unix)]
async fn wait_for_shutdown() -> Result<&'static str> {
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    Ok(tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    })
}

/// Wait for CTRL-C
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn wait_for_shutdown() -> Result<&'static str> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to wait for CTRL-C")?;
    Ok("SIGINT")
}
