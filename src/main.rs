mod cli;
mod config;
mod logging;
mod models;
mod paginate;
mod tagging;
#[cfg(test)]
mod test_support;
mod transport;
mod ui;

use std::error::Error;
use std::fmt;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run() -> Result<(), AppError> {
    use clap::Parser;

    let cli = cli::Cli::parse();
    logging::init(cli.verbose);

    let config = config::SyncConfig::resolve(&cli)?;
    tracing::debug!(?config, "resolved configuration");

    let backend = transport::ReqwestBackend::new(config.timeout).map_err(AppError::Client)?;
    let transport = transport::Transport::new(&config.base_url, &config.token, Box::new(backend))
        .with_retry(config.retry);

    let summary = tagging::SyncService::new(&transport, config.sync_options()).run()?;
    if cli.json {
        print_json(&summary)?;
    } else {
        ui::print_summary(&summary);
    }
    Ok(())
}

#[derive(Debug)]
pub enum AppError {
    Config(config::ConfigError),
    Client(reqwest::Error),
    Sync(tagging::SyncError),
    Json(serde_json::Error),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Config(err) => write!(f, "configuration error: {}", err),
            AppError::Client(err) => write!(f, "cannot build HTTP client: {}", err),
            AppError::Sync(err) => write!(f, "{}", err),
            AppError::Json(err) => write!(f, "JSON output error: {}", err),
        }
    }
}

impl Error for AppError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            AppError::Config(err) => Some(err),
            AppError::Client(err) => Some(err),
            AppError::Sync(err) => Some(err),
            AppError::Json(err) => Some(err),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(value: config::ConfigError) -> Self {
        AppError::Config(value)
    }
}

impl From<tagging::SyncError> for AppError {
    fn from(value: tagging::SyncError) -> Self {
        AppError::Sync(value)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        AppError::Json(value)
    }
}
