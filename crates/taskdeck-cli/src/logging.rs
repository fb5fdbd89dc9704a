use std::fs::OpenOptions;
use std::io;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

pub const LOG_FILTER_ENV: &str = "TASKDECK_LOG";
pub const LOG_FILE_ENV: &str = "TASKDECK_LOG_FILE";
pub const LOG_STDERR_ENV: &str = "TASKDECK_LOG_STDERR";

/// Installs the global subscriber.
///
/// The dashboard owns the terminal, so logs go to `$TASKDECK_LOG_FILE` when set and are
/// dropped otherwise. `TASKDECK_LOG_STDERR=1` routes them to stderr instead.
pub fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    if env_flag(LOG_STDERR_ENV) {
        let _ = builder.with_writer(io::stderr).try_init();
        return;
    }

    if let Some(path) = std::env::var_os(LOG_FILE_ENV) {
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => {
                let _ = builder
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .try_init();
                return;
            }
            Err(err) => eprintln!("log_file_error: {err}"),
        }
    }

    let _ = builder.with_writer(io::sink).try_init();
}

fn env_flag(key: &str) -> bool {
    std::env::var(key)
        .map(|value| parse_bool_flag(&value).unwrap_or(false))
        .unwrap_or(false)
}

fn parse_bool_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
