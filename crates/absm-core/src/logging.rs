use tracing_subscriber::{fmt, EnvFilter};

use crate::{errors::Error, Result};

/// Initialize logging/tracing for the bot.
///
/// `RUST_LOG` wins when set. Otherwise our crates log at `info`, or `debug`
/// when the `DEBUG` flag is on, and everything else at `warn`.
pub fn init(service_name: &str, debug: bool) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(service_name, debug)));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(true)
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialized: {e}")))
}

fn default_directives(service_name: &str, debug: bool) -> String {
    let level = if debug { "debug" } else { "info" };
    format!(
        "warn,{service_name}={level},absm_core={level},absm_api={level},absm_telegram={level}"
    )
}
