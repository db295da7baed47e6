//! Log subscriber setup.

use crate::config::LoggingConfig;
use crate::error::{PawpalError, PawpalResult};

/// Install a global `tracing` subscriber built from `config`.
///
/// Returns `Ok(false)` when a subscriber was already installed, so calling
/// this from several entry points (or tests) is harmless.
pub fn init(config: &LoggingConfig) -> PawpalResult<bool> {
    let builder = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::from(config.level))
        .with_target(config.include_targets);

    let installed = if config.json_format {
        builder.json().try_init()
    } else {
        builder.with_ansi(config.colored).try_init()
    };

    match installed {
        Ok(()) => Ok(true),
        Err(err) if tracing::dispatcher::has_been_set() => {
            tracing::debug!("Logging already initialized: {}", err);
            Ok(false)
        }
        Err(err) => Err(PawpalError::config(format!("failed to install logger: {}", err))),
    }
}
