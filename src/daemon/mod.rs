// Daemon module - main monitoring loop and service

mod reaper;
mod service;

pub use service::DaemonService;

use crate::config::Config;
use anyhow::Result;

/// Run the daemon with an already-validated configuration. Logging is set
/// up by the caller before this is invoked.
pub fn run(config: Config) -> Result<()> {
    reaper::install()?;
    let service = DaemonService::new(config);
    service.run()
}
