//! Launch Seam
//!
//! Command construction and process spawning live with an external
//! collaborator; the backend only hands a record across this boundary.

use log::info;

use crate::game::GameRecord;

pub trait GameLauncher: Send + Sync {
    fn launch(&self, game: &GameRecord) -> anyhow::Result<()>;
}

/// Default launcher used when no platform integration is wired in: records
/// the request and reports success.
pub struct LoggingLauncher;

impl GameLauncher for LoggingLauncher {
    fn launch(&self, game: &GameRecord) -> anyhow::Result<()> {
        info!("Launch requested for \"{}\" ({})", game.title, game.id);
        Ok(())
    }
}
