//! The launch-spec surface the host consumes: per-server command and
//! environment for a given port, plus static display metadata.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use thiserror::Error;

use rlaunch_core::resolve::ResolveError;

/// Static display metadata for a launcher entry in the host UI.
#[derive(Debug, Clone)]
pub struct LauncherEntry {
    pub title: &'static str,
    pub icon_path: PathBuf,
}

/// One launchable server: argv and environment for a given port.
///
/// Both methods are single-shot and stateless: each call resolves the R
/// runtime afresh and returns an independent result, so repeated or
/// concurrent calls are safe (at the cost of redundant interpreter queries).
pub trait ServerLauncher {
    fn launcher_entry(&self) -> LauncherEntry;

    /// argv for the server process listening on `port`.
    fn command(&self, port: u16) -> Result<Vec<String>, LaunchError>;

    /// Environment to merge into the spawned server process.
    fn environment(&self, port: u16) -> Result<BTreeMap<String, String>, LaunchError>;
}

/// Errors surfaced to the host's launch layer. The host reports these to
/// its user and does not spawn the process.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("cannot find '{name}' in PATH or at any of {fallbacks:?}")]
    ExecutableNotFound {
        name: &'static str,
        fallbacks: Vec<PathBuf>,
    },

    #[error("launch spec construction failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("could not determine the current OS user name")]
    UnknownUser,
}

pub(crate) fn icon_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("icons").join(name)
}
