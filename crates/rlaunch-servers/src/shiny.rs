//! Shiny dashboard server launch spec: generated config file plus argv.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rlaunch_core::kernel::KernelProvider;
use rlaunch_core::resolve::{self, resolve_r_runtime};
use rlaunch_core::user;

use crate::launcher::{icon_path, LaunchError, LauncherEntry, ServerLauncher};

/// Executable name; PATH lookup is left to the host's spawn layer.
pub const SHINY_SERVER_EXECUTABLE: &str = "shiny-server";

/// Bookmark state directory name. The misspelling is what existing
/// deployments have on disk; change here if that ever becomes safe.
pub const BOOKMARK_STATE_DIR_NAME: &str = "shiny-server-boomarks";

/// Launch spec for shiny-server, serving `site_dir` as the site root.
///
/// The site directory and run-as user are injected at construction so the
/// builder is testable without touching process-wide state.
pub struct ShinyLauncher<P> {
    provider: P,
    site_dir: PathBuf,
    run_as: String,
    query_timeout: Duration,
}

impl<P: KernelProvider> ShinyLauncher<P> {
    pub fn new(provider: P, site_dir: impl Into<PathBuf>, run_as: impl Into<String>) -> Self {
        Self {
            provider,
            site_dir: site_dir.into(),
            run_as: run_as.into(),
            query_timeout: resolve::query_timeout_from_env(),
        }
    }

    /// Convenience constructor: site root is the process working directory,
    /// run-as is the current OS user.
    pub fn from_process(provider: P) -> Result<Self, LaunchError> {
        let site_dir = std::env::current_dir()?;
        let run_as = user::os_user_name().ok_or(LaunchError::UnknownUser)?;
        Ok(Self::new(provider, site_dir, run_as))
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }
}

impl<P: KernelProvider> ServerLauncher for ShinyLauncher<P> {
    fn launcher_entry(&self) -> LauncherEntry {
        LauncherEntry {
            title: "Shiny",
            icon_path: icon_path("shiny.svg"),
        }
    }

    fn command(&self, port: u16) -> Result<Vec<String>, LaunchError> {
        let conf = render_config(&self.run_as, port, &self.site_dir);
        let mut file = tempfile::Builder::new()
            .prefix("shiny-server-")
            .suffix(".conf")
            .tempfile()?;
        file.write_all(conf.as_bytes())?;
        // Keep the file on disk: shiny-server reads it at startup, after we
        // have returned. Ownership transfers to that process.
        let (_, path) = file.keep().map_err(|e| e.error)?;
        Ok(vec![
            SHINY_SERVER_EXECUTABLE.to_string(),
            path.display().to_string(),
        ])
    }

    fn environment(&self, _port: u16) -> Result<BTreeMap<String, String>, LaunchError> {
        Ok(resolve_r_runtime(&self.provider, self.query_timeout)?.env)
    }
}

fn render_config(run_as: &str, port: u16, site_dir: &Path) -> String {
    let site_dir = site_dir.display();
    format!(
        r#"run_as {run_as};
server {{
    bookmark_state_dir {site_dir}/{bookmarks};
    listen {port};
    location / {{
        site_dir {site_dir};
        log_dir {site_dir}/logs;
        directory_index on;
    }}
}}
"#,
        bookmarks = BOOKMARK_STATE_DIR_NAME,
    )
}
