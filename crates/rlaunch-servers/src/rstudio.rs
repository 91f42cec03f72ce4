//! RStudio session server (rserver) launch spec.

use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::time::Duration;

use rlaunch_core::env_keys;
use rlaunch_core::kernel::KernelProvider;
use rlaunch_core::resolve::{self, resolve_r_runtime};
use rlaunch_core::user;

use crate::launcher::{icon_path, LaunchError, LauncherEntry, ServerLauncher};

pub const RSERVER_EXECUTABLE: &str = "rserver";

/// Install locations probed when rserver is not on PATH (rstudio-server deb).
pub const RSERVER_FALLBACK_PATHS: &[&str] = &["/usr/lib/rstudio-server/bin/rserver"];

/// Launch spec for rserver, proxied by port.
pub struct RStudioLauncher<P> {
    provider: P,
    query_timeout: Duration,
    search_path: Option<OsString>,
    fallback_paths: Vec<PathBuf>,
}

impl<P: KernelProvider> RStudioLauncher<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            query_timeout: resolve::query_timeout_from_env(),
            search_path: None,
            fallback_paths: RSERVER_FALLBACK_PATHS.iter().map(PathBuf::from).collect(),
        }
    }

    /// Override the executable search path (defaults to the process PATH).
    pub fn with_search_path(mut self, search_path: impl AsRef<OsStr>) -> Self {
        self.search_path = Some(search_path.as_ref().to_os_string());
        self
    }

    /// Override the well-known install paths probed after the search path.
    pub fn with_fallback_paths(mut self, fallback_paths: Vec<PathBuf>) -> Self {
        self.fallback_paths = fallback_paths;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout = timeout;
        self
    }

    /// rserver location: the bare name when it is on the search path (the
    /// spawn layer re-resolves it), else the first existing fallback path.
    fn locate_rserver(&self) -> Result<String, LaunchError> {
        let path = self
            .search_path
            .clone()
            .or_else(|| std::env::var_os(env_keys::PATH));
        if which::which_in(RSERVER_EXECUTABLE, path, ".").is_ok() {
            return Ok(RSERVER_EXECUTABLE.to_string());
        }
        for candidate in &self.fallback_paths {
            if candidate.exists() {
                return Ok(candidate.display().to_string());
            }
        }
        Err(LaunchError::ExecutableNotFound {
            name: RSERVER_EXECUTABLE,
            fallbacks: self.fallback_paths.clone(),
        })
    }
}

impl<P: KernelProvider> ServerLauncher for RStudioLauncher<P> {
    fn launcher_entry(&self) -> LauncherEntry {
        LauncherEntry {
            title: "RStudio",
            icon_path: icon_path("rstudio.svg"),
        }
    }

    fn command(&self, port: u16) -> Result<Vec<String>, LaunchError> {
        let executable = self.locate_rserver()?;
        let runtime = resolve_r_runtime(&self.provider, self.query_timeout)?;
        let mut argv = vec![
            executable,
            format!("--www-port={port}"),
            format!("--rsession-which-r={}", runtime.executable),
        ];
        if let Some(ld_path) = runtime
            .env
            .get(env_keys::LD_LIBRARY_PATH)
            .filter(|v| !v.is_empty())
        {
            argv.push(format!("--rsession-ld-library-path={ld_path}"));
        }
        Ok(argv)
    }

    fn environment(&self, _port: u16) -> Result<BTreeMap<String, String>, LaunchError> {
        let mut env = resolve_r_runtime(&self.provider, self.query_timeout)?.env;
        inject_user(&mut env, std::env::var(env_keys::USER).ok().as_deref());
        Ok(env)
    }
}

/// rserver needs USER set to something sensible, otherwise it surfaces an
/// authentication page instead of starting cleanly. Only fills in when the
/// ambient process environment has no non-empty USER.
fn inject_user(env: &mut BTreeMap<String, String>, ambient_user: Option<&str>) {
    if ambient_user.map_or(false, |u| !u.is_empty()) {
        return;
    }
    match user::os_user_name() {
        Some(name) => {
            env.insert(env_keys::USER.to_string(), name);
        }
        None => tracing::warn!(
            "USER is unset and the current uid has no passwd entry; rserver may show an auth prompt"
        ),
    }
}
