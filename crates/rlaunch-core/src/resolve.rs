//! R environment resolution: find the interpreter behind the active kernel
//! and query it once for the installation paths rserver and shiny-server
//! need at startup.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::env_keys;
use crate::kernel::KernelProvider;

/// Default bound on the interpreter query. Overridable via
/// `RLAUNCH_QUERY_TIMEOUT_SECS`.
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Poll interval while waiting for the query subprocess.
const WAIT_POLL_INTERVAL_MS: u64 = 50;

/// Expression handed to `R -e`: prints the five installation fields,
/// colon-separated, with no trailing newline.
const R_ENV_QUERY: &str = concat!(
    r#"cat(paste(R.home("home"),R.home("share"),R.home("include"),"#,
    r#"R.home("doc"),getRversion(),sep=":"))"#
);

/// Errors from the interpreter environment query.
///
/// Kernel lookup failure is deliberately not represented here: it only
/// degrades the result (see [`resolve_interpreter`]), while every variant
/// below makes the result unusable and is propagated to the host.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to invoke R interpreter '{executable}': {source}")]
    Spawn {
        executable: String,
        #[source]
        source: std::io::Error,
    },
    #[error("R environment query via '{executable}' exited with status {code}: {stderr}")]
    Query {
        executable: String,
        code: i32,
        stderr: String,
    },
    #[error("R environment query timed out after {0:?}")]
    Timeout(Duration),
    #[error("R environment query printed {fields} field(s), expected 5: {output:?}")]
    MalformedOutput { fields: usize, output: String },
    #[error("failed waiting for R environment query: {0}")]
    Wait(#[source] std::io::Error),
}

/// Shared resolver output: the interpreter executable and the environment
/// map handed to the launched server process. Built fresh on every call,
/// never cached.
#[derive(Debug, Clone, Default)]
pub struct RRuntime {
    pub executable: String,
    pub env: BTreeMap<String, String>,
}

/// Resolve the interpreter and base environment from the kernel registry.
///
/// Never fails: a missing kernel or an empty argv degrades to the bare `R`
/// executable on PATH with an empty environment, logged as a warning.
pub fn resolve_interpreter(provider: &dyn KernelProvider) -> RRuntime {
    let Some(spec) = provider.active_kernel() else {
        tracing::warn!("No active kernel found; falling back to 'R' on PATH");
        return RRuntime {
            executable: "R".to_string(),
            env: BTreeMap::new(),
        };
    };
    let Some(executable) = spec.argv.first().cloned() else {
        tracing::warn!("Kernel spec has an empty argv; falling back to 'R' on PATH");
        return RRuntime {
            executable: "R".to_string(),
            env: BTreeMap::new(),
        };
    };
    let mut env = spec.env;
    // The conda env's lib directory takes precedence over any declared
    // LD_LIBRARY_PATH: the R the kernel points at is linked against it.
    if let Some(prefix) = env.get(env_keys::CONDA_PREFIX) {
        let lib_dir = Path::new(prefix).join("lib");
        env.insert(
            env_keys::LD_LIBRARY_PATH.to_string(),
            lib_dir.display().to_string(),
        );
    }
    RRuntime { executable, env }
}

/// Resolve the full R runtime: the interpreter plus the installation paths
/// the server binaries require (`R_HOME`, `R_SHARE_DIR`, ...).
///
/// Runs one bounded subprocess; a hang in the queried interpreter surfaces
/// as [`ResolveError::Timeout`] instead of blocking the host forever.
pub fn resolve_r_runtime(
    provider: &dyn KernelProvider,
    timeout: Duration,
) -> Result<RRuntime, ResolveError> {
    let mut runtime = resolve_interpreter(provider);
    let output = query_r(&runtime.executable, timeout)?;
    let output = output.trim_end_matches(['\r', '\n']);
    let parts: Vec<&str> = output.split(':').collect();
    let [home, share, include, doc, version] = parts.as_slice() else {
        // Startup banners or site profiles printing to stdout land here.
        return Err(ResolveError::MalformedOutput {
            fields: parts.len(),
            output: output.to_string(),
        });
    };

    let env = &mut runtime.env;
    env.insert(env_keys::R_HOME.to_string(), (*home).to_string());
    env.insert(env_keys::R_SHARE_DIR.to_string(), (*share).to_string());
    env.insert(env_keys::R_INCLUDE_DIR.to_string(), (*include).to_string());
    env.insert(env_keys::R_DOC_DIR.to_string(), (*doc).to_string());
    // rserver expects install-manifest style names alongside the generic ones.
    env.insert(
        env_keys::RSTUDIO_DEFAULT_R_VERSION_HOME.to_string(),
        (*home).to_string(),
    );
    env.insert(
        env_keys::RSTUDIO_DEFAULT_R_VERSION.to_string(),
        (*version).to_string(),
    );
    Ok(runtime)
}

/// Query timeout from `RLAUNCH_QUERY_TIMEOUT_SECS`, falling back to
/// [`DEFAULT_QUERY_TIMEOUT`] when unset or unparseable.
pub fn query_timeout_from_env() -> Duration {
    match std::env::var(env_keys::RLAUNCH_QUERY_TIMEOUT_SECS) {
        Ok(raw) => match raw.parse::<u64>() {
            Ok(secs) => Duration::from_secs(secs),
            Err(_) => {
                tracing::warn!(
                    "Invalid {}: {raw}, using default",
                    env_keys::RLAUNCH_QUERY_TIMEOUT_SECS
                );
                DEFAULT_QUERY_TIMEOUT
            }
        },
        Err(_) => DEFAULT_QUERY_TIMEOUT,
    }
}

fn query_r(executable: &str, timeout: Duration) -> Result<String, ResolveError> {
    let mut child = Command::new(executable)
        .args(["--slave", "--vanilla", "-e", R_ENV_QUERY])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ResolveError::Spawn {
            executable: executable.to_string(),
            source,
        })?;

    let (stdout, stderr, status) = wait_with_timeout(&mut child, timeout)?;
    if !status.success() {
        return Err(ResolveError::Query {
            executable: executable.to_string(),
            code: status.code().unwrap_or(-1),
            stderr: stderr.trim().to_string(),
        });
    }
    Ok(stdout)
}

/// Wait for the query subprocess with a deadline.
///
/// Reads stdout/stderr in background threads while the process runs;
/// without this a child writing more than the pipe buffer would block on
/// write and we would deadlock waiting for it to exit.
fn wait_with_timeout(
    child: &mut Child,
    timeout: Duration,
) -> Result<(String, String, ExitStatus), ResolveError> {
    let stdout_handle = child.stdout.take().map(|mut out| {
        thread::spawn(move || {
            let mut s = String::new();
            let _ = out.read_to_string(&mut s);
            s
        })
    });
    let stderr_handle = child.stderr.take().map(|mut err| {
        thread::spawn(move || {
            let mut s = String::new();
            let _ = err.read_to_string(&mut s);
            s
        })
    });

    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let stdout = stdout_handle
                    .map(|h| h.join().unwrap_or_default())
                    .unwrap_or_default();
                let stderr = stderr_handle
                    .map(|h| h.join().unwrap_or_default())
                    .unwrap_or_default();
                return Ok((stdout, stderr, status));
            }
            Ok(None) => {
                if start.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    if let Some(h) = stdout_handle {
                        let _ = h.join();
                    }
                    if let Some(h) = stderr_handle {
                        let _ = h.join();
                    }
                    return Err(ResolveError::Timeout(timeout));
                }
                thread::sleep(Duration::from_millis(WAIT_POLL_INTERVAL_MS));
            }
            Err(e) => {
                let _ = child.kill();
                if let Some(h) = stdout_handle {
                    let _ = h.join();
                }
                if let Some(h) = stderr_handle {
                    let _ = h.join();
                }
                return Err(ResolveError::Wait(e));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{KernelSpec, StaticKernelProvider};

    #[cfg(unix)]
    fn fake_r(dir: &Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-r");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    fn provider_for(executable: String) -> StaticKernelProvider {
        StaticKernelProvider::new(KernelSpec {
            argv: vec![executable],
            ..Default::default()
        })
    }

    #[test]
    fn missing_kernel_degrades_to_bare_r() {
        let runtime = resolve_interpreter(&StaticKernelProvider::empty());
        assert_eq!(runtime.executable, "R");
        assert!(runtime.env.is_empty());
    }

    #[test]
    fn empty_argv_degrades_to_bare_r() {
        let runtime = resolve_interpreter(&StaticKernelProvider::new(KernelSpec::default()));
        assert_eq!(runtime.executable, "R");
        assert!(runtime.env.is_empty());
    }

    #[test]
    fn kernel_env_is_copied_verbatim() {
        let mut env = BTreeMap::new();
        env.insert("R_LIBS_USER".to_string(), "~/rlibs".to_string());
        let spec = KernelSpec {
            argv: vec!["/opt/R/bin/R".to_string()],
            env,
            ..Default::default()
        };
        let runtime = resolve_interpreter(&StaticKernelProvider::new(spec));
        assert_eq!(runtime.executable, "/opt/R/bin/R");
        assert_eq!(runtime.env["R_LIBS_USER"], "~/rlibs");
    }

    #[test]
    fn conda_prefix_overrides_declared_ld_library_path() {
        let mut env = BTreeMap::new();
        env.insert(env_keys::CONDA_PREFIX.to_string(), "/opt/x".to_string());
        env.insert(
            env_keys::LD_LIBRARY_PATH.to_string(),
            "/elsewhere/lib".to_string(),
        );
        let spec = KernelSpec {
            argv: vec!["R".to_string()],
            env,
            ..Default::default()
        };
        let runtime = resolve_interpreter(&StaticKernelProvider::new(spec));
        assert_eq!(runtime.env[env_keys::LD_LIBRARY_PATH], "/opt/x/lib");
    }

    #[cfg(unix)]
    #[test]
    fn five_field_output_maps_to_fixed_keys() {
        let tmp = tempfile::tempdir().unwrap();
        let r = fake_r(
            tmp.path(),
            r"printf '/opt/R:/opt/R/share:/opt/R/include:/opt/R/doc:4.3.1'",
        );
        let runtime = resolve_r_runtime(&provider_for(r), Duration::from_secs(5)).unwrap();
        assert_eq!(runtime.env[env_keys::R_HOME], "/opt/R");
        assert_eq!(runtime.env[env_keys::R_SHARE_DIR], "/opt/R/share");
        assert_eq!(runtime.env[env_keys::R_INCLUDE_DIR], "/opt/R/include");
        assert_eq!(runtime.env[env_keys::R_DOC_DIR], "/opt/R/doc");
        assert_eq!(runtime.env[env_keys::RSTUDIO_DEFAULT_R_VERSION], "4.3.1");
        assert_eq!(runtime.env[env_keys::RSTUDIO_DEFAULT_R_VERSION_HOME], "/opt/R");
    }

    #[cfg(unix)]
    #[test]
    fn trailing_newline_is_tolerated() {
        let tmp = tempfile::tempdir().unwrap();
        let r = fake_r(tmp.path(), r"echo '/a:/b:/c:/d:4.0.0'");
        let runtime = resolve_r_runtime(&provider_for(r), Duration::from_secs(5)).unwrap();
        assert_eq!(runtime.env[env_keys::RSTUDIO_DEFAULT_R_VERSION], "4.0.0");
    }

    #[cfg(unix)]
    #[test]
    fn banner_text_is_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let r = fake_r(tmp.path(), r"printf 'R version 4.3.1 (Beagle Scouts)'");
        let err = resolve_r_runtime(&provider_for(r), Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, ResolveError::MalformedOutput { fields: 1, .. }));
    }

    #[cfg(unix)]
    #[test]
    fn six_fields_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let r = fake_r(tmp.path(), r"printf '/a:/b:/c:/d:4.3.1:extra'");
        let err = resolve_r_runtime(&provider_for(r), Duration::from_secs(5)).unwrap_err();
        assert!(matches!(err, ResolveError::MalformedOutput { fields: 6, .. }));
    }

    #[cfg(unix)]
    #[test]
    fn nonzero_exit_is_a_query_error() {
        let tmp = tempfile::tempdir().unwrap();
        let r = fake_r(tmp.path(), "echo boom >&2\nexit 2");
        let err = resolve_r_runtime(&provider_for(r), Duration::from_secs(5)).unwrap_err();
        match err {
            ResolveError::Query { code, stderr, .. } => {
                assert_eq!(code, 2);
                assert!(stderr.contains("boom"));
            }
            other => panic!("expected Query error, got {other:?}"),
        }
    }

    #[test]
    fn unknown_executable_is_a_spawn_error() {
        let provider = provider_for("/nonexistent/definitely-not-r".to_string());
        let err = resolve_r_runtime(&provider, Duration::from_secs(1)).unwrap_err();
        assert!(matches!(err, ResolveError::Spawn { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn hanging_interpreter_times_out() {
        let tmp = tempfile::tempdir().unwrap();
        let r = fake_r(tmp.path(), "exec sleep 30");
        let err = resolve_r_runtime(&provider_for(r), Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, ResolveError::Timeout(_)));
    }
}
