//! Environment-variable key constants used across the workspace.
//!
//! The output names follow rstudio's src/cpp/core/r_util/REnvironmentPosix.cpp;
//! rserver expects the `RSTUDIO_DEFAULT_*` duplicates alongside the generic
//! `R_*` names.

// ─── Produced by the resolver ────────────────────────────────────────────────
pub const R_HOME: &str = "R_HOME";
pub const R_SHARE_DIR: &str = "R_SHARE_DIR";
pub const R_INCLUDE_DIR: &str = "R_INCLUDE_DIR";
pub const R_DOC_DIR: &str = "R_DOC_DIR";
pub const RSTUDIO_DEFAULT_R_VERSION: &str = "RSTUDIO_DEFAULT_R_VERSION";
pub const RSTUDIO_DEFAULT_R_VERSION_HOME: &str = "RSTUDIO_DEFAULT_R_VERSION_HOME";

// ─── Read from the kernel-declared environment ───────────────────────────────
pub const CONDA_PREFIX: &str = "CONDA_PREFIX";
pub const VIRTUAL_ENV: &str = "VIRTUAL_ENV";
pub const LD_LIBRARY_PATH: &str = "LD_LIBRARY_PATH";

// ─── Read from the ambient process environment ───────────────────────────────
pub const USER: &str = "USER";
pub const PATH: &str = "PATH";
pub const JUPYTER_PATH: &str = "JUPYTER_PATH";

// ─── rlaunch configuration ───────────────────────────────────────────────────
/// Bound (in seconds) on the interpreter environment query.
pub const RLAUNCH_QUERY_TIMEOUT_SECS: &str = "RLAUNCH_QUERY_TIMEOUT_SECS";
