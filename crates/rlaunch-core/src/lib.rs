//! Resolve the active R installation behind a notebook kernel and the
//! environment variables the RStudio / Shiny server binaries require.
//!
//! `kernel` answers "which interpreter backs the current session";
//! `resolve` queries that interpreter once for its installation paths and
//! folds them into an environment map. Launch-spec construction for the
//! server processes lives in the `rlaunch-servers` crate.

pub mod env_keys;
pub mod kernel;
pub mod resolve;
pub mod user;

pub use kernel::{JupyterKernelProvider, KernelProvider, KernelSpec, StaticKernelProvider};
pub use resolve::{
    resolve_interpreter, resolve_r_runtime, RRuntime, ResolveError, DEFAULT_QUERY_TIMEOUT,
};
