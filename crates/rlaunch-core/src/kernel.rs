//! Kernel descriptor lookup: which interpreter backs the active notebook
//! session.
//!
//! Hosts either hand us a spec they already hold (`StaticKernelProvider`) or
//! let us read the registered Jupyter kernelspec from disk
//! (`JupyterKernelProvider`). Lookup failure is never fatal: callers branch
//! on the returned `Option` and degrade to a bare `R` executable.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::env_keys;

/// Conventional kernelspec name registered by IRkernel.
pub const DEFAULT_KERNEL_NAME: &str = "ir";

/// A registered kernel specification (the relevant subset of `kernel.json`).
/// Read-only input supplied by the host; never mutated here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KernelSpec {
    /// Interpreter argument list; the first element is the executable.
    #[serde(default)]
    pub argv: Vec<String>,
    /// Environment variables the kernel declares for its interpreter.
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub language: String,
}

/// Capability query for the active kernel. `None` means the host has no
/// usable kernel registry; resolution then falls back to defaults instead
/// of failing.
pub trait KernelProvider {
    fn active_kernel(&self) -> Option<KernelSpec>;
}

/// Provider backed by an in-memory spec, for hosts that already hold the
/// kernel metadata.
#[derive(Debug, Clone, Default)]
pub struct StaticKernelProvider {
    spec: Option<KernelSpec>,
}

impl StaticKernelProvider {
    pub fn new(spec: KernelSpec) -> Self {
        Self { spec: Some(spec) }
    }

    /// A provider with no kernel at all (forces the degraded path).
    pub fn empty() -> Self {
        Self { spec: None }
    }
}

impl KernelProvider for StaticKernelProvider {
    fn active_kernel(&self) -> Option<KernelSpec> {
        self.spec.clone()
    }
}

/// Provider that resolves a kernel name against the on-disk Jupyter
/// kernelspec registry (`<dir>/<name>/kernel.json`).
#[derive(Debug, Clone)]
pub struct JupyterKernelProvider {
    kernel_name: String,
    search_dirs: Vec<PathBuf>,
}

impl JupyterKernelProvider {
    /// Look up `kernel_name` in the standard Jupyter kernel directories.
    pub fn new(kernel_name: impl Into<String>) -> Self {
        Self {
            kernel_name: kernel_name.into(),
            search_dirs: default_search_dirs(),
        }
    }

    /// Look up `kernel_name` in explicit kernel directories only. Each
    /// directory is expected to contain `<name>/kernel.json` entries.
    pub fn with_search_dirs(kernel_name: impl Into<String>, search_dirs: Vec<PathBuf>) -> Self {
        Self {
            kernel_name: kernel_name.into(),
            search_dirs,
        }
    }
}

impl Default for JupyterKernelProvider {
    fn default() -> Self {
        Self::new(DEFAULT_KERNEL_NAME)
    }
}

impl KernelProvider for JupyterKernelProvider {
    fn active_kernel(&self) -> Option<KernelSpec> {
        for dir in &self.search_dirs {
            let path = dir.join(&self.kernel_name).join("kernel.json");
            if !path.is_file() {
                continue;
            }
            match load_kernel_spec(&path) {
                Ok(spec) => return Some(spec),
                Err(e) => {
                    tracing::warn!("Skipping unreadable kernelspec {}: {e:#}", path.display());
                }
            }
        }
        None
    }
}

fn load_kernel_spec(path: &Path) -> Result<KernelSpec> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Parse {}", path.display()))
}

/// Jupyter kernel directories, most specific first: `JUPYTER_PATH` entries,
/// the active conda/virtualenv prefix, the user data dir, then the
/// system-wide locations.
fn default_search_dirs() -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = Vec::new();
    if let Some(raw) = std::env::var_os(env_keys::JUPYTER_PATH) {
        for entry in std::env::split_paths(&raw) {
            if !entry.as_os_str().is_empty() {
                found.push(entry.join("kernels"));
            }
        }
    }
    for prefix_key in [env_keys::CONDA_PREFIX, env_keys::VIRTUAL_ENV] {
        if let Some(prefix) = std::env::var_os(prefix_key) {
            found.push(PathBuf::from(prefix).join("share/jupyter/kernels"));
        }
    }
    if let Some(data) = dirs::data_dir() {
        found.push(data.join("jupyter/kernels"));
    }
    found.push(PathBuf::from("/usr/local/share/jupyter/kernels"));
    found.push(PathBuf::from("/usr/share/jupyter/kernels"));
    found
}
