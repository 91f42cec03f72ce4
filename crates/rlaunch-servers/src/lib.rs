//! Launch-spec builders for the two R server processes a notebook host
//! proxies: the Shiny dashboard server and the RStudio session server.
//!
//! The host picks a launcher, calls `environment(port)` and `command(port)`,
//! spawns the result, and proxies the port. Nothing here manages the spawned
//! process's lifecycle.

pub mod launcher;
pub mod rstudio;
pub mod shiny;

pub use launcher::{LaunchError, LauncherEntry, ServerLauncher};
pub use rstudio::RStudioLauncher;
pub use shiny::ShinyLauncher;
