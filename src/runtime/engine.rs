//! Container engine detection.

use std::path::Path;

use crate::error::RuntimeError;

/// Supported isolation engines, in preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Engine {
    Podman,
    Docker,
}

impl Engine {
    /// The engine binary name.
    pub fn command(&self) -> &'static str {
        match self {
            Engine::Podman => "podman",
            Engine::Docker => "docker",
        }
    }
}

impl std::fmt::Display for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.command())
    }
}

/// Finds a container engine on `PATH`, preferring podman.
pub fn detect_engine() -> Result<Engine, RuntimeError> {
    detect_engine_with(binary_on_path)
}

/// Detection with an injected lookup, for deterministic unit tests.
pub(crate) fn detect_engine_with(
    lookup: impl Fn(&str) -> bool,
) -> Result<Engine, RuntimeError> {
    for engine in [Engine::Podman, Engine::Docker] {
        if lookup(engine.command()) {
            tracing::debug!(engine = %engine, "Detected container engine");
            return Ok(engine);
        }
    }
    Err(RuntimeError::EngineMissing)
}

/// Checks whether an executable with the given name exists on `PATH`.
fn binary_on_path(name: &str) -> bool {
    let Some(path) = std::env::var_os("PATH") else {
        return false;
    };
    std::env::split_paths(&path).any(|dir| is_executable(&dir.join(name)))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
