//! Agent image cache and builder.
//!
//! "Build if missing, else reuse": an inspect query decides whether the
//! worker image already exists locally; only a miss triggers a build from
//! the Containerfile recipe. The existence check is cheap and issues no
//! network traffic, so calling [`ImageBuilder::ensure`] on every run is fine.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use super::engine::Engine;
use crate::error::RuntimeError;

/// Image reference for the containerized agent.
pub const AGENT_IMAGE: &str = "docforge-agent:latest";

/// Ensures the agent image exists, building it when absent.
pub struct ImageBuilder {
    engine_cmd: String,
    image: String,
    recipe: PathBuf,
    verbose: bool,
}

impl ImageBuilder {
    /// Creates a builder for the agent image using the detected engine.
    ///
    /// The recipe is the Containerfile at the crate root; its parent
    /// directory is the build context.
    pub fn new(engine: Engine, verbose: bool) -> Self {
        Self {
            engine_cmd: engine.command().to_string(),
            image: AGENT_IMAGE.to_string(),
            recipe: default_recipe_path(),
            verbose,
        }
    }

    /// Overrides the recipe file location.
    pub fn with_recipe(mut self, recipe: impl Into<PathBuf>) -> Self {
        self.recipe = recipe.into();
        self
    }

    /// Constructor with an arbitrary engine command, for hermetic tests.
    #[cfg(test)]
    pub(crate) fn with_command(engine_cmd: impl Into<String>, recipe: impl Into<PathBuf>) -> Self {
        Self {
            engine_cmd: engine_cmd.into(),
            image: AGENT_IMAGE.to_string(),
            recipe: recipe.into(),
            verbose: false,
        }
    }

    /// Builds the image if it does not exist locally.
    ///
    /// Idempotent: a present image returns immediately with no output. A
    /// failed build is fatal and carries the builder's diagnostic text.
    pub async fn ensure(&self) -> Result<(), RuntimeError> {
        let inspect = Command::new(&self.engine_cmd)
            .args(["image", "inspect", &self.image])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await?;
        if inspect.success() {
            tracing::debug!(image = %self.image, "Agent image already present");
            return Ok(());
        }

        if !self.recipe.exists() {
            return Err(RuntimeError::RecipeMissing {
                path: self.recipe.clone(),
            });
        }

        let context = self
            .recipe
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        tracing::info!(image = %self.image, engine = %self.engine_cmd, "Building agent image (first run)");

        let mut build = Command::new(&self.engine_cmd);
        build
            .args(["build", "-t", &self.image, "-f"])
            .arg(&self.recipe)
            .arg(&context);

        if self.verbose {
            // Stream build output live.
            let status = build.status().await?;
            if !status.success() {
                return Err(RuntimeError::ImageBuildFailed {
                    stderr: format!("build exited with code {}", status.code().unwrap_or(-1)),
                });
            }
        } else {
            let output = build.output().await?;
            if !output.status.success() {
                return Err(RuntimeError::ImageBuildFailed {
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }
        }

        tracing::info!(image = %self.image, "Agent image built");
        Ok(())
    }
}

/// Containerfile shipped at the crate root.
fn default_recipe_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("Containerfile")
}
