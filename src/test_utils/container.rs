use crate::core::JarflowError;
use crate::image::ContainerTool;
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// A build recorded by [`FakeContainerTool`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedBuild {
    pub recipe: PathBuf,
    pub context: PathBuf,
    pub tags: Vec<String>,
}

/// Container tool that records what it was asked to do.
#[derive(Debug, Default)]
pub struct FakeContainerTool {
    builds: Mutex<Vec<RecordedBuild>>,
    pushed: Mutex<Vec<String>>,
    fail_build: bool,
    fail_push: bool,
}

impl FakeContainerTool {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn failing_build(mut self) -> Self {
        self.fail_build = true;
        self
    }

    #[must_use]
    pub fn failing_push(mut self) -> Self {
        self.fail_push = true;
        self
    }

    pub fn builds(&self) -> Vec<RecordedBuild> {
        self.builds.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn pushed(&self) -> Vec<String> {
        self.pushed.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl ContainerTool for FakeContainerTool {
    async fn build(&self, recipe: &Path, context: &Path, tags: &[String]) -> Result<()> {
        if self.fail_build {
            return Err(JarflowError::ToolCommandFailed {
                tool: "docker".to_string(),
                operation: "build".to_string(),
                stderr: "curl: (22) The requested URL returned error: 404".to_string(),
            }
            .into());
        }
        self.builds.lock().unwrap_or_else(PoisonError::into_inner).push(RecordedBuild {
            recipe: recipe.to_path_buf(),
            context: context.to_path_buf(),
            tags: tags.to_vec(),
        });
        Ok(())
    }

    async fn push(&self, reference: &str) -> Result<()> {
        if self.fail_push {
            return Err(JarflowError::ToolCommandFailed {
                tool: "docker".to_string(),
                operation: "push".to_string(),
                stderr: "denied: not authorized".to_string(),
            }
            .into());
        }
        self.pushed.lock().unwrap_or_else(PoisonError::into_inner).push(reference.to_string());
        Ok(())
    }
}
