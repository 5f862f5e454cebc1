//! Run-scoped handoff of the image tag from the build stage to the descriptor stage.
//!
//! The message is typed: a reader gets either [`Handoff::Present`] with a validated
//! tag or [`Handoff::Absent`], never a raw string. On disk it is a single line
//! written atomically, so a reader never sees a partial tag.
//!
//! Inside one process (`jarflow run`) the same message travels over a oneshot
//! channel; the file is still written so separate jobs can read it.

use crate::core::JarflowError;
use crate::image::ImageTag;
use crate::utils::safe_write;
use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handoff {
    Present(ImageTag),
    Absent,
}

impl Handoff {
    /// Publish `tag` at `path`.
    pub fn write(path: &Path, tag: &ImageTag) -> Result<()> {
        safe_write(path, &format!("{tag}\n"))
            .with_context(|| format!("Failed to write handoff file {}", path.display()))
    }

    /// Read the handoff without consuming it. Missing or blank files are `Absent`.
    pub fn read(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("Handoff file {} does not exist", path.display());
                return Ok(Self::Absent);
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read handoff file {}", path.display()));
            }
        };

        let line = content.lines().next().unwrap_or("").trim();
        if line.is_empty() {
            return Ok(Self::Absent);
        }
        Ok(Self::Present(ImageTag::parse(line)?))
    }

    /// Read the handoff and remove the file, so it is consumed at most once.
    pub fn take(path: &Path) -> Result<Self> {
        let handoff = Self::read(path)?;
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to remove handoff file {}", path.display()))?;
            debug!("Consumed handoff file {}", path.display());
        }
        Ok(handoff)
    }

    /// Remove any handoff left at `path` by an earlier run.
    pub fn clear(path: &Path) -> Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => {
                debug!("Removed stale handoff file {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove stale handoff file {}", path.display()))
            }
        }
    }

    /// The tag, or [`JarflowError::MissingImageTag`] naming `path`.
    pub fn require(self, path: &Path) -> Result<ImageTag, JarflowError> {
        match self {
            Self::Present(tag) => Ok(tag),
            Self::Absent => Err(JarflowError::MissingImageTag {
                path: path.display().to_string(),
            }),
        }
    }
}
