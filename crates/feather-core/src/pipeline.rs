//! The cleanup pipeline
//!
//! Stages run strictly in order, once per file:
//!
//! 1. world removal (when requested, any level)
//! 2. orphan purge
//! 3. extras removal (level 2 and up)
//! 4. fake-user clearing (level 3)
//! 5. rebuild through a snapshot (level 3)
//! 6. output to `<stem>_L<level>.<ext>`

pub mod cleanup;
pub mod output;
pub mod purge;
pub mod rebuild;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, info_span};

use crate::document::Document;
use crate::error::{FeatherError, Result};
use crate::trace_time;

pub use purge::{PurgePolicy, PurgeReport};
pub use rebuild::RebuildReport;

/// Lightweighting level; each level does everything the previous one does
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(into = "u8")]
pub struct Level(u8);

impl Level {
    pub const PURGE: Level = Level(1);
    pub const EXTRAS: Level = Level(2);
    pub const REBUILD: Level = Level(3);

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Level {
    type Error = FeatherError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1..=3 => Ok(Level(value)),
            other => crate::bail_invalid!("level (expected 1, 2 or 3)", other),
        }
    }
}

impl From<Level> for u8 {
    fn from(level: Level) -> u8 {
        level.0
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Everything the pipeline needs besides the document and the input path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineOptions {
    pub level: Level,
    pub compress: bool,
    pub delete_worlds: bool,
    /// Also reload objects directly during the rebuild (level 3 only)
    pub experimental_append: bool,
    pub purge: PurgePolicy,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            level: Level::PURGE,
            compress: false,
            delete_worlds: false,
            experimental_append: false,
            purge: PurgePolicy::default(),
        }
    }
}

/// What one pipeline run did
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub level: Level,
    pub blocks_before: usize,
    pub blocks_after: usize,
    pub worlds_removed: usize,
    pub purge: PurgeReport,
    pub extras_removed: usize,
    pub fake_users_cleared: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rebuild: Option<RebuildReport>,
}

/// Run every stage the options ask for and write the output file
pub fn run<D: Document + ?Sized>(
    doc: &mut D,
    input: &Path,
    options: &PipelineOptions,
) -> Result<PipelineReport> {
    let span = info_span!("pipeline", input = %input.display(), level = %options.level);
    let _enter = span.enter();
    let start = Instant::now();

    let blocks_before = doc.block_count()?;
    debug!(blocks_before, "pipeline_start");

    let worlds_removed = if options.delete_worlds {
        cleanup::delete_worlds(doc)?
    } else {
        0
    };

    let purge = purge::purge(doc, options.purge)?;
    trace_time!(start, "purge", removed = purge.removed);

    let extras_removed = if options.level >= Level::EXTRAS {
        cleanup::delete_extras(doc)?
    } else {
        0
    };

    let (fake_users_cleared, rebuild) = if options.level >= Level::REBUILD {
        let cleared = cleanup::clear_fake_users(doc)?;
        let report = rebuild::rebuild(doc, input, options.experimental_append)?;
        trace_time!(start, "rebuild");
        (cleared, Some(report))
    } else {
        (0, None)
    };

    let output = output::write_output(doc, input, options.level, options.compress)?;
    let blocks_after = doc.block_count()?;
    info!(
        output = %output.display(),
        blocks_before,
        blocks_after,
        elapsed = ?start.elapsed(),
        "pipeline_done"
    );

    Ok(PipelineReport {
        input: input.to_path_buf(),
        output,
        level: options.level,
        blocks_before,
        blocks_after,
        worlds_removed,
        purge,
        extras_removed,
        fake_users_cleared,
        rebuild,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_bounds() {
        assert!(Level::try_from(0).is_err());
        assert_eq!(Level::try_from(2).unwrap(), Level::EXTRAS);
        assert!(Level::try_from(4).is_err());
    }

    #[test]
    fn test_level_ordering() {
        assert!(Level::PURGE < Level::EXTRAS);
        assert!(Level::REBUILD >= Level::EXTRAS);
    }

    #[test]
    fn test_level_serializes_as_number() {
        assert_eq!(serde_json::to_string(&Level::REBUILD).unwrap(), "3");
    }
}
