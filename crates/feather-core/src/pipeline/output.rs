//! Output stage

use std::path::{Path, PathBuf};

use tracing::info;

use super::Level;
use crate::document::Document;
use crate::error::{FeatherError, Result};

/// `<dir>/<stem>_L<level>.<ext>` for `<dir>/<stem>.<ext>`
pub fn output_path(input: &Path, level: Level) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{stem}_L{level}.{}", ext.to_string_lossy()),
        None => format!("{stem}_L{level}"),
    };
    input.with_file_name(name)
}

/// Persist the document next to the input and return where it went
pub fn write_output<D: Document + ?Sized>(
    doc: &mut D,
    input: &Path,
    level: Level,
    compress: bool,
) -> Result<PathBuf> {
    let output = output_path(input, level);
    if output == input {
        return Err(FeatherError::WouldOverwriteInput {
            path: input.to_path_buf(),
        });
    }
    doc.save_as(&output, compress)?;
    info!(output = %output.display(), compress, "saved");
    Ok(output)
}
