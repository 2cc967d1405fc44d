//! Value parsers for clap arguments

use std::path::PathBuf;

use feather_core::header::BlendVersion;
use feather_core::inputs::clean_path;
use feather_core::pipeline::Level;

use crate::cli::OutputFormat;

pub fn parse_format(s: &str) -> std::result::Result<OutputFormat, String> {
    s.parse::<OutputFormat>().map_err(|e| e.to_string())
}

/// Cleanup level 1-3
pub fn parse_level(s: &str) -> std::result::Result<Level, String> {
    let n: u8 = s.trim().parse().map_err(|_| format!("not a level: {s}"))?;
    Level::try_from(n).map_err(|e| e.to_string())
}

/// Input path with surrounding quotes and whitespace removed
pub fn parse_input_path(s: &str) -> std::result::Result<PathBuf, String> {
    let path = clean_path(s);
    if path.as_os_str().is_empty() {
        return Err("empty path".to_string());
    }
    Ok(path)
}

/// Blender version such as "4.5"; normalised to its display form
pub fn parse_version(s: &str) -> std::result::Result<String, String> {
    BlendVersion::parse(s)
        .map(|v| v.to_string())
        .map_err(|e| e.to_string())
}
