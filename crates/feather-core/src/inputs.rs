//! Input path handling: cleanup, precondition checks and directory expansion

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{FeatherError, Result};
use crate::pipeline::rebuild::SNAPSHOT_MARKER;

/// Strip whitespace and the quotes shells and file managers wrap around
/// dragged-in paths, balanced or not.
pub fn clean_path(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    let unquoted = match trimmed.as_bytes() {
        [q @ (b'"' | b'\''), .., last] if last == q && trimmed.len() >= 2 => {
            &trimmed[1..trimmed.len() - 1]
        }
        [b'"' | b'\'', ..] => &trimmed[1..],
        [.., b'"' | b'\''] => &trimmed[..trimmed.len() - 1],
        _ => trimmed,
    };
    PathBuf::from(unquoted.trim())
}

/// The file must exist and carry the expected extension (case-insensitive)
pub fn check_input(path: &Path, extension: &str) -> Result<()> {
    if !path.is_file() {
        return Err(FeatherError::FileNotFound {
            path: path.to_path_buf(),
        });
    }
    if !has_extension(path, extension) {
        return Err(FeatherError::WrongExtension {
            path: path.to_path_buf(),
            expected: extension.to_string(),
        });
    }
    Ok(())
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}

/// Files feather wrote itself: `<stem>_L1..3.<ext>` outputs and snapshots
pub fn is_feather_artifact(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    if name.contains(SNAPSHOT_MARKER) {
        return true;
    }
    path.file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|stem| ["_L1", "_L2", "_L3"].iter().any(|s| stem.ends_with(s)))
}

/// Expand the given paths into the list of files to process, in order.
///
/// Files are passed through unchecked so that precondition errors surface per
/// file. Directories require `recursive` and contribute every file with the
/// wanted extension that feather did not produce itself.
pub fn expand(paths: &[PathBuf], extension: &str, recursive: bool) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if !path.is_dir() {
            files.push(path.clone());
            continue;
        }
        if !recursive {
            crate::bail_usage!(format!(
                "{} is a directory (pass --recursive to process its files)",
                path.display()
            ));
        }

        let mut found: Vec<PathBuf> = WalkDir::new(path)
            .follow_links(false)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|p| has_extension(p, extension) && !is_feather_artifact(p))
            .collect();
        found.sort();
        debug!(dir = %path.display(), count = found.len(), "expand_directory");
        files.extend(found);
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_clean_path_quotes() {
        assert_eq!(clean_path("  \"C:/a b/c.blend\" "), PathBuf::from("C:/a b/c.blend"));
        assert_eq!(clean_path("'scene.blend'"), PathBuf::from("scene.blend"));
        assert_eq!(clean_path("\"scene.blend"), PathBuf::from("scene.blend"));
        assert_eq!(clean_path("scene.blend'"), PathBuf::from("scene.blend"));
        assert_eq!(clean_path("scene.blend"), PathBuf::from("scene.blend"));
    }

    #[test]
    fn test_check_input_missing() {
        let dir = tempdir().unwrap();
        let err = check_input(&dir.path().join("nope.blend"), "blend").unwrap_err();
        assert!(matches!(err, FeatherError::FileNotFound { .. }));
    }

    #[test]
    fn test_check_input_wrong_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("scene.txt");
        fs::write(&path, "x").unwrap();
        let err = check_input(&path, "blend").unwrap_err();
        assert!(matches!(err, FeatherError::WrongExtension { .. }));
    }

    #[test]
    fn test_check_input_extension_case_insensitive() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("SCENE.BLEND");
        fs::write(&path, "x").unwrap();
        check_input(&path, "blend").unwrap();
    }

    #[test]
    fn test_is_feather_artifact() {
        assert!(is_feather_artifact(Path::new("/x/scene_L3.blend")));
        assert!(is_feather_artifact(Path::new("/x/scene.blend.1234.feather-snapshot.blend")));
        assert!(!is_feather_artifact(Path::new("/x/scene_L4.blend")));
        assert!(!is_feather_artifact(Path::new("/x/scene.blend")));
    }

    #[test]
    fn test_expand_directory_requires_recursive() {
        let dir = tempdir().unwrap();
        let err = expand(&[dir.path().to_path_buf()], "blend", false).unwrap_err();
        assert!(matches!(err, FeatherError::UsageError(_)));
    }

    #[test]
    fn test_expand_directory_skips_outputs() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        for name in ["b.blend", "a.blend", "a_L2.blend", "notes.txt", "sub/c.blend"] {
            fs::write(dir.path().join(name), "x").unwrap();
        }

        let files = expand(&[dir.path().to_path_buf()], "blend", true).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().display().to_string())
            .collect();
        assert_eq!(names, vec!["a.blend", "b.blend", "sub/c.blend"]);
    }
}
