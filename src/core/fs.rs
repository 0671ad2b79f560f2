//! Filesystem helpers for output hand-off.
//!
//! The encoder never writes the caller-visible output path directly: the
//! final mux lands in a sibling temporary file which is swapped into place by
//! rename. A partial write (crash, encoder failure) therefore never leaves a
//! valid-looking file at the output path.
//!
//! Windows semantics differ from Unix for rename-over-existing; we handle both.

use std::path::{Path, PathBuf};

use tracing::warn;

use super::{PipelineError, PipelineResult};

/// Validate an output path: non-empty, absolute, parent directory creatable.
pub fn validate_output_path(path: &Path) -> PipelineResult<PathBuf> {
    let as_str = path.to_string_lossy();
    if as_str.trim().is_empty() {
        return Err(PipelineError::InvalidSpec("output path is empty".to_string()));
    }
    if !path.is_absolute() {
        return Err(PipelineError::InvalidSpec(format!(
            "output path must be an absolute path: {}",
            path.display()
        )));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(path.to_path_buf())
}

/// Sibling temporary path for `path` (`out.mp4` -> `out.mp4.tmp`).
///
/// A sibling keeps the rename on the same filesystem.
pub fn tmp_path_for(path: &Path) -> PathBuf {
    let mut tmp = path.to_path_buf();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "tmp".to_string());
    tmp.set_file_name(format!("{file_name}.tmp"));
    tmp
}

fn bak_path_for(path: &Path) -> PathBuf {
    let mut bak = path.to_path_buf();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "bak".to_string());
    bak.set_file_name(format!("{file_name}.bak"));
    bak
}

/// Swap a fully written sibling temp file into place at `dest`.
pub fn finalize_into(dest: &Path, src_tmp: &Path) -> PipelineResult<()> {
    // Fast path: dest does not exist.
    if !dest.exists() {
        std::fs::rename(src_tmp, dest)?;
        return Ok(());
    }

    // Windows: rename-over-existing may fail depending on filesystem; use a backup swap.
    let bak = bak_path_for(dest);

    if bak.exists() {
        let _ = std::fs::remove_file(&bak);
    }

    std::fs::rename(dest, &bak)?;
    match std::fs::rename(src_tmp, dest) {
        Ok(()) => {
            let _ = std::fs::remove_file(&bak);
            Ok(())
        }
        Err(e) => {
            // Try to restore the old file.
            let _ = std::fs::rename(&bak, dest);
            let _ = std::fs::remove_file(src_tmp);
            Err(PipelineError::Io(e))
        }
    }
}

/// Remove the output path and its sibling temp after a failed run.
///
/// Deletion failure is logged and swallowed so it never masks the primary error.
pub fn remove_partial_output(dest: &Path) {
    for path in [dest.to_path_buf(), tmp_path_for(dest)] {
        if path.exists() {
            if let Err(e) = std::fs::remove_file(&path) {
                warn!("Failed to remove partial output {}: {}", path.display(), e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_finalize_into_creates_and_replaces() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out.mp4");

        let tmp = tmp_path_for(&dest);
        std::fs::write(&tmp, b"one").unwrap();
        finalize_into(&dest, &tmp).unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "one");
        assert!(!tmp.exists());

        std::fs::write(&tmp, b"two").unwrap();
        finalize_into(&dest, &tmp).unwrap();
        assert_eq!(std::fs::read_to_string(&dest).unwrap(), "two");
        assert!(!bak_path_for(&dest).exists());
    }

    #[test]
    fn test_tmp_path_is_sibling() {
        let tmp = tmp_path_for(Path::new("/videos/out.mp4"));
        assert_eq!(tmp, PathBuf::from("/videos/out.mp4.tmp"));
    }

    #[test]
    fn test_validate_output_path_rejects_relative() {
        let result = validate_output_path(Path::new("relative/out.mp4"));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_output_path_creates_parent() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("nested/deeper/out.mp4");
        validate_output_path(&dest).unwrap();
        assert!(dest.parent().unwrap().is_dir());
    }

    #[test]
    fn test_remove_partial_output() {
        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("out.mp4");
        std::fs::write(&dest, b"partial").unwrap();
        std::fs::write(tmp_path_for(&dest), b"partial").unwrap();

        remove_partial_output(&dest);
        assert!(!dest.exists());
        assert!(!tmp_path_for(&dest).exists());
    }
}
