//! Hidden on-disk copy of the edited buffer.
//!
//! Linters that cannot read stdin get a path to a scratch copy that sits next
//! to the original file (so relative config lookups like `.eslintrc` still
//! resolve) and shares its extension (so the linter picks the right parser).
//! The copy is removed when the [`ScratchCopy`] is dropped.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempfile::{Builder, TempPath};

/// A temporary file holding a snapshot of the buffer text.
#[derive(Debug)]
pub struct ScratchCopy {
    path: TempPath,
}

impl ScratchCopy {
    /// Write `contents` to a hidden file beside `target`.
    ///
    /// Falls back to the system temp directory when the target has no parent
    /// directory or that directory is not writable.
    pub fn create(target: &Path, contents: &[u8]) -> io::Result<Self> {
        let dir = target
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(std::env::temp_dir, Path::to_path_buf);

        match Self::create_in(&dir, target, contents) {
            Ok(copy) => Ok(copy),
            Err(e) if dir != std::env::temp_dir() => {
                tracing::debug!(
                    dir = %dir.display(),
                    "Scratch copy beside target failed ({e}); using temp dir"
                );
                Self::create_in(&std::env::temp_dir(), target, contents)
            }
            Err(e) => Err(e),
        }
    }

    fn create_in(dir: &Path, target: &Path, contents: &[u8]) -> io::Result<Self> {
        let stem = target
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("buffer");
        let suffix = target
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();
        let prefix = format!(".{stem}.linter-");

        let mut file = Builder::new()
            .prefix(&prefix)
            .suffix(&suffix)
            .tempfile_in(dir)?;
        file.write_all(contents)?;
        file.flush()?;
        // Close our handle so the linter can open the file on any platform;
        // the path still deletes itself on drop.
        Ok(Self {
            path: file.into_temp_path(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn to_path_buf(&self) -> PathBuf {
        self.path.to_path_buf()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_is_hidden_colocated_and_keeps_extension() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("app.js");
        let copy = ScratchCopy::create(&target, b"var x = 1\n").unwrap();

        assert_eq!(copy.path().parent(), Some(dir.path()));
        assert_eq!(copy.path().extension().unwrap(), "js");
        let name = copy.path().file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with(".app.linter-"), "{name}");
        assert_eq!(std::fs::read(copy.path()).unwrap(), b"var x = 1\n");
    }

    #[test]
    fn test_copy_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let copy = ScratchCopy::create(&dir.path().join("a.py"), b"x").unwrap();
        let path = copy.to_path_buf();
        assert!(path.exists());
        drop(copy);
        assert!(!path.exists());
    }

    #[test]
    fn test_bare_file_name_uses_temp_dir() {
        let copy = ScratchCopy::create(Path::new("untitled.txt"), b"").unwrap();
        assert_eq!(copy.path().parent(), Some(std::env::temp_dir().as_path()));
    }
}
