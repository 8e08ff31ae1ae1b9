//! Collision-safe copy and move of a model file or directory tree.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

fn copy_dir_all(src: &Path, dst: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dst)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let dest = dst.join(entry.file_name());
        if file_type.is_dir() {
            copy_dir_all(&entry.path(), &dest)?;
        } else {
            fs::copy(entry.path(), dest)?;
        }
    }
    Ok(())
}

/// Copies `old_path` to `new_path`, creating parent directories as needed.
/// A no-op (returning `old_path`) when the two paths are already identical.
pub fn copy_model(old_path: &Path, new_path: &Path) -> Result<PathBuf> {
    if old_path == new_path {
        return Ok(old_path.to_path_buf());
    }
    if let Some(parent) = new_path.parent() {
        fs::create_dir_all(parent)?;
    }
    if old_path.is_dir() {
        copy_dir_all(old_path, new_path)?;
    } else {
        fs::copy(old_path, new_path)?;
    }
    Ok(new_path.to_path_buf())
}

/// Renames `old_path` into place at (a possibly adjusted) `new_path`,
/// appending a zero-padded `_NN` suffix to the filename stem when something
/// already occupies the target, and returns the path actually used.
pub fn move_model(old_path: &Path, new_path: &Path) -> Result<PathBuf> {
    if old_path == new_path {
        return Ok(old_path.to_path_buf());
    }
    if let Some(parent) = new_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut target = new_path.to_path_buf();
    let mut counter: u32 = 1;
    while target.exists() {
        target = with_suffixed_stem(new_path, counter);
        counter += 1;
    }

    fs::rename(old_path, &target)?;
    Ok(target)
}

fn with_suffixed_stem(path: &Path, counter: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let suffixed_stem = format!("{stem}_{counter:02}");
    let file_name = match path.extension() {
        Some(ext) => format!("{suffixed_stem}.{}", ext.to_string_lossy()),
        None => suffixed_stem,
    };
    path.with_file_name(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn copy_model_is_a_noop_for_identical_paths() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.bin");
        fs::write(&path, b"hi").unwrap();
        let result = copy_model(&path, &path).unwrap();
        assert_eq!(result, path);
    }

    #[test]
    fn copy_model_copies_a_single_file() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("m.bin");
        fs::write(&src, b"hello").unwrap();
        let dst = dir.path().join("sub").join("m.bin");

        let result = copy_model(&src, &dst).unwrap();
        assert_eq!(result, dst);
        assert!(src.exists(), "copy should leave the source in place");
        assert_eq!(fs::read(&dst).unwrap(), b"hello");
    }

    #[test]
    fn copy_model_copies_a_directory_tree() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("repo");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("a.bin"), b"a").unwrap();
        fs::write(src.join("nested").join("b.bin"), b"b").unwrap();
        let dst = dir.path().join("dest-repo");

        copy_model(&src, &dst).unwrap();
        assert_eq!(fs::read(dst.join("a.bin")).unwrap(), b"a");
        assert_eq!(fs::read(dst.join("nested").join("b.bin")).unwrap(), b"b");
    }

    #[test]
    fn move_model_renames_into_place() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("m.bin");
        fs::write(&src, b"hi").unwrap();
        let dst = dir.path().join("sub").join("m.bin");

        let result = move_model(&src, &dst).unwrap();
        assert_eq!(result, dst);
        assert!(!src.exists());
        assert_eq!(fs::read(&dst).unwrap(), b"hi");
    }

    #[test]
    fn move_model_jiggers_the_name_on_collision() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.bin");
        let b = dir.path().join("b.bin");
        fs::write(&a, b"a").unwrap();
        fs::write(&b, b"b").unwrap();
        let dst = dir.path().join("m.bin");
        fs::write(&dst, b"existing").unwrap();

        let result = move_model(&a, &dst).unwrap();
        assert_eq!(result, dir.path().join("m_01.bin"));
        assert_eq!(fs::read(&result).unwrap(), b"a");
        assert_eq!(fs::read(&dst).unwrap(), b"existing");
    }

    #[test]
    fn move_model_increments_past_multiple_collisions() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("m.bin"), b"0").unwrap();
        fs::write(dir.path().join("m_01.bin"), b"1").unwrap();
        let src = dir.path().join("new.bin");
        fs::write(&src, b"new").unwrap();

        let result = move_model(&src, &dir.path().join("m.bin")).unwrap();
        assert_eq!(result, dir.path().join("m_02.bin"));
    }
}
