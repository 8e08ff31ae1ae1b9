//! Recursive file-size accounting, used for job progress totals.

use std::fs;
use std::path::Path;

/// Total size in bytes of `path`: its own size if a file, or the sum of
/// every file beneath it if a directory. Unreadable entries contribute 0
/// rather than failing the whole walk.
pub fn recursive_size(path: &Path) -> u64 {
    let Ok(metadata) = fs::symlink_metadata(path) else {
        return 0;
    };
    if metadata.is_file() {
        return metadata.len();
    }
    if !metadata.is_dir() {
        return 0;
    }
    let Ok(entries) = fs::read_dir(path) else {
        return 0;
    };
    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| recursive_size(&entry.path()))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn size_of_a_single_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.bin");
        fs::write(&path, vec![0u8; 42]).unwrap();
        assert_eq!(recursive_size(&path), 42);
    }

    #[test]
    fn size_of_a_directory_tree() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("a.bin"), vec![0u8; 10]).unwrap();
        fs::write(dir.path().join("nested").join("b.bin"), vec![0u8; 20]).unwrap();
        assert_eq!(recursive_size(dir.path()), 30);
    }

    #[test]
    fn size_of_a_missing_path_is_zero() {
        let dir = tempdir().unwrap();
        assert_eq!(recursive_size(&dir.path().join("nope")), 0);
    }
}
