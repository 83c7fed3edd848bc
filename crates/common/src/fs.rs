//! Filesystem helpers for files that carry secrets or fixed permissions.

use crate::Result;
use std::fs::{self, OpenOptions, Permissions};
use std::io::Write;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::Path;

/// Write `contents` to `path` in one piece and force its mode.
///
/// Parent directories are created. The mode is applied both at creation and
/// afterwards, so a pre-existing file with looser permissions is tightened.
pub fn write_file_with_mode(path: &Path, contents: &[u8], mode: u32) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)?;
    file.write_all(contents)?;
    file.sync_all()?;
    fs::set_permissions(path, Permissions::from_mode(mode))?;
    Ok(())
}

/// Remove a file, reporting whether anything was there.
pub fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Remove a directory only when it is empty.
pub fn remove_dir_if_empty(path: &Path) -> Result<bool> {
    match fs::read_dir(path) {
        Ok(mut entries) => {
            if entries.next().is_some() {
                return Ok(false);
            }
            fs::remove_dir(path)?;
            Ok(true)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// File mode bits, if the path exists.
pub fn mode_of(path: &Path) -> Option<u32> {
    fs::metadata(path).ok().map(|m| m.permissions().mode() & 0o777)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_tightens_existing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/secret.txt");
        write_file_with_mode(&path, b"first", 0o644).unwrap();
        assert_eq!(mode_of(&path), Some(0o644));

        write_file_with_mode(&path, b"second", 0o600).unwrap();
        assert_eq!(mode_of(&path), Some(0o600));
        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
    }

    #[test]
    fn test_remove_helpers() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a");
        fs::write(&file, "x").unwrap();

        assert!(remove_if_exists(&file).unwrap());
        assert!(!remove_if_exists(&file).unwrap());

        let sub = dir.path().join("sub");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("keep"), "x").unwrap();
        assert!(!remove_dir_if_empty(&sub).unwrap());
        fs::remove_file(sub.join("keep")).unwrap();
        assert!(remove_dir_if_empty(&sub).unwrap());
        assert!(!sub.exists());
    }
}
