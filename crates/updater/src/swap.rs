//! Replacement of the running executable.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use wte_common::{Error, Result};

pub fn backup_path(executable: &Path) -> PathBuf {
    let mut name = executable.as_os_str().to_os_string();
    name.push(".backup");
    PathBuf::from(name)
}

/// Install `new_binary` at `executable`.
///
/// The current file is moved to `<executable>.backup` first. If copying the
/// new binary or making it executable fails, the backup is moved back;
/// otherwise it is deleted.
pub fn swap_executable(new_binary: &Path, executable: &Path) -> Result<()> {
    let backup = backup_path(executable);
    fs::rename(executable, &backup)
        .map_err(|e| Error::Swap(format!("failed to back up current binary: {}", e)))?;
    debug!("Current binary moved to {:?}", backup);

    let installed = fs::copy(new_binary, executable).and_then(|_| {
        fs::set_permissions(executable, fs::Permissions::from_mode(0o755))
    });

    if let Err(e) = installed {
        let _ = fs::remove_file(executable);
        if let Err(restore) = fs::rename(&backup, executable) {
            warn!("Failed to restore {:?}: {}", backup, restore);
        }
        return Err(Error::Swap(format!("failed to install new binary: {}", e)));
    }

    if let Err(e) = fs::remove_file(&backup) {
        warn!("Failed to remove {:?}: {}", backup, e);
    }
    Ok(())
}
