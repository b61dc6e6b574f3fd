//! Retiring shown uploads into the trash folder and age-based cleanup of it.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{debug, info, warn};

const SECONDS_PER_DAY: u64 = 86_400;

/// Move `path` into `trash_dir` as `<unix_timestamp>_<original_name>`.
pub fn retire(path: &Path, trash_dir: &Path) -> Result<PathBuf> {
    retire_at(path, trash_dir, Utc::now().timestamp())
}

/// [`retire`] with an explicit timestamp prefix.
pub fn retire_at(path: &Path, trash_dir: &Path, timestamp: i64) -> Result<PathBuf> {
    let Some(name) = path.file_name() else {
        bail!("{} has no file name", path.display());
    };
    fs::create_dir_all(trash_dir)
        .with_context(|| format!("failed to create trash folder {}", trash_dir.display()))?;
    let dest = trash_dir.join(format!("{timestamp}_{}", name.to_string_lossy()));

    match fs::rename(path, &dest) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::CrossesDevices => {
            debug!(path = %path.display(), "rename crosses devices; copying instead");
            move_by_copy(path, &dest)?;
        }
        Err(err) => {
            return Err(err).with_context(|| {
                format!("failed to move {} to {}", path.display(), dest.display())
            });
        }
    }
    info!(from = %path.display(), to = %dest.display(), "moved to trash");
    Ok(dest)
}

fn move_by_copy(path: &Path, dest: &Path) -> Result<()> {
    fs::copy(path, dest)
        .with_context(|| format!("failed to copy {} to {}", path.display(), dest.display()))?;
    if let Err(err) = fs::remove_file(path) {
        // Leave the upload in place rather than having it in both folders.
        let _ = fs::remove_file(dest);
        return Err(err).with_context(|| format!("failed to remove {}", path.display()));
    }
    Ok(())
}

/// Delete regular files in `trash_dir` older than `max_age_days`.
///
/// A non-positive retention disables the sweep. Returns the number of deleted files.
pub fn sweep(trash_dir: &Path, max_age_days: i64) -> Result<usize> {
    sweep_at(trash_dir, max_age_days, SystemTime::now())
}

/// [`sweep`] measured against an explicit `now`.
pub fn sweep_at(trash_dir: &Path, max_age_days: i64, now: SystemTime) -> Result<usize> {
    if max_age_days <= 0 {
        return Ok(0);
    }
    let max_age = Duration::from_secs((max_age_days as u64).saturating_mul(SECONDS_PER_DAY));

    let entries = match fs::read_dir(trash_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(0),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to list trash folder {}", trash_dir.display()));
        }
    };

    let mut deleted = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(meta) = fs::metadata(&path) else {
            continue;
        };
        if !meta.is_file() {
            continue;
        }
        let Ok(modified) = meta.modified() else {
            continue;
        };
        let age = now.duration_since(modified).unwrap_or_default();
        if age <= max_age {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => {
                deleted += 1;
                info!(
                    path = %path.display(),
                    age_days = age.as_secs() / SECONDS_PER_DAY,
                    "trash: deleted expired file"
                );
            }
            Err(err) => warn!(path = %path.display(), "trash: could not delete: {err}"),
        }
    }
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retire_prefixes_timestamp() {
        let dir = tempfile::tempdir().unwrap();
        let uploaded = dir.path().join("uploaded");
        let trash = dir.path().join("trash");
        fs::create_dir_all(&uploaded).unwrap();
        let src = uploaded.join("u1.jpg");
        fs::write(&src, b"x").unwrap();

        let dest = retire_at(&src, &trash, 1_700_000_000).unwrap();
        assert_eq!(dest, trash.join("1700000000_u1.jpg"));
        assert!(!src.exists());
        assert_eq!(fs::read(&dest).unwrap(), b"x");
    }

    #[test]
    fn retire_missing_file_fails_and_creates_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let trash = dir.path().join("trash");
        let err = retire_at(&dir.path().join("gone.png"), &trash, 1);
        assert!(err.is_err());
        assert_eq!(fs::read_dir(&trash).unwrap().count(), 0);
    }

    #[test]
    fn huge_retention_keeps_everything() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("1_old.jpg");
        fs::write(&path, b"x").unwrap();
        let later = SystemTime::now() + Duration::from_secs(10_000 * SECONDS_PER_DAY);
        assert_eq!(sweep_at(dir.path(), i64::MAX, later).unwrap(), 0);
        assert!(path.exists());
    }

    #[test]
    fn sweep_of_missing_folder_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(sweep(&dir.path().join("nope"), 3).unwrap(), 0);
    }
}
