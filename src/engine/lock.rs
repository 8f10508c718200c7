//! Exclusive lock serializing deploy runs against one engine.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::types::{SyncError, SyncResult};

/// Age after which a lock file without a readable PID is considered abandoned.
const UNREADABLE_LOCK_TTL: Duration = Duration::from_secs(60);

/// Lock file held for the lifetime of a deploy run.
///
/// The file is created exclusively and carries the holder's PID, so a lock
/// left behind by a killed run is broken by the next one.
pub struct DeployLock {
    _file: File,
    path: PathBuf,
}

impl DeployLock {
    /// Acquire the lock at `path`, retrying until `timeout` has passed.
    pub fn acquire(path: &Path, timeout: Duration) -> SyncResult<Self> {
        let start = Instant::now();

        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    write!(file, "{}", std::process::id())?;
                    file.sync_all()?;
                    log::debug!("Acquired deploy lock {}", path.display());
                    return Ok(Self {
                        _file: file,
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if is_stale(path) {
                        log::warn!("Breaking stale deploy lock {}", path.display());
                        // Another process may have broken it first.
                        let _ = std::fs::remove_file(path);
                        continue;
                    }
                    if start.elapsed() >= timeout {
                        let holder = std::fs::read_to_string(path)
                            .map(|c| c.trim().to_string())
                            .unwrap_or_else(|_| "unknown".to_string());
                        return Err(SyncError::DeployLocked {
                            path: path.display().to_string(),
                            holder,
                        });
                    }
                    std::thread::sleep(Duration::from_millis(50));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for DeployLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

/// A lock is stale when its holder is gone.
fn is_stale(path: &Path) -> bool {
    let Ok(content) = std::fs::read_to_string(path) else {
        // Removed between our open and this read.
        return false;
    };
    match content.trim().parse::<u32>() {
        Ok(pid) => !is_process_alive(pid),
        Err(_) => std::fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.elapsed().ok())
            .is_some_and(|age| age > UNREADABLE_LOCK_TTL),
    }
}

fn is_process_alive(pid: u32) -> bool {
    if pid == std::process::id() {
        return true;
    }

    #[cfg(unix)]
    {
        Path::new("/proc").join(pid.to_string()).exists()
            || std::process::Command::new("kill")
                .args(["-0", &pid.to_string()])
                .output()
                .map(|o| o.status.success())
                .unwrap_or(true) // If we can't check, assume alive
    }

    #[cfg(not(unix))]
    {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_refused_while_held() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.lock");

        let held = DeployLock::acquire(&path, Duration::ZERO).unwrap();
        let err = DeployLock::acquire(&path, Duration::from_millis(120)).err().unwrap();
        match err {
            SyncError::DeployLocked { holder, .. } => {
                assert_eq!(holder, std::process::id().to_string())
            }
            other => panic!("unexpected error: {}", other),
        }

        drop(held);
        assert!(!path.exists());
        assert!(DeployLock::acquire(&path, Duration::ZERO).is_ok());
    }

    #[test]
    fn lock_of_a_dead_process_is_broken() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.lock");
        std::fs::write(&path, "999999999").unwrap();

        let lock = DeployLock::acquire(&path, Duration::ZERO).unwrap();
        assert_eq!(
            std::fs::read_to_string(lock.path()).unwrap(),
            std::process::id().to_string()
        );
    }

    #[test]
    fn fresh_unreadable_lock_is_respected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.lock");
        std::fs::write(&path, "").unwrap();

        let err = DeployLock::acquire(&path, Duration::ZERO).err().unwrap();
        assert!(matches!(err, SyncError::DeployLocked { .. }));
        assert!(path.exists());
    }
}
