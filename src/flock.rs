//! Single running launcher per user display, so one process owns the
//! persisted playtime data.

use std::{
    env,
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};

#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;

#[cfg(unix)]
use nix::{
    fcntl::{Flock, FlockArg},
    libc::O_CLOEXEC,
};

#[cfg(unix)]
type LockFile = Flock<File>;
#[cfg(not(unix))]
type LockFile = File;

pub struct InstanceLock {
    file: Option<LockFile>,
    path: Option<PathBuf>,
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        let Some(f) = self.file.take() else {
            return;
        };

        #[cfg(unix)]
        let Ok(f) = f.unlock() else {
            return;
        };

        drop(f);

        if let Some(path) = &self.path {
            let _ = fs::remove_file(path);
        }
    }
}

impl InstanceLock {
    /// Lock in the runtime dir; `None` when another launcher holds it
    pub fn obtain() -> Option<Self> {
        let dir = env::var("XDG_RUNTIME_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| env::temp_dir());

        Self::obtain_in(&dir)
    }

    pub fn obtain_in(dir: &Path) -> Option<Self> {
        let display = env::var("WAYLAND_DISPLAY")
            .or_else(|_| env::var("DISPLAY").map(|c| c.replace(':', "x")))
            .unwrap_or_default();

        let path = dir.join(format!("{}-{display}.lock", env!("CARGO_PKG_NAME")));

        log::debug!("flock file: {}", path.display());

        match lock_file(&path) {
            Ok(Some(file)) => Some(Self {
                file: Some(file),
                path: Some(path),
            }),
            Ok(None) => None,
            Err(err) => {
                // unlocked instance is better than no launcher at all
                log::warn!("failed to open lock file {}: {err}", path.display());
                Some(Self {
                    file: None,
                    path: None,
                })
            }
        }
    }
}

/// `Ok(None)` when another process holds the lock
#[cfg(unix)]
fn lock_file(path: &Path) -> io::Result<Option<LockFile>> {
    let f = fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .custom_flags(O_CLOEXEC)
        .open(path)?;

    Ok(Flock::lock(f, FlockArg::LockExclusiveNonblock).ok())
}

/// Opening without sharing denies every other handle while the file is open
#[cfg(windows)]
fn lock_file(path: &Path) -> io::Result<Option<LockFile>> {
    use std::os::windows::fs::OpenOptionsExt;

    const ERROR_SHARING_VIOLATION: i32 = 32;

    match fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .share_mode(0)
        .open(path)
    {
        Ok(f) => Ok(Some(f)),
        Err(err) if err.raw_os_error() == Some(ERROR_SHARING_VIOLATION) => Ok(None),
        Err(err) => Err(err),
    }
}

#[cfg(not(any(unix, windows)))]
fn lock_file(_path: &Path) -> io::Result<Option<LockFile>> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "file locking is not supported on this platform",
    ))
}
