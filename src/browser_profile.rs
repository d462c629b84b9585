//! Chrome profile directories for browser sessions
//!
//! Every session gets its own UUID-named directory so restarted sessions never
//! inherit cookies or a SingletonLock from the previous one.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Prefix of every profile directory this crate creates under the temp dir
pub const PROFILE_PREFIX: &str = "rankscrape_chrome";

/// RAII wrapper for a Chrome profile directory
///
/// The directory is removed on drop. Drop it only after the browser process
/// has exited, otherwise Windows refuses to delete locked files.
#[derive(Debug)]
pub struct BrowserProfile {
    path: PathBuf,
    cleanup_on_drop: bool,
}

impl BrowserProfile {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            cleanup_on_drop: true,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the directory after drop, for inspecting a crashed session
    pub fn keep(&mut self) {
        self.cleanup_on_drop = false;
    }
}

impl Drop for BrowserProfile {
    fn drop(&mut self) {
        if self.cleanup_on_drop && self.path.exists() {
            debug!("Removing browser profile {}", self.path.display());
            if let Err(e) = std::fs::remove_dir_all(&self.path) {
                warn!(
                    "Failed to cleanup profile directory {}: {}",
                    self.path.display(),
                    e
                );
            }
        }
    }
}

/// Create a unique Chrome profile directory using UUID v4
///
/// # Example
/// ```
/// # use anyhow::Result;
/// # fn main() -> Result<()> {
/// use rankscrape::browser_profile::create_unique_profile;
///
/// let profile = create_unique_profile()?;
/// assert!(profile.path().exists());
/// assert!(profile.path().to_string_lossy().contains("rankscrape_chrome_"));
/// # Ok(())
/// # }
/// ```
pub fn create_unique_profile() -> Result<BrowserProfile> {
    create_profile_in(&std::env::temp_dir())
}

fn create_profile_in(parent: &Path) -> Result<BrowserProfile> {
    let path = parent.join(format!("{PROFILE_PREFIX}_{}", Uuid::new_v4()));

    // create_dir, not create_dir_all: fails on a UUID collision
    std::fs::create_dir(&path)
        .with_context(|| format!("Failed to create profile directory: {}", path.display()))?;

    debug!("Created Chrome profile directory: {}", path.display());
    Ok(BrowserProfile::new(path))
}

/// Check if a SingletonLock file is stale (Chrome process no longer running)
///
/// SingletonLock is a symlink with target `{hostname}-{PID}`.
#[cfg(unix)]
pub fn is_singleton_lock_stale(profile_dir: &Path) -> bool {
    let lock_path = profile_dir.join("SingletonLock");

    if !lock_path.exists() && !lock_path.is_symlink() {
        return true;
    }

    match std::fs::read_link(&lock_path) {
        Ok(target) => {
            let target_str = target.to_string_lossy();
            if let Some(pid_str) = target_str.rsplit('-').next()
                && let Ok(pid) = pid_str.parse::<i32>()
            {
                // kill(pid, 0) probes for existence without signalling
                let exists = unsafe { libc::kill(pid, 0) == 0 };
                return !exists;
            }
            warn!("Could not parse PID from SingletonLock target: {}", target_str);
            false
        }
        Err(_) => lock_path.is_file(),
    }
}

#[cfg(not(unix))]
pub fn is_singleton_lock_stale(_profile_dir: &Path) -> bool {
    true
}

/// Remove profile directories left behind by crashed runs
///
/// Called once at startup. Directories whose Chrome process is still alive are kept.
pub fn cleanup_stale_profiles() -> Result<usize> {
    cleanup_stale_profiles_in(&std::env::temp_dir())
}

fn cleanup_stale_profiles_in(parent: &Path) -> Result<usize> {
    let mut cleaned = 0;

    let entries = std::fs::read_dir(parent)
        .with_context(|| format!("Failed to read temp directory: {}", parent.display()))?;

    for entry in entries.flatten() {
        let path = entry.path();

        if let Some(name) = path.file_name().and_then(|n| n.to_str())
            && name.starts_with(PROFILE_PREFIX)
            && path.is_dir()
            && is_singleton_lock_stale(&path)
        {
            if let Err(e) = std::fs::remove_dir_all(&path) {
                warn!("Failed to remove stale profile {}: {}", path.display(), e);
            } else {
                cleaned += 1;
            }
        }
    }

    if cleaned > 0 {
        info!("Cleaned {} stale Chrome profile directories", cleaned);
    }

    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_is_removed_on_drop() {
        let parent = tempfile::tempdir().expect("tempdir");
        let profile = create_profile_in(parent.path()).expect("profile");
        let path = profile.path().to_path_buf();
        assert!(path.exists());
        drop(profile);
        assert!(!path.exists());
    }

    #[test]
    fn kept_profile_survives_drop() {
        let parent = tempfile::tempdir().expect("tempdir");
        let mut profile = create_profile_in(parent.path()).expect("profile");
        profile.keep();
        let path = profile.path().to_path_buf();
        drop(profile);
        assert!(path.exists());
    }

    #[test]
    fn stale_cleanup_only_touches_own_prefix() {
        let parent = tempfile::tempdir().expect("tempdir");
        let ours = parent.path().join(format!("{PROFILE_PREFIX}_orphan"));
        let theirs = parent.path().join("other_tool_profile");
        std::fs::create_dir(&ours).expect("mkdir");
        std::fs::create_dir(&theirs).expect("mkdir");

        let cleaned = cleanup_stale_profiles_in(parent.path()).expect("cleanup");

        assert_eq!(cleaned, 1);
        assert!(!ours.exists());
        assert!(theirs.exists());
    }
}
