//! Deployment of the bundled runtime into the cache root
//!
//! One directory per build digest lives under the cache root. Deploying a
//! digest prunes every other digest's directory, then either reuses the
//! existing directory or restores the payload into it.
//!
//! Restoration happens in a `<name>.partial` staging directory under an
//! exclusive `<name>.lock` file lock, and is renamed into place when
//! complete. A deployment directory that exists is therefore always
//! complete, and concurrent first runs of the same build restore once.
//! Pruning takes the same lock without waiting and skips any build whose
//! lock is held.

use crate::bundle::{Restorer, RUNTIME_ASSET_SET};
use crate::cache::digest::Identity;
use crate::cache::notice::{DelayedNotice, NoticeSink};
use crate::config::{CacheConfig, CacheLocation};
use crate::error::{RunxError, RunxResult};
use async_trait::async_trait;
use fs4::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Suffix of the staging directory used while restoring
const STAGING_SUFFIX: &str = ".partial";

/// Suffix of the per-digest lock file
const LOCK_SUFFIX: &str = ".lock";

/// Directory holding deployments, plus the name prefix that marks them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRoot {
    path: PathBuf,
    prefix: &'static str,
}

impl CacheRoot {
    /// `~/.runx`
    pub fn home() -> RunxResult<Self> {
        let home = dirs::home_dir().ok_or(RunxError::HomeNotFound)?;
        Ok(Self::at(home.join(".runx")))
    }

    /// The OS temp directory, deployments named `runx-<digest>`
    pub fn temp() -> Self {
        Self::with_prefix(std::env::temp_dir(), "runx-")
    }

    /// A dedicated directory owned entirely by runx
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self::with_prefix(path, "")
    }

    /// A directory where only `prefix`-named entries belong to runx
    pub fn with_prefix(path: impl Into<PathBuf>, prefix: &'static str) -> Self {
        Self {
            path: path.into(),
            prefix,
        }
    }

    /// Resolve the cache root from configuration
    pub fn from_config(config: &CacheConfig) -> RunxResult<Self> {
        if let Some(ref dir) = config.dir {
            return Ok(Self::at(dir.clone()));
        }
        match config.location {
            CacheLocation::Home => Self::home(),
            CacheLocation::Temp => Ok(Self::temp()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory name of the deployment for `digest`
    pub fn entry_name(&self, digest: &str) -> String {
        format!("{}{}", self.prefix, digest)
    }

    /// Ensure the root exists
    pub fn ensure(&self) -> RunxResult<()> {
        fs::create_dir_all(&self.path).map_err(|source| RunxError::CacheRoot {
            path: self.path.clone(),
            source,
        })
    }
}

/// A materialized deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    /// The deployment directory
    pub path: PathBuf,
    /// Whether this call restored the payload (cold start)
    pub restored: bool,
}

/// Produces an up-to-date deployment directory for a build
#[async_trait]
pub trait Deployer: Send + Sync {
    async fn deploy(&self, identity: &Identity) -> RunxResult<Deployment>;
}

type RemoveDirFn = dyn Fn(&Path) -> io::Result<()> + Send + Sync;

/// Manages deployments under a cache root
pub struct CacheManager {
    root: CacheRoot,
    restorer: Arc<dyn Restorer>,
    asset_set: String,
    notice: Option<(Duration, Arc<dyn NoticeSink>)>,
    remove_dir: Arc<RemoveDirFn>,
}

impl CacheManager {
    /// Create a manager restoring the runtime asset set with `restorer`
    pub fn new(root: CacheRoot, restorer: Arc<dyn Restorer>) -> Self {
        Self {
            root,
            restorer,
            asset_set: RUNTIME_ASSET_SET.to_string(),
            notice: None,
            remove_dir: Arc::new(|path: &Path| fs::remove_dir_all(path)),
        }
    }

    /// Show `sink` if a cold start takes longer than `delay`
    pub fn with_notice(mut self, delay: Duration, sink: Arc<dyn NoticeSink>) -> Self {
        self.notice = Some((delay, sink));
        self
    }

    #[cfg(test)]
    fn with_remover<F>(mut self, remove_dir: F) -> Self
    where
        F: Fn(&Path) -> io::Result<()> + Send + Sync + 'static,
    {
        self.remove_dir = Arc::new(remove_dir);
        self
    }

    /// Remove every deployment under the root other than `keep`
    ///
    /// Best effort: failures are logged and skipped. Returns the number of
    /// entries removed.
    pub fn prune(&self, keep: &str) -> usize {
        let entries = match fs::read_dir(self.root.path()) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot list {}: {}", self.root.path().display(), e);
                return 0;
            }
        };

        let staging = format!("{}{}", keep, STAGING_SUFFIX);
        let lock = format!("{}{}", keep, LOCK_SUFFIX);
        let mut removed = 0;

        for entry in entries.flatten() {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if !name.starts_with(self.root.prefix) || name == keep || name == staging || name == lock {
                continue;
            }

            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let path = entry.path();

            if file_type.is_dir() {
                // `X` and `X.partial` both belong to the restorer holding `X.lock`
                let owner = name.strip_suffix(STAGING_SUFFIX).unwrap_or(name);
                let lock_path = self.root.path().join(format!("{}{}", owner, LOCK_SUFFIX));
                let Some(lock) = claim_lock(&lock_path, true) else {
                    debug!("{} is being deployed, keeping it", path.display());
                    continue;
                };
                match (self.remove_dir)(&path) {
                    Ok(()) => {
                        debug!("Pruned stale deployment {}", path.display());
                        removed += 1;
                    }
                    Err(e) => debug!("Could not prune {}: {}", path.display(), e),
                }
                discard_lock(lock, &lock_path);
            } else if file_type.is_file() && name.ends_with(LOCK_SUFFIX) {
                if let Some(lock) = claim_lock(&path, false) {
                    if discard_lock(lock, &path) {
                        removed += 1;
                    }
                }
            }
        }

        removed
    }
}

#[async_trait]
impl Deployer for CacheManager {
    async fn deploy(&self, identity: &Identity) -> RunxResult<Deployment> {
        self.root.ensure()?;

        let name = self.root.entry_name(identity.as_str());
        let pruned = self.prune(&name);
        if pruned > 0 {
            debug!("Pruned {} stale entries", pruned);
        }

        let path = self.root.path().join(&name);
        if path.is_dir() {
            debug!("Using deployment {}", path.display());
            return Ok(Deployment {
                path,
                restored: false,
            });
        }

        let notice = self
            .notice
            .as_ref()
            .map(|(delay, sink)| DelayedNotice::schedule(*delay, Arc::clone(sink)));

        let root = self.root.path().to_path_buf();
        let restorer = Arc::clone(&self.restorer);
        let asset_set = self.asset_set.clone();
        let joined =
            tokio::task::spawn_blocking(move || materialize(&root, &name, &*restorer, &asset_set))
                .await;

        if let Some(notice) = notice {
            notice.finish().await;
        }

        let restored = joined
            .map_err(|e| RunxError::Internal(format!("deployment task failed: {}", e)))??;
        if restored {
            info!("Deployed runtime into {}", path.display());
        }

        Ok(Deployment { path, restored })
    }
}

/// Restore `asset_set` into `<root>/<name>` under the per-digest lock
///
/// Returns false when another process finished the deployment while this
/// one waited for the lock.
fn materialize(
    root: &Path,
    name: &str,
    restorer: &dyn Restorer,
    asset_set: &str,
) -> RunxResult<bool> {
    let target = root.join(name);
    let lock_path = root.join(format!("{}{}", name, LOCK_SUFFIX));
    let lock_err = |source| RunxError::Lock {
        path: lock_path.clone(),
        source,
    };

    let lock = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(&lock_path)
        .map_err(lock_err)?;
    lock.lock_exclusive().map_err(lock_err)?;

    if target.is_dir() {
        debug!("{} was deployed concurrently", target.display());
        return Ok(false);
    }

    let staging = root.join(format!("{}{}", name, STAGING_SUFFIX));
    let staging_err = |source| RunxError::Deploy {
        path: staging.clone(),
        source,
    };
    if staging.exists() {
        debug!("Discarding leftover {}", staging.display());
        fs::remove_dir_all(&staging).map_err(staging_err)?;
    }
    fs::create_dir(&staging).map_err(staging_err)?;

    if let Err(e) = restorer.restore(&staging, asset_set) {
        if let Err(rm) = fs::remove_dir_all(&staging) {
            warn!("Could not remove {}: {}", staging.display(), rm);
        }
        return Err(e);
    }

    fs::rename(&staging, &target).map_err(|source| RunxError::Deploy {
        path: target.clone(),
        source,
    })?;

    drop(lock);
    Ok(true)
}

/// Take another digest's lock without waiting
///
/// Returns `None` while a restorer holds it. With `create`, a missing lock
/// file is created so that a restorer starting meanwhile waits for the prune.
fn claim_lock(path: &Path, create: bool) -> Option<File> {
    let file = OpenOptions::new()
        .create(create)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)
        .map_err(|e| debug!("Cannot open {}: {}", path.display(), e))
        .ok()?;
    file.try_lock_exclusive().ok()?;
    Some(file)
}

/// Delete a lock file claimed with [`claim_lock`]
fn discard_lock(lock: File, path: &Path) -> bool {
    // Windows refuses to delete a file that is still open
    #[cfg(windows)]
    drop(lock);

    let removed = match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            debug!("Could not remove {}: {}", path.display(), e);
            false
        }
    };

    #[cfg(not(windows))]
    drop(lock);
    removed
}
