//! Executable identity for content-addressed deployment
//!
//! The identity of a build is either baked in at compile time
//! (`RUNX_PAYLOAD_DIGEST`) or derived by hashing the launcher's own bytes,
//! payload trailer included. Same binary = same deployment directory.
//!
//! The hash is FNV-1a 64. It is a cache key, not an integrity check.

use crate::error::{RunxError, RunxResult};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Digest baked in by the build, if any
pub const BUILD_DIGEST: Option<&str> = option_env!("RUNX_PAYLOAD_DIGEST");

/// Streaming FNV-1a 64-bit hasher
///
/// Implements [`io::Write`] so a reader can be piped through it with
/// [`io::copy`].
#[derive(Debug, Clone, Copy)]
pub struct Fnv1a64(u64);

impl Fnv1a64 {
    pub fn new() -> Self {
        Self(FNV_OFFSET_BASIS)
    }

    pub fn update(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.0 ^= u64::from(b);
            self.0 = self.0.wrapping_mul(FNV_PRIME);
        }
    }

    pub fn finish(&self) -> u64 {
        self.0
    }

    /// 16 lowercase hex chars of the big-endian hash
    pub fn hex_digest(&self) -> String {
        hex::encode(self.0.to_be_bytes())
    }
}

impl Default for Fnv1a64 {
    fn default() -> Self {
        Self::new()
    }
}

impl io::Write for Fnv1a64 {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Digest an in-memory byte slice
pub fn digest_bytes(bytes: &[u8]) -> String {
    let mut hasher = Fnv1a64::new();
    hasher.update(bytes);
    hasher.hex_digest()
}

/// Digest a file's contents, streaming
pub fn digest_file(path: &Path) -> RunxResult<String> {
    let digest_err = |source| RunxError::Digest {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(digest_err)?;
    let mut reader = BufReader::with_capacity(64 * 1024, file);
    let mut hasher = Fnv1a64::new();
    io::copy(&mut reader, &mut hasher).map_err(digest_err)?;

    Ok(hasher.hex_digest())
}

/// Resolve the running executable through the OS, not argv[0]
pub fn current_executable() -> RunxResult<PathBuf> {
    let exe = std::env::current_exe().map_err(RunxError::ExecutableNotFound)?;
    match exe.canonicalize() {
        Ok(canonical) => Ok(canonical),
        Err(e) => {
            debug!("canonicalize {} failed: {}", exe.display(), e);
            Ok(exe)
        }
    }
}

/// Check that a digest is usable as a single path component
pub fn is_valid_digest(digest: &str) -> bool {
    !digest.is_empty()
        && digest != "."
        && digest != ".."
        && digest
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

/// Where an identity came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentitySource {
    /// Baked in at build time
    Build,
    /// Hashed from the executable at this path
    Executable(PathBuf),
}

/// Identity of the running build, used as the deployment cache key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    digest: String,
    source: IdentitySource,
}

impl Identity {
    /// Resolve the identity of the launcher at `executable`, preferring the
    /// digest baked in at build time
    pub fn resolve(executable: &Path) -> RunxResult<Self> {
        match BUILD_DIGEST {
            Some(digest) => Self::new(digest, IdentitySource::Build),
            None => Self::from_executable(executable),
        }
    }

    /// Hash the given executable
    pub fn from_executable(path: &Path) -> RunxResult<Self> {
        let digest = digest_file(path)?;
        debug!("Digest of {}: {}", path.display(), digest);
        Self::new(digest, IdentitySource::Executable(path.to_path_buf()))
    }

    /// Build an identity from a known digest string
    pub fn new(digest: impl Into<String>, source: IdentitySource) -> RunxResult<Self> {
        let digest = digest.into();
        if !is_valid_digest(&digest) {
            return Err(RunxError::InvalidDigest(digest));
        }
        Ok(Self { digest, source })
    }

    pub fn as_str(&self) -> &str {
        &self.digest
    }

    pub fn source(&self) -> &IdentitySource {
        &self.source
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.digest)
    }
}
