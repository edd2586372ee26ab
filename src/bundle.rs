//! Payload bundled into the launcher executable
//!
//! A packed launcher is the plain `runx` binary followed by a gzip'd tar
//! archive and a fixed-size trailer:
//!
//! ```text
//! [launcher bytes][tar.gz payload][payload length: u64 LE]["RUNXPAY1"]
//! ```
//!
//! Archive entries are rooted at the asset set name (`runtime/...`), so
//! restoring an asset set into a directory reproduces that tree under it.

use crate::error::{RunxError, RunxResult};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Trailer magic marking a packed launcher
pub const MAGIC: [u8; 8] = *b"RUNXPAY1";

/// Magic plus the payload length
pub const TRAILER_LEN: u64 = 16;

/// Name of the asset set holding the interpreter and application
pub const RUNTIME_ASSET_SET: &str = "runtime";

/// Populates a directory with a named set of bundled assets
///
/// Implementations must report partial failure through the returned error;
/// callers never retry.
pub trait Restorer: Send + Sync {
    fn restore(&self, target: &Path, asset_set: &str) -> RunxResult<()>;
}

/// Byte range of the payload inside a packed executable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadRange {
    pub offset: u64,
    pub len: u64,
}

/// Locate the payload trailer, if any
pub fn read_trailer<R: Read + Seek>(reader: &mut R) -> io::Result<Option<PayloadRange>> {
    let total = reader.seek(SeekFrom::End(0))?;
    if total < TRAILER_LEN {
        return Ok(None);
    }

    reader.seek(SeekFrom::Start(total - TRAILER_LEN))?;
    let mut trailer = [0u8; TRAILER_LEN as usize];
    reader.read_exact(&mut trailer)?;

    let (len_bytes, magic) = trailer.split_at(8);
    if magic != MAGIC {
        return Ok(None);
    }

    let mut len = [0u8; 8];
    len.copy_from_slice(len_bytes);
    let len = u64::from_le_bytes(len);
    if len > total - TRAILER_LEN {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("payload length {} exceeds file size {}", len, total),
        ));
    }

    Ok(Some(PayloadRange {
        offset: total - TRAILER_LEN - len,
        len,
    }))
}

/// Restores asset sets from the payload appended to an executable
#[derive(Debug, Clone)]
pub struct BundleRestorer {
    executable: PathBuf,
}

impl BundleRestorer {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    fn open_payload(&self) -> RunxResult<io::Take<File>> {
        let open_err = |e| RunxError::io(format!("reading payload of {}", self.executable.display()), e);

        let mut file = File::open(&self.executable).map_err(open_err)?;
        let range = read_trailer(&mut file)
            .map_err(open_err)?
            .ok_or_else(|| RunxError::PayloadMissing(self.executable.clone()))?;

        file.seek(SeekFrom::Start(range.offset)).map_err(open_err)?;
        Ok(file.take(range.len))
    }
}

impl Restorer for BundleRestorer {
    fn restore(&self, target: &Path, asset_set: &str) -> RunxResult<()> {
        let payload = self.open_payload()?;
        let restore_err = |source| RunxError::Restore {
            asset_set: asset_set.to_string(),
            path: target.to_path_buf(),
            source,
        };

        let mut archive = tar::Archive::new(GzDecoder::new(payload));
        let mut restored = 0usize;

        for entry in archive.entries().map_err(restore_err)? {
            let mut entry = entry.map_err(restore_err)?;
            let in_set = {
                let path = entry.path().map_err(restore_err)?;
                first_component(&path) == Some(asset_set)
            };
            if !in_set {
                continue;
            }
            // unpack_in refuses entries escaping `target`
            entry.unpack_in(target).map_err(restore_err)?;
            restored += 1;
        }

        if restored == 0 {
            return Err(RunxError::AssetSetMissing(asset_set.to_string()));
        }

        debug!("Restored {} entries of {} into {}", restored, asset_set, target.display());
        Ok(())
    }
}

fn first_component(path: &Path) -> Option<&str> {
    path.components()
        .find(|c| !matches!(c, Component::CurDir))
        .and_then(|c| match c {
            Component::Normal(name) => name.to_str(),
            _ => None,
        })
}

/// Archive `payload_dir` as asset set `asset_set` into a gzip'd tar
pub fn archive_payload(payload_dir: &Path, asset_set: &str) -> RunxResult<Vec<u8>> {
    let pack_err = |e| RunxError::pack(format!("archiving {}", payload_dir.display()), e);

    let mut builder = tar::Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
    builder
        .append_dir_all(asset_set, payload_dir)
        .map_err(pack_err)?;
    let encoder = builder.into_inner().map_err(pack_err)?;
    encoder.finish().map_err(pack_err)
}

/// Write a packed launcher: `launcher` followed by the archived payload
///
/// An existing payload on `launcher` is replaced. Returns the payload size.
pub fn pack(launcher: &Path, payload_dir: &Path, output: &Path) -> RunxResult<u64> {
    if !payload_dir.is_dir() {
        return Err(RunxError::pack(
            format!("payload {} is not a directory", payload_dir.display()),
            io::Error::from(io::ErrorKind::NotFound),
        ));
    }

    if same_file(launcher, output) {
        return Err(RunxError::pack(
            format!("output {} is the launcher itself", output.display()),
            io::Error::from(io::ErrorKind::InvalidInput),
        ));
    }

    let payload = archive_payload(payload_dir, RUNTIME_ASSET_SET)?;

    // fs::copy carries the executable bit over
    fs::copy(launcher, output).map_err(|e| {
        RunxError::pack(
            format!("copying {} to {}", launcher.display(), output.display()),
            e,
        )
    })?;

    let out_err = |e| RunxError::pack(format!("writing {}", output.display()), e);
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(output)
        .map_err(out_err)?;

    if let Some(existing) = read_trailer(&mut file).map_err(out_err)? {
        debug!("Replacing existing payload of {} bytes", existing.len);
        file.set_len(existing.offset).map_err(out_err)?;
    }

    file.seek(SeekFrom::End(0)).map_err(out_err)?;
    let len = payload.len() as u64;
    file.write_all(&payload).map_err(out_err)?;
    file.write_all(&len.to_le_bytes()).map_err(out_err)?;
    file.write_all(&MAGIC).map_err(out_err)?;
    file.sync_all().map_err(out_err)?;

    info!("Packed {} ({} byte payload)", output.display(), len);
    Ok(len)
}

/// Both paths exist and resolve to the same file
fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
