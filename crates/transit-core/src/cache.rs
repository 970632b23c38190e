//! On-disk memoization of intermediate results.
//!
//! Artifacts live under a root directory, one file per key. Writes go to a
//! temporary file in the same directory and are renamed into place, so a
//! reader never sees a partially written artifact. Computations for the
//! same key are serialized through a per-key lock.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{Result, TransitError};
use crate::frame::Frame;
use crate::io::frame_codec::{read_frame, write_frame};

/// A value that can be persisted in the [`ResultCache`].
pub trait Artifact: Sized {
    fn encode<W: Write>(&self, w: &mut W) -> Result<()>;
    fn decode<R: BufRead>(r: &mut R) -> Result<Self>;
}

impl Artifact for Frame {
    fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        write_frame(w, self)
    }

    fn decode<R: BufRead>(r: &mut R) -> Result<Self> {
        read_frame(r)
    }
}

/// Kind of persisted artifact; selects the key suffix.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Source catalog detected on the reference frame.
    Catalog,
    /// Recentered positions for one frame.
    Positions,
    /// Aperture photometry for one frame.
    Photometry,
    /// Master bias/dark/flat.
    CalibrationFrame,
}

impl ArtifactKind {
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Catalog => ".cat.dat",
            Self::Positions => ".pos.dat",
            Self::Photometry => ".phot.dat",
            Self::CalibrationFrame => ".frame",
        }
    }
}

const IMAGE_EXTENSIONS: [&str; 6] = [".fits", ".fit", ".fts", ".tiff", ".tif", ".png"];

/// Deterministic cache key for an artifact derived from an image name.
///
/// A trailing image extension is replaced by the kind suffix, so
/// `night1_0042.fits` becomes `night1_0042.pos.dat` for positions.
pub fn artifact_key(image_name: &str, kind: ArtifactKind) -> String {
    let lower = image_name.to_ascii_lowercase();
    let stem = IMAGE_EXTENSIONS
        .iter()
        .find(|ext| lower.ends_with(*ext) && lower.len() > ext.len())
        .map(|ext| &image_name[..image_name.len() - ext.len()])
        .unwrap_or(image_name);
    format!("{stem}{}", kind.suffix())
}

/// File-backed artifact store.
#[derive(Debug)]
pub struct ResultCache {
    root: PathBuf,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ResultCache {
    /// Open (creating if needed) a cache rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.path_for(key).is_file()
    }

    /// Load a previously saved artifact.
    ///
    /// A missing file is `Ok(None)`. A file that exists but does not decode
    /// is also treated as a miss so that it gets recomputed and replaced.
    pub fn try_load<A: Artifact>(&self, key: &str) -> Result<Option<A>> {
        let path = self.path_for(key);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match A::decode(&mut BufReader::new(file)) {
            Ok(artifact) => Ok(Some(artifact)),
            Err(e) => {
                warn!(key, error = %e, "Discarding unreadable cached artifact");
                Ok(None)
            }
        }
    }

    /// Persist an artifact atomically (temp file + rename).
    pub fn save<A: Artifact>(&self, key: &str, artifact: &A) -> Result<()> {
        let path = self.path_for(key);
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;

        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            artifact.encode(&mut writer)?;
            writer.flush()?;
        }
        tmp.persist(&path)
            .map_err(|e| TransitError::Io(e.error))?;
        debug!(key, "Saved artifact");
        Ok(())
    }

    /// Return the cached artifact for `key`, or compute and save it.
    ///
    /// With `force` set the cache is bypassed and the artifact is always
    /// recomputed. At most one computation per key runs at a time; callers
    /// that wait on the lock observe the freshly saved result. A failed save
    /// is logged and the computed value is still returned.
    pub fn get_or_compute<A, F>(&self, key: &str, force: bool, compute: F) -> Result<A>
    where
        A: Artifact,
        F: FnOnce() -> Result<A>,
    {
        let lock = self.key_lock(key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        if !force {
            if let Some(artifact) = self.try_load(key)? {
                debug!(key, "Cache hit");
                return Ok(artifact);
            }
        }

        debug!(key, force, "Computing artifact");
        let artifact = compute()?;
        if let Err(e) = self.save(key, &artifact) {
            warn!(key, error = %e, "Failed to persist artifact");
        }
        Ok(artifact)
    }

    fn key_lock(&self, key: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.entry(key.to_string()).or_default().clone()
    }
}
