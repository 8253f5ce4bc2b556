//! Content-keyed stage cache.
//!
//! Every stage output `out.csv` gets a sidecar `out.csv.manifest.json`
//! recording a key: the SHA-256 of the stage name, its parameters (as JSON)
//! and the contents of every input file. A stage may be skipped only when
//! its output exists and the stored key equals the key computed for the
//! current invocation, so changing a parameter or an input file invalidates
//! the output.

use std::{
    fs::{self, File},
    io::{self, Read as _},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};

#[derive(Debug, derive_more::Display, derive_more::Error, derive_more::From)]
pub enum CacheError {
    #[display("failed to hash {}", path.display())]
    #[from(ignore)]
    HashInput { path: PathBuf, source: io::Error },
    #[display("failed to serialize stage parameters")]
    Params(serde_json::Error),
    #[display("failed to write manifest {}", path.display())]
    #[from(ignore)]
    WriteManifest { path: PathBuf, source: io::Error },
}

/// Manifest stored next to a stage output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageManifest {
    pub stage: String,
    pub key: String,
    pub inputs: Vec<PathBuf>,
}

/// Cache entry for one stage invocation.
#[derive(Debug, Clone)]
pub struct StageCache {
    output: PathBuf,
    manifest: StageManifest,
}

fn hash_file(hasher: &mut Sha256, path: &Path) -> io::Result<()> {
    let mut file = File::open(path)?;
    let mut buffer = vec![0u8; 1024 * 1024];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            return Ok(());
        }
        hasher.update(&buffer[..n]);
    }
}

/// Sidecar manifest path of `output`.
#[must_use]
pub fn manifest_path(output: &Path) -> PathBuf {
    let mut name = output.as_os_str().to_owned();
    name.push(".manifest.json");
    PathBuf::from(name)
}

impl StageCache {
    /// Computes the key for running `stage` with `params` on `inputs`.
    pub fn new<P>(
        stage: &str,
        params: &P,
        inputs: &[&Path],
        output: &Path,
    ) -> Result<Self, CacheError>
    where
        P: Serialize,
    {
        let mut hasher = Sha256::new();
        hasher.update(stage.as_bytes());
        hasher.update([0u8]);
        hasher.update(serde_json::to_vec(params)?);
        for path in inputs {
            hasher.update([0u8]);
            hash_file(&mut hasher, path).map_err(|source| CacheError::HashInput {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let key = format!("{:x}", hasher.finalize());
        Ok(Self {
            output: output.to_path_buf(),
            manifest: StageManifest {
                stage: stage.to_owned(),
                key,
                inputs: inputs.iter().map(|p| p.to_path_buf()).collect(),
            },
        })
    }

    #[must_use]
    pub fn key(&self) -> &str {
        &self.manifest.key
    }

    /// Whether the output exists and was produced with the same key.
    ///
    /// A missing or unreadable manifest is a miss.
    #[must_use]
    pub fn is_fresh(&self) -> bool {
        if !self.output.exists() {
            return false;
        }
        let stored = fs::read(manifest_path(&self.output))
            .ok()
            .and_then(|bytes| serde_json::from_slice::<StageManifest>(&bytes).ok());
        match stored {
            Some(stored) => stored.stage == self.manifest.stage && stored.key == self.manifest.key,
            None => false,
        }
    }

    /// Records that the output has been written for the current key.
    pub fn commit(&self) -> Result<(), CacheError> {
        let path = manifest_path(&self.output);
        let write = || -> io::Result<()> {
            let json = serde_json::to_vec_pretty(&self.manifest)?;
            fs::write(&path, json)
        };
        write().map_err(|source| CacheError::WriteManifest {
            path: path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Params {
        seed: u64,
    }

    fn cache(stage: &str, seed: u64, input: &Path, output: &Path) -> StageCache {
        StageCache::new(stage, &Params { seed }, &[input], output).unwrap()
    }

    #[test]
    fn test_miss_then_hit() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        let output = dir.path().join("out.csv");
        fs::write(&input, "a,b\n1,2\n").unwrap();

        let cache = cache("join", 1, &input, &output);
        assert!(!cache.is_fresh());
        fs::write(&output, "done").unwrap();
        // output without manifest is still a miss
        assert!(!cache.is_fresh());
        cache.commit().unwrap();
        assert!(cache.is_fresh());
        assert!(manifest_path(&output).exists());
    }

    #[test]
    fn test_parameter_change_invalidates() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        let output = dir.path().join("out.csv");
        fs::write(&input, "a\n").unwrap();
        fs::write(&output, "done").unwrap();

        cache("split", 1, &input, &output).commit().unwrap();
        let changed = cache("split", 2, &input, &output);
        assert!(!changed.is_fresh());
    }

    #[test]
    fn test_input_change_invalidates() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        let output = dir.path().join("out.csv");
        fs::write(&input, "a\n").unwrap();
        fs::write(&output, "done").unwrap();

        let before = cache("filter", 1, &input, &output);
        before.commit().unwrap();
        fs::write(&input, "b\n").unwrap();
        let after = cache("filter", 1, &input, &output);
        assert_ne!(before.key(), after.key());
        assert!(!after.is_fresh());
    }

    #[test]
    fn test_missing_input_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.csv");
        let output = dir.path().join("out.csv");
        let err = StageCache::new("filter", &Params { seed: 1 }, &[missing.as_path()], &output)
            .unwrap_err();
        assert!(matches!(err, CacheError::HashInput { .. }));
    }
}
