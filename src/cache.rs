//! Disk cache for long-running fits.
//!
//! The stochastic ordinations (multi-restart NMDS, the MCMC latent-variable
//! model) are the only stages with non-trivial wall time. Their results are
//! serialized as JSON snapshots: load-if-present, else compute-and-save.
//! A corrupt or unreadable snapshot falls back to recomputation and is
//! overwritten; only a failed *write* surfaces as an error.

use crate::error::{EcoError, Result};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Load a cached result from `path`, or compute and save it.
pub fn load_or_compute<T, F>(path: &Path, compute: F) -> Result<T>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Result<T>,
{
    if path.exists() {
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<T>(&contents) {
                Ok(value) => {
                    debug!("loaded cached result from {}", path.display());
                    return Ok(value);
                }
                Err(err) => {
                    warn!(
                        "cache at {} is unreadable ({err}); recomputing",
                        path.display()
                    );
                }
            },
            Err(err) => {
                warn!(
                    "cache at {} could not be read ({err}); recomputing",
                    path.display()
                );
            }
        }
    }

    let value = compute()?;

    let serialized = serde_json::to_string(&value).map_err(|err| EcoError::Cache {
        path: path.display().to_string(),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, err),
    })?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|source| EcoError::Cache {
                path: path.display().to_string(),
                source,
            })?;
        }
    }
    fs::write(path, serialized).map_err(|source| EcoError::Cache {
        path: path.display().to_string(),
        source,
    })?;
    debug!("saved result to cache at {}", path.display());

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Snapshot {
        values: Vec<f64>,
        label: String,
    }

    fn snapshot() -> Snapshot {
        Snapshot {
            values: vec![1.0, 2.5, -0.5],
            label: "fit".to_string(),
        }
    }

    #[test]
    fn test_computes_and_saves_then_loads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fit.json");

        let mut computed = 0;
        let first: Snapshot = load_or_compute(&path, || {
            computed += 1;
            Ok(snapshot())
        })
        .unwrap();
        assert_eq!(computed, 1);
        assert_eq!(first, snapshot());
        assert!(path.exists());

        // Second call must hit the cache, not the closure
        let second: Snapshot = load_or_compute(&path, || {
            computed += 1;
            Ok(snapshot())
        })
        .unwrap();
        assert_eq!(computed, 1);
        assert_eq!(second, snapshot());
    }

    #[test]
    fn test_corrupt_cache_recomputes_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fit.json");
        fs::write(&path, "not json at all").unwrap();

        let value: Snapshot = load_or_compute(&path, || Ok(snapshot())).unwrap();
        assert_eq!(value, snapshot());

        // The overwritten snapshot now parses
        let reloaded: Snapshot = load_or_compute(&path, || {
            panic!("cache should have been repaired");
        })
        .unwrap();
        assert_eq!(reloaded, snapshot());
    }

    #[test]
    fn test_compute_error_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fit.json");
        let result: Result<Snapshot> = load_or_compute(&path, || {
            Err(crate::error::EcoError::InvalidConfig("boom".into()))
        });
        assert!(result.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/fit.json");
        let value: Snapshot = load_or_compute(&path, || Ok(snapshot())).unwrap();
        assert_eq!(value, snapshot());
        assert!(path.exists());
    }
}
