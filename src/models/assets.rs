use crate::Result;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Copies packaged model assets into a private writable directory.
///
/// A cached file that exists and is non-empty counts as materialized. There
/// is no checksum, so a truncated or stale copy is reused as-is and never
/// repaired automatically.
#[derive(Debug, Clone)]
pub struct AssetCache {
    assets_dir: PathBuf,
    cache_dir: PathBuf,
}

impl AssetCache {
    pub fn new(assets_dir: impl Into<PathBuf>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            assets_dir: assets_dir.into(),
            cache_dir: cache_dir.into(),
        }
    }

    /// Packaged, read-only copy
    pub fn asset_path(&self, file_name: &str) -> PathBuf {
        self.assets_dir.join(file_name)
    }

    pub fn cached_path(&self, file_name: &str) -> PathBuf {
        self.cache_dir.join(file_name)
    }

    pub fn is_materialized(&self, file_name: &str) -> bool {
        is_non_empty_file(&self.cached_path(file_name))
    }

    /// Make sure `file_name` exists in the cache dir and return its path.
    pub fn materialize(&self, file_name: &str) -> Result<PathBuf> {
        let cached = self.cached_path(file_name);
        if is_non_empty_file(&cached) {
            tracing::debug!("Reusing cached model file: {}", cached.display());
            return Ok(cached);
        }

        let asset = self.asset_path(file_name);
        if !asset.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("model asset not found: {}", asset.display()),
            )
            .into());
        }

        fs::create_dir_all(&self.cache_dir)?;

        let mut reader = File::open(&asset)?;
        let mut writer = BufWriter::new(File::create(&cached)?);
        let copied = io::copy(&mut reader, &mut writer)?;
        writer.flush()?;

        tracing::info!(
            "Materialized model asset {} -> {} ({} bytes)",
            asset.display(),
            cached.display(),
            copied
        );

        Ok(cached)
    }
}

fn is_non_empty_file(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}
