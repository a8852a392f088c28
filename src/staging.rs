//! Transient staging area for not-yet-delivered flyers.
//!
//! # Layout
//!
//! ```text
//! staging_root/
//! └── Supermercados São Vicente/
//!     ├── ofertas.pdf            # staged download
//!     └── 1760659200/            # one batch per rasterized PDF or image run
//!         ├── page-01.png
//!         └── page-02.png
//! ```
//!
//! The root is an explicit value passed to whoever needs it, so tests and
//! concurrent invocations each get their own directory.

use crate::error::{Error, Result};
use crate::models::Market;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, instrument};

const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Debug, Clone)]
pub struct StagingArea {
    root: PathBuf,
}

/// Images awaiting delivery for one source, one inner vector per batch directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedSource {
    pub name: String,
    pub batches: Vec<Vec<PathBuf>>,
}

impl StagedSource {
    pub fn image_count(&self) -> usize {
        self.batches.iter().map(Vec::len).sum()
    }
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn market_dir(&self, market: Market) -> PathBuf {
        self.root.join(market.name())
    }

    /// Delete everything under the root and recreate it empty.
    #[instrument(level = "debug", skip(self), fields(root = %self.root.display()))]
    pub async fn reset(&self) -> Result<()> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(Error::io(&self.root, e)),
        }
        fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Error::io(&self.root, e))
    }

    /// Write `bytes` to `relative` inside the market directory, creating parents.
    ///
    /// `relative` may contain a batch directory (`1760659200/0-1.jpg`) but
    /// must not escape the market directory.
    pub async fn write(&self, market: Market, relative: &str, bytes: &[u8]) -> Result<PathBuf> {
        let rel = Path::new(relative);
        if rel.as_os_str().is_empty()
            || !rel.components().all(|c| matches!(c, Component::Normal(_)))
        {
            return Err(Error::io(
                rel,
                std::io::Error::new(ErrorKind::InvalidInput, "staging path must be relative"),
            ));
        }

        let path = self.market_dir(market).join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io(parent, e))?;
        }
        fs::write(&path, bytes).await.map_err(|e| Error::io(&path, e))?;
        debug!(path = %path.display(), bytes = bytes.len(), "Staged file");
        Ok(path)
    }

    /// Best-effort removal of a staged file.
    pub async fn discard(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path).await {
            debug!(path = %path.display(), error = %e, "Could not discard staged file");
        }
    }

    /// Best-effort recursive removal of a batch directory.
    pub async fn discard_dir(&self, dir: &Path) {
        if let Err(e) = fs::remove_dir_all(dir).await {
            debug!(path = %dir.display(), error = %e, "Could not discard batch directory");
        }
    }

    /// Create a fresh timestamp-named batch directory for `market`.
    ///
    /// Uses the current unix time in seconds, moving forward one second at a
    /// time while the name is taken.
    pub async fn new_batch_dir(&self, market: Market) -> Result<PathBuf> {
        let market_dir = self.market_dir(market);
        fs::create_dir_all(&market_dir)
            .await
            .map_err(|e| Error::io(&market_dir, e))?;

        let mut stamp = Utc::now().timestamp();
        loop {
            let candidate = market_dir.join(stamp.to_string());
            match fs::create_dir(&candidate).await {
                Ok(()) => return Ok(candidate),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => stamp += 1,
                Err(e) => return Err(Error::io(&candidate, e)),
            }
        }
    }

    /// Collect every staged source with at least one image, sorted by name.
    ///
    /// Batches are ordered by ascending numeric directory name; images within
    /// a batch by filename. Files that are not images are ignored.
    ///
    /// # Returns
    ///
    /// One [`StagedSource`] per market directory holding images, or an
    /// [`Error::Io`] when the staging tree cannot be read.
    ///
    /// # Examples
    ///
    /// ```ignore
    /// staging.write(Market::Delta, "20/a.jpg", b"jpg").await?;
    /// let pending = staging.pending().await?;
    /// assert_eq!(pending[0].name, "Delta Supermercados");
    /// assert_eq!(pending[0].image_count(), 1);
    /// ```
    pub async fn pending(&self) -> Result<Vec<StagedSource>> {
        let mut sources = Vec::new();
        for (name, path) in list_dirs(&self.root).await? {
            let mut batch_dirs = list_dirs(&path).await?;
            batch_dirs.sort_by_key(|(n, _)| (n.parse::<i64>().unwrap_or(0), n.clone()));

            let mut batches = Vec::new();
            for (_, batch_path) in batch_dirs {
                let images = list_images(&batch_path).await?;
                if !images.is_empty() {
                    batches.push(images);
                }
            }
            if !batches.is_empty() {
                sources.push(StagedSource { name, batches });
            }
        }
        sources.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(sources)
    }
}

async fn list_dirs(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut out = Vec::new();
    let mut entries = fs::read_dir(dir).await.map_err(|e| Error::io(dir, e))?;
    while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(dir, e))? {
        let file_type = entry.file_type().await.map_err(|e| Error::io(entry.path(), e))?;
        if file_type.is_dir() {
            out.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
        }
    }
    Ok(out)
}

async fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    let mut entries = fs::read_dir(dir).await.map_err(|e| Error::io(dir, e))?;
    while let Some(entry) = entries.next_entry().await.map_err(|e| Error::io(dir, e))? {
        let path = entry.path();
        if path.is_file() && is_image(&path) {
            out.push(path);
        }
    }
    out.sort();
    Ok(out)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}
