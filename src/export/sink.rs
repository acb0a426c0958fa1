use std::{
    fs,
    io::Write,
    path::{Component, Path, PathBuf},
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, bail, Context, Result};
use log::{info, warn};
use zip::{write::SimpleFileOptions, CompressionMethod, ZipWriter};

use super::Bundle;

/// Receives the finished file tree and turns it into a deliverable bundle.
pub trait ExportSink: Send {
    /// Writes `bundle` and returns where it ended up.
    fn write_bundle(&mut self, bundle: &Bundle) -> Result<String>;
}

fn checked_relative(path: &str) -> Result<&Path> {
    let relative = Path::new(path);
    let escapes = relative.is_absolute()
        || relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
    if escapes || path.is_empty() {
        bail!("refusing to write bundle entry outside the bundle: {path:?}");
    }
    Ok(relative)
}

fn check_entries(bundle: &Bundle) -> Result<()> {
    for entry in &bundle.entries {
        checked_relative(&entry.path)?;
    }
    Ok(())
}

/// Hidden sibling of `target` that holds the output until it is complete.
fn staging_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    target.with_file_name(format!(".{name}.partial"))
}

/// Removes a leftover staging path, file or directory.
fn discard(staging: &Path) -> Result<()> {
    let removed = if staging.is_dir() {
        fs::remove_dir_all(staging)
    } else if staging.exists() {
        fs::remove_file(staging)
    } else {
        return Ok(());
    };
    removed.with_context(|| format!("Failed to remove {}", staging.display()))
}

/// Runs `write` against a staging path and moves the result onto `target`
/// only when it succeeds. A failed write leaves nothing behind.
fn publish(target: &Path, write: impl FnOnce(&Path) -> Result<()>) -> Result<()> {
    if target.exists() {
        bail!("export destination {} already exists", target.display());
    }

    let staging = staging_path(target);
    discard(&staging)?;

    if let Err(err) = write(&staging) {
        if let Err(cleanup) = discard(&staging) {
            warn!("partial export left behind: {cleanup:#}");
        }
        return Err(err);
    }

    fs::rename(&staging, target)
        .with_context(|| format!("Failed to move export into {}", target.display()))
}

/// Writes the tree into `<root>/<bundle name>/`.
pub struct DirectorySink {
    root: PathBuf,
}

impl DirectorySink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

fn write_tree(dir: &Path, bundle: &Bundle) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    for entry in &bundle.entries {
        let path = dir.join(checked_relative(&entry.path)?);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(&path, &entry.contents)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}

impl ExportSink for DirectorySink {
    fn write_bundle(&mut self, bundle: &Bundle) -> Result<String> {
        let dir = self.root.join(checked_relative(&bundle.name)?);
        check_entries(bundle)?;

        publish(&dir, |staging| write_tree(staging, bundle))?;

        info!("wrote {} files to {}", bundle.entries.len(), dir.display());
        Ok(dir.display().to_string())
    }
}

/// Packs the tree into one uncompressed `<root>/<bundle name>.zip`.
pub struct ZipSink {
    root: PathBuf,
}

impl ZipSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

fn write_archive(path: &Path, bundle: &Bundle) -> Result<()> {
    let file =
        fs::File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut archive = ZipWriter::new(file);
    // Images are already compressed.
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);

    for entry in &bundle.entries {
        archive
            .start_file(entry.path.as_str(), options)
            .with_context(|| format!("Failed to add {} to archive", entry.path))?;
        archive
            .write_all(&entry.contents)
            .with_context(|| format!("Failed to write {} into archive", entry.path))?;
    }

    archive.finish().context("Failed to finish archive")?;
    Ok(())
}

impl ExportSink for ZipSink {
    fn write_bundle(&mut self, bundle: &Bundle) -> Result<String> {
        checked_relative(&bundle.name)?;
        check_entries(bundle)?;

        let path = self.root.join(format!("{}.zip", bundle.name));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        publish(&path, |staging| write_archive(staging, bundle))?;

        info!("packed {} files into {}", bundle.entries.len(), path.display());
        Ok(path.display().to_string())
    }
}

/// Keeps exported bundles in memory; clones share the same store.
#[derive(Clone, Default)]
pub struct MemorySink {
    bundles: Arc<Mutex<Vec<Bundle>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bundles(&self) -> Vec<Bundle> {
        match self.bundles.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl ExportSink for MemorySink {
    fn write_bundle(&mut self, bundle: &Bundle) -> Result<String> {
        self.bundles
            .lock()
            .map_err(|_| anyhow!("memory sink lock poisoned"))?
            .push(bundle.clone());
        Ok(format!("memory://{}", bundle.name))
    }
}
