//! JSON load/store, backups and the dry-run aware writer

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json::ser::PrettyFormatter;
use tracing::{debug, info};

use crate::{ContentError, Result};

/// Pretty-print indentation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Indent {
    #[default]
    Two,
    Four,
}

impl Indent {
    fn bytes(self) -> &'static [u8] {
        match self {
            Indent::Two => b"  ",
            Indent::Four => b"    ",
        }
    }
}

/// What to do when a backup already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupPolicy {
    /// Keep the first backup ever taken
    KeepExisting,
    /// Replace it with the current file
    Overwrite,
}

pub fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ContentError::NotFound(path.to_path_buf())
        } else {
            ContentError::io(path, e)
        }
    })
}

pub fn read_json(path: &Path) -> Result<Value> {
    let text = read_text(path)?;
    serde_json::from_str(&text).map_err(|e| ContentError::json(path, e))
}

pub fn read_json_as<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let text = read_text(path)?;
    serde_json::from_str(&text).map_err(|e| ContentError::json(path, e))
}

/// Pretty JSON text with a trailing newline
pub fn to_pretty<T: Serialize + ?Sized>(value: &T, indent: Indent) -> serde_json::Result<String> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(indent.bytes());
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    buf.push(b'\n');
    // serde_json only emits UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// `*.json` files directly under `dir`, sorted by name.
///
/// A missing directory yields an empty list.
pub fn json_files(dir: &Path) -> Result<Vec<PathBuf>> {
    json_files_matching(dir, |_| true)
}

/// Like [`json_files`], filtered on the file stem
pub fn json_files_matching(dir: &Path, keep: impl Fn(&str) -> bool) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(|e| ContentError::io(dir, e))? {
        let path = entry.map_err(|e| ContentError::io(dir, e))?.path();
        let is_json = path.extension().is_some_and(|e| e == "json");
        let stem_ok = path
            .file_stem()
            .and_then(|s| s.to_str())
            .is_some_and(&keep);
        if is_json && stem_ok && path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// `name.json` -> `name.json.bak`
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".bak");
    path.with_file_name(name)
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Performs (or, in dry-run mode, only logs) every filesystem change
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentWriter {
    dry_run: bool,
}

impl ContentWriter {
    pub fn new(dry_run: bool) -> Self {
        Self { dry_run }
    }

    pub fn dry_run() -> Self {
        Self::new(true)
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn create_dir_all(&self, dir: &Path) -> Result<()> {
        if dir.is_dir() {
            return Ok(());
        }
        if self.dry_run {
            info!(dir = %dir.display(), "dry run: would create directory");
            return Ok(());
        }
        fs::create_dir_all(dir).map_err(|e| ContentError::io(dir, e))?;
        debug!(dir = %dir.display(), "created directory");
        Ok(())
    }

    pub fn write_text(&self, path: &Path, text: &str) -> Result<()> {
        if self.dry_run {
            info!(path = %path.display(), bytes = text.len(), "dry run: would write");
            return Ok(());
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            self.create_dir_all(parent)?;
        }
        fs::write(path, text).map_err(|e| ContentError::io(path, e))?;
        debug!(path = %path.display(), bytes = text.len(), "wrote file");
        Ok(())
    }

    pub fn write_json<T: Serialize + ?Sized>(&self, path: &Path, value: &T, indent: Indent) -> Result<()> {
        let text = to_pretty(value, indent).map_err(|e| ContentError::json(path, e))?;
        self.write_text(path, &text)
    }

    /// Copy `path` to `path.bak`. Returns the backup path when one was written.
    pub fn backup(&self, path: &Path, policy: BackupPolicy) -> Result<Option<PathBuf>> {
        let bak = backup_path(path);
        if policy == BackupPolicy::KeepExisting && bak.exists() {
            debug!(backup = %bak.display(), "backup already present");
            return Ok(None);
        }
        if self.dry_run {
            info!(backup = %bak.display(), "dry run: would back up");
            return Ok(Some(bak));
        }
        fs::copy(path, &bak).map_err(|e| ContentError::io(path, e))?;
        debug!(backup = %bak.display(), "backed up");
        Ok(Some(bak))
    }

    /// Copy then delete, so it also works across filesystems
    pub fn move_file(&self, from: &Path, to: &Path) -> Result<()> {
        if self.dry_run {
            info!(from = %from.display(), to = %to.display(), "dry run: would move");
            return Ok(());
        }
        fs::copy(from, to).map_err(|e| ContentError::io(from, e))?;
        fs::remove_file(from).map_err(|e| ContentError::io(from, e))?;
        debug!(from = %from.display(), to = %to.display(), "moved file");
        Ok(())
    }
}
