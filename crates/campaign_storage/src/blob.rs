#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::debug;

use crate::store::StorageError;

/// Byte storage addressed by names the receipt store constructs.
pub trait BlobSink: Debug + Send + Sync {
    /// Writes `bytes` under `name`; an existing object is never replaced.
    fn write_once(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError>;
    fn read(&self, name: &str) -> Result<Vec<u8>, StorageError>;
}

/// Object names are flat: ASCII alphanumerics plus `-`, `_`, `.`, never `..`.
pub fn is_safe_object_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 128
        && !name.starts_with('.')
        && !name.contains("..")
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn reject_unsafe(name: &str) -> Result<(), StorageError> {
    if is_safe_object_name(name) {
        Ok(())
    } else {
        Err(StorageError::Unavailable(format!(
            "refusing unsafe object name '{}'",
            name.escape_default()
        )))
    }
}

/// Local filesystem backend: one flat directory of immutable objects.
#[derive(Debug, Clone)]
pub struct LocalFsBlobSink {
    root: PathBuf,
}

impl LocalFsBlobSink {
    /// Creates `root` if missing.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).map_err(|err| {
            StorageError::Unavailable(format!(
                "failed to create upload directory '{}': {err}",
                root.display()
            ))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        reject_unsafe(name)?;
        Ok(self.root.join(name))
    }
}

impl BlobSink for LocalFsBlobSink {
    fn write_once(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.object_path(name)?;
        let mut file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&path)
            .map_err(|err| match err.kind() {
                ErrorKind::AlreadyExists => StorageError::DuplicateKey {
                    table: "receipt_blobs",
                    key: name.to_string(),
                },
                _ => StorageError::Unavailable(format!(
                    "failed to create '{}': {err}",
                    path.display()
                )),
            })?;
        file.write_all(bytes)
            .and_then(|_| file.sync_all())
            .map_err(|err| {
                StorageError::Unavailable(format!("failed to write '{}': {err}", path.display()))
            })?;
        debug!(object = name, size = bytes.len(), "receipt object written");
        Ok(())
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(name)?;
        fs::read(&path).map_err(|err| match err.kind() {
            ErrorKind::NotFound => StorageError::NotFound {
                table: "receipt_blobs",
                key: name.to_string(),
            },
            _ => StorageError::Unavailable(format!("failed to read '{}': {err}", path.display())),
        })
    }
}

/// Process-local sink for tests and ephemeral deployments.
#[derive(Debug, Default)]
pub struct InMemoryBlobSink {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryBlobSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object_count(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn object_names(&self) -> Vec<String> {
        self.objects.lock().keys().cloned().collect()
    }
}

impl BlobSink for InMemoryBlobSink {
    fn write_once(&self, name: &str, bytes: &[u8]) -> Result<(), StorageError> {
        reject_unsafe(name)?;
        let mut objects = self.objects.lock();
        if objects.contains_key(name) {
            return Err(StorageError::DuplicateKey {
                table: "receipt_blobs",
                key: name.to_string(),
            });
        }
        objects.insert(name.to_string(), bytes.to_vec());
        Ok(())
    }

    fn read(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        reject_unsafe(name)?;
        self.objects
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound {
                table: "receipt_blobs",
                key: name.to_string(),
            })
    }
}
