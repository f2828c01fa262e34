//! Name-keyed [`Storage`] on top of Google Drive's ID-keyed files API.
//!
//! Every operation first translates the ref into a Drive file ID, from the
//! cache when possible and otherwise with a name query against the app data
//! folder. Drive allows several files to share a name; callers are expected
//! to pick unique refs (content hashes), and put deletes any existing file
//! before creating the new one so each ref maps to a single file.
//!
//! The delete-then-create sequence in put is not atomic: two concurrent puts
//! of the same ref can leave two files behind, or a cached ID for a file that
//! no longer exists. With content-derived refs both writers store identical
//! bytes, so either outcome still reads back correctly.

use std::collections::HashMap;

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use tracing::{debug, info, warn};

use driveblob_common::cache::BoundedCache;
use driveblob_common::{ErrorKind, Storage, StorageError};

use crate::config::DriveConfig;
use crate::files::{DriveFiles, HttpFiles, APP_DATA_FOLDER};

pub struct DriveStorage<F = HttpFiles> {
    files: F,
    /// ref → Drive file ID, so downloads don't pay for a name query each time.
    cache: BoundedCache<String, String>,
}

impl DriveStorage<HttpFiles> {
    pub fn from_config(config: &DriveConfig) -> Result<Self, StorageError> {
        const OP: &str = "drive.New";
        config
            .validate()
            .map_err(|e| StorageError::new(OP, ErrorKind::Configuration, e))?;
        let files = HttpFiles::new(config).map_err(|e| StorageError::io(OP, e))?;
        info!(cache_size = config.cache_size, "Drive storage initialized");
        Ok(Self::with_files(files, config.cache_size))
    }

    /// Construct from a flat option map (`accessToken`, `tokenType`,
    /// `refreshToken`, `expiry`, plus optional `clientId`, `clientSecret`,
    /// `cacheSize`).
    pub fn from_options(opts: &HashMap<String, String>) -> Result<Self, StorageError> {
        let config = DriveConfig::from_options(opts)
            .map_err(|e| StorageError::new("drive.New", ErrorKind::Configuration, e))?;
        Self::from_config(&config)
    }
}

impl<F: DriveFiles> DriveStorage<F> {
    pub fn with_files(files: F, cache_size: usize) -> Self {
        Self {
            files,
            cache: BoundedCache::new(cache_size),
        }
    }

    pub fn files(&self) -> &F {
        &self.files
    }

    /// Resolve `reference` to the ID of the first file carrying that name.
    /// `Ok(None)` means no such file exists.
    async fn file_id(&self, reference: &str) -> anyhow::Result<Option<String>> {
        if let Some(id) = self.cache.get(reference) {
            return Ok(Some(id));
        }

        let ids = self.files.find_by_name(reference).await?;
        let Some(id) = ids.first().cloned() else {
            return Ok(None);
        };
        if ids.len() > 1 {
            warn!(
                reference = %reference,
                matches = ids.len(),
                chosen = %id,
                "Multiple Drive files share this ref; using the first"
            );
        }

        self.cache.add(reference.to_string(), id.clone());
        Ok(Some(id))
    }

    /// Delete every file whose name contains `fragment`, dropping their cache
    /// entries. All deletions are attempted; the first failure is returned.
    pub async fn cleanup(&self, fragment: &str) -> Result<usize, StorageError> {
        const OP: &str = "drive.Cleanup";
        let matches = self
            .files
            .list_containing(fragment)
            .await
            .map_err(|e| StorageError::io(OP, e))?;

        let mut deleted = 0;
        let mut first_err = None;
        for file in matches {
            match self.files.delete(&file.id).await {
                Ok(()) => deleted += 1,
                Err(e) => {
                    warn!(id = %file.id, name = %file.name, error = %e, "Cleanup delete failed");
                    first_err.get_or_insert(e);
                }
            }
            self.cache.remove(&file.name);
        }

        match first_err {
            Some(e) => Err(StorageError::io(OP, e)),
            None => {
                info!(fragment = %fragment, deleted, "Drive cleanup complete");
                Ok(deleted)
            }
        }
    }
}

fn not_found(reference: &str) -> anyhow::Error {
    anyhow!("no file named {:?} in {}", reference, APP_DATA_FOLDER)
}

#[async_trait]
impl<F: DriveFiles> Storage for DriveStorage<F> {
    async fn download(&self, reference: &str) -> Result<Bytes, StorageError> {
        const OP: &str = "drive.Download";
        let id = match self.file_id(reference).await {
            Ok(Some(id)) => id,
            Ok(None) => return Err(StorageError::not_exist(OP, not_found(reference))),
            Err(e) => return Err(StorageError::io(OP, e)),
        };

        let data = self
            .files
            .download(&id)
            .await
            .map_err(|e| StorageError::io(OP, e))?;
        debug!(reference = %reference, id = %id, size = data.len(), "Drive download complete");
        Ok(data)
    }

    async fn put(&self, reference: &str, contents: Bytes) -> Result<(), StorageError> {
        const OP: &str = "drive.Put";
        let existing = self
            .file_id(reference)
            .await
            .map_err(|e| StorageError::io(OP, e))?;
        if existing.is_some() {
            self.delete(reference).await?;
        }

        // The new ID is not cached; the next lookup fetches it.
        self.files
            .create(reference, contents)
            .await
            .map_err(|e| StorageError::io(OP, e))?;
        Ok(())
    }

    async fn delete(&self, reference: &str) -> Result<(), StorageError> {
        const OP: &str = "drive.Delete";
        let id = match self.file_id(reference).await {
            Ok(Some(id)) => id,
            Ok(None) => return Ok(()),
            Err(e) => return Err(StorageError::io(OP, e)),
        };

        self.files
            .delete(&id)
            .await
            .map_err(|e| StorageError::io(OP, e))?;
        self.cache.remove(reference);
        debug!(reference = %reference, id = %id, "Drive delete complete");
        Ok(())
    }

    fn link_base(&self) -> Result<String, StorageError> {
        // Drive links are keyed by file ID, not by ref.
        Err(StorageError::not_supported("drive.LinkBase"))
    }
}
