//! In-memory [`DriveFiles`] that behaves like the app data folder: IDs are
//! assigned on create and names may repeat. Counts calls and can fail any
//! single kind of call to simulate a flaky backend.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::bail;
use async_trait::async_trait;
use bytes::Bytes;

use crate::files::{DriveFile, DriveFiles};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    FindByName,
    ListContaining,
    Download,
    Create,
    Delete,
}

const ALL_CALLS: [Call; 5] = [
    Call::FindByName,
    Call::ListContaining,
    Call::Download,
    Call::Create,
    Call::Delete,
];

struct StoredFile {
    id: String,
    name: String,
    contents: Bytes,
}

#[derive(Default)]
pub struct MemoryFiles {
    files: Mutex<Vec<StoredFile>>,
    failing: Mutex<HashSet<Call>>,
    next_id: AtomicUsize,
    lookups: AtomicUsize,
    creates: AtomicUsize,
}

impl MemoryFiles {
    pub fn new() -> Self {
        Self::default()
    }

    fn files(&self) -> MutexGuard<'_, Vec<StoredFile>> {
        self.files.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn failing(&self) -> MutexGuard<'_, HashSet<Call>> {
        self.failing.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check(&self, call: Call) -> anyhow::Result<()> {
        if self.failing().contains(&call) {
            bail!("connection refused");
        }
        Ok(())
    }

    /// Number of `find_by_name` calls served so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Number of `create` calls attempted so far, failed ones included.
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::SeqCst)
    }

    /// Number of stored files carrying `name`.
    pub fn count_named(&self, name: &str) -> usize {
        self.files().iter().filter(|f| f.name == name).count()
    }

    pub fn len(&self) -> usize {
        self.files().len()
    }

    pub fn is_empty(&self) -> bool {
        self.files().is_empty()
    }

    /// Make subsequent calls of kind `call` fail as if the network were down.
    pub fn set_failing(&self, call: Call, failing: bool) {
        if failing {
            self.failing().insert(call);
        } else {
            self.failing().remove(&call);
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        for call in ALL_CALLS {
            self.set_failing(call, unavailable);
        }
    }
}

#[async_trait]
impl DriveFiles for MemoryFiles {
    async fn find_by_name(&self, name: &str) -> anyhow::Result<Vec<String>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.check(Call::FindByName)?;
        Ok(self
            .files()
            .iter()
            .filter(|f| f.name == name)
            .map(|f| f.id.clone())
            .collect())
    }

    async fn list_containing(&self, fragment: &str) -> anyhow::Result<Vec<DriveFile>> {
        self.check(Call::ListContaining)?;
        Ok(self
            .files()
            .iter()
            .filter(|f| f.name.contains(fragment))
            .map(|f| DriveFile {
                id: f.id.clone(),
                name: f.name.clone(),
            })
            .collect())
    }

    async fn download(&self, id: &str) -> anyhow::Result<Bytes> {
        self.check(Call::Download)?;
        match self.files().iter().find(|f| f.id == id) {
            Some(f) => Ok(f.contents.clone()),
            None => bail!("file {} not found", id),
        }
    }

    async fn create(&self, name: &str, contents: Bytes) -> anyhow::Result<String> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.check(Call::Create)?;
        let id = format!("file-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.files().push(StoredFile {
            id: id.clone(),
            name: name.to_string(),
            contents,
        });
        Ok(id)
    }

    async fn delete(&self, id: &str) -> anyhow::Result<()> {
        self.check(Call::Delete)?;
        self.files().retain(|f| f.id != id);
        Ok(())
    }
}
