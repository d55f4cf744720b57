//! Persistence of job definitions.
//!
//! Only the declarative definition is stored, keyed by job id. Runtime phase
//! state is in-memory and starts from scratch whenever a job (re)starts.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::job::{JobDefinition, JobId, JobSpec, ObjectMeta, TypeMeta};

/// Errors raised by a job store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Job store I/O error at {path}: {source}")]
    Io { path: PathBuf, source: io::Error },

    #[error("Malformed job definition: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Key-value persistence of job definitions.
///
/// Both operations are idempotent: saving twice overwrites, deleting a
/// missing id succeeds.
pub trait JobStore: Send + Sync {
    fn save(
        &self,
        id: &JobId,
        type_meta: &TypeMeta,
        object_meta: &ObjectMeta,
        spec: &JobSpec,
    ) -> Result<(), StoreError>;

    fn delete(&self, id: &JobId) -> Result<(), StoreError>;

    fn load(&self, id: &JobId) -> Result<Option<JobDefinition>, StoreError>;
}

fn record(type_meta: &TypeMeta, object_meta: &ObjectMeta, spec: &JobSpec) -> JobDefinition {
    JobDefinition {
        type_meta: type_meta.clone(),
        metadata: object_meta.clone(),
        spec: spec.clone(),
    }
}

/// Stores each definition as a JSON file under a directory.
#[derive(Debug, Clone)]
pub struct FileJobStore {
    directory: PathBuf,
}

impl FileJobStore {
    /// Opens (and creates) a store rooted at `directory`.
    pub fn open(directory: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let directory = directory.into();
        fs::create_dir_all(&directory).map_err(|source| StoreError::Io {
            path: directory.clone(),
            source,
        })?;
        Ok(Self { directory })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, id: &JobId) -> PathBuf {
        let name = id.as_str().replace('%', "%25").replace('/', "%2F");
        self.directory.join(format!("{}.json", name))
    }
}

impl JobStore for FileJobStore {
    fn save(
        &self,
        id: &JobId,
        type_meta: &TypeMeta,
        object_meta: &ObjectMeta,
        spec: &JobSpec,
    ) -> Result<(), StoreError> {
        let path = self.path_for(id);
        let content = serde_json::to_vec_pretty(&record(type_meta, object_meta, spec))?;
        fs::write(&path, content).map_err(|source| StoreError::Io { path, source })
    }

    fn delete(&self, id: &JobId) -> Result<(), StoreError> {
        let path = self.path_for(id);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn load(&self, id: &JobId) -> Result<Option<JobDefinition>, StoreError> {
        let path = self.path_for(id);
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }
}

/// In-memory store, for tests and ephemeral runs.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: Mutex<HashMap<JobId, JobDefinition>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.jobs.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.lock().is_empty()
    }
}

impl JobStore for MemoryJobStore {
    fn save(
        &self,
        id: &JobId,
        type_meta: &TypeMeta,
        object_meta: &ObjectMeta,
        spec: &JobSpec,
    ) -> Result<(), StoreError> {
        self.jobs
            .lock()
            .insert(id.clone(), record(type_meta, object_meta, spec));
        Ok(())
    }

    fn delete(&self, id: &JobId) -> Result<(), StoreError> {
        self.jobs.lock().remove(id);
        Ok(())
    }

    fn load(&self, id: &JobId) -> Result<Option<JobDefinition>, StoreError> {
        Ok(self.jobs.lock().get(id).cloned())
    }
}
