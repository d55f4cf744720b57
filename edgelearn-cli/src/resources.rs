//! Resource manifest for local runs.
//!
//! Stands in for the resource sync process: a JSON file names the datasets
//! and models jobs may reference. Each dataset points at an index file with
//! one sample per line; the index is re-read periodically so appended
//! samples reach running jobs.

use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use edgelearn::job::{JobId, ModelInfo, DATASET_RESOURCE_KIND, MODEL_RESOURCE_KIND};
use edgelearn::resource::{Dataset, MemoryCache};
use tracing::{debug, warn};

use crate::error::CliError;

/// Dataset entry of the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct DatasetEntry {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub name: String,
    pub format: String,
    /// Sample index file, relative to the manifest when not absolute.
    pub index: PathBuf,
}

/// Model entry of the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntry {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    pub name: String,
    pub format: String,
    pub url: String,
}

fn default_namespace() -> String {
    "default".to_string()
}

/// Parsed resource manifest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResourceManifest {
    #[serde(default)]
    pub datasets: Vec<DatasetEntry>,
    #[serde(default)]
    pub models: Vec<ModelEntry>,
}

impl ResourceManifest {
    /// Load a manifest, resolving relative index paths against its directory.
    pub fn load(path: &Path) -> Result<Self, CliError> {
        let invalid = |reason: String| CliError::Resources {
            path: path.display().to_string(),
            reason,
        };

        let content = fs::read_to_string(path).map_err(|e| invalid(e.to_string()))?;
        let mut manifest: Self =
            serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        for dataset in &mut manifest.datasets {
            if dataset.index.is_relative() {
                dataset.index = base.join(&dataset.index);
            }
        }

        Ok(manifest)
    }

    /// Publish every model into `models`.
    pub fn publish_models(&self, models: &MemoryCache<ModelInfo>) {
        for entry in &self.models {
            let key = JobId::from_parts(&entry.namespace, &entry.name, MODEL_RESOURCE_KIND);
            debug!(model = %key, url = %entry.url, "Publishing model");
            models.insert(key, ModelInfo::new(&entry.format, &entry.url));
        }
    }

    /// Re-read every dataset index and publish the result into `datasets`.
    ///
    /// Unreadable indexes are logged and skipped; the previously published
    /// samples stay in place. Returns the number of datasets published.
    pub fn refresh_datasets(&self, datasets: &MemoryCache<Dataset>) -> usize {
        let mut published = 0;
        for entry in &self.datasets {
            let key = JobId::from_parts(&entry.namespace, &entry.name, DATASET_RESOURCE_KIND);
            match read_samples(&entry.index) {
                Ok(samples) => {
                    debug!(dataset = %key, samples = samples.len(), "Publishing dataset");
                    datasets.insert(key, Dataset::new(&entry.format, samples));
                    published += 1;
                }
                Err(e) => {
                    warn!(dataset = %key, index = %entry.index.display(), error = %e, "Failed to read dataset index");
                }
            }
        }
        published
    }
}

/// Read non-empty lines of a sample index, in order.
pub fn read_samples(path: &Path) -> io::Result<Vec<String>> {
    Ok(fs::read_to_string(path)?
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}
