//! Job output directory layout and file operations.
//!
//! ```text
//! <output_dir>/
//! ├── data/train/<version>/data.txt   train samples handed to the train worker
//! ├── data/eval/<version>/data.txt    eval samples handed to the eval worker
//! ├── train/<version>/                train worker output
//! └── eval/<version>/                 eval worker output
//! ```

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::ControllerError;

/// The only sample file format with a writer.
pub const TXT_FORMAT: &str = "txt";

const SAMPLE_FILE_NAME: &str = "data.txt";

/// Directory tree of a job's output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
    samples_train: PathBuf,
    samples_eval: PathBuf,
    train_output: PathBuf,
    eval_output: PathBuf,
}

impl OutputLayout {
    /// Describes the layout under `root` without touching the file system.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            samples_train: root.join("data").join("train"),
            samples_eval: root.join("data").join("eval"),
            train_output: root.join("train"),
            eval_output: root.join("eval"),
            root,
        }
    }

    /// Creates every directory of the layout.
    pub fn create(&self) -> Result<(), ControllerError> {
        for dir in [
            &self.root,
            &self.samples_train,
            &self.samples_eval,
            &self.train_output,
            &self.eval_output,
        ] {
            fs::create_dir_all(dir).map_err(|e| ControllerError::io(dir, e))?;
        }
        Ok(())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn samples_train(&self) -> &Path {
        &self.samples_train
    }

    pub fn samples_eval(&self) -> &Path {
        &self.samples_eval
    }

    /// Output directory of the train worker for `version`.
    pub fn train_output(&self, version: u64) -> PathBuf {
        self.train_output.join(version.to_string())
    }

    /// Output directory of the eval worker for `version`.
    pub fn eval_output(&self, version: u64) -> PathBuf {
        self.eval_output.join(version.to_string())
    }
}

/// Writes `samples` to `<dir>/<version>/data.txt`, one per line.
///
/// Fails with [`ControllerError::UnsupportedFormat`] before creating anything
/// when `format` has no writer.
pub fn write_samples(
    samples: &[String],
    dir: &Path,
    version: u64,
    format: &str,
) -> Result<PathBuf, ControllerError> {
    if format != TXT_FORMAT {
        return Err(ControllerError::UnsupportedFormat {
            format: format.to_string(),
        });
    }

    let sub_dir = dir.join(version.to_string());
    fs::create_dir_all(&sub_dir).map_err(|e| ControllerError::io(&sub_dir, e))?;

    let path = sub_dir.join(SAMPLE_FILE_NAME);
    let file = File::create(&path).map_err(|e| ControllerError::io(&path, e))?;
    let mut writer = BufWriter::new(file);
    for line in samples {
        writeln!(writer, "{}", line).map_err(|e| ControllerError::io(&path, e))?;
    }
    writer.flush().map_err(|e| ControllerError::io(&path, e))?;

    debug!(path = %path.display(), count = samples.len(), "Wrote sample file");
    Ok(path)
}

/// Copies the artifact at `from` over `to`, creating `to`'s parent.
pub fn copy_artifact(from: &Path, to: &Path) -> Result<u64, ControllerError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|e| ControllerError::io(parent, e))?;
    }
    fs::copy(from, to).map_err(|e| ControllerError::io(from, e))
}

/// Maps a worker-visible path to the local mount.
///
/// ```
/// use edgelearn::controller::add_prefix;
///
/// assert_eq!(add_prefix("/rootfs", "/models/a.pb"), "/rootfs/models/a.pb");
/// assert_eq!(add_prefix("", "/models/a.pb"), "/models/a.pb");
/// ```
pub fn add_prefix(prefix: &str, path: &str) -> String {
    if prefix.is_empty() {
        return path.to_string();
    }
    Path::new(prefix)
        .join(path.trim_start_matches('/'))
        .to_string_lossy()
        .into_owned()
}

/// Maps a local path back to the path workers see.
///
/// Paths outside `prefix` are returned unchanged.
pub fn trim_prefix(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    if prefix.is_empty() {
        return path.to_string();
    }
    match path.strip_prefix(prefix) {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => {
            format!("/{}", rest.trim_start_matches('/'))
        }
        _ => path.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_layout_create() {
        let temp = TempDir::new().unwrap();
        let layout = OutputLayout::new(temp.path().join("job"));
        layout.create().unwrap();

        for sub in ["data/train", "data/eval", "train", "eval"] {
            assert!(temp.path().join("job").join(sub).is_dir(), "missing {}", sub);
        }
        assert_eq!(layout.train_output(3), temp.path().join("job/train/3"));
    }

    #[test]
    fn test_write_samples_txt() {
        let temp = TempDir::new().unwrap();
        let samples = vec!["a.jpg 1".to_string(), "b.jpg 0".to_string()];

        let path = write_samples(&samples, temp.path(), 2, "txt").unwrap();

        assert_eq!(path, temp.path().join("2").join("data.txt"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "a.jpg 1\nb.jpg 0\n");
    }

    #[test]
    fn test_write_samples_unsupported_format() {
        let temp = TempDir::new().unwrap();
        let err = write_samples(&["x".to_string()], temp.path(), 1, "csv").unwrap_err();

        assert!(matches!(err, ControllerError::UnsupportedFormat { ref format } if format == "csv"));
        assert!(!temp.path().join("1").exists());
    }

    #[test]
    fn test_copy_artifact_overwrites() {
        let temp = TempDir::new().unwrap();
        let from = temp.path().join("new.pb");
        let to = temp.path().join("deploy").join("model.pb");
        fs::write(&from, b"new").unwrap();

        copy_artifact(&from, &to).unwrap();
        assert_eq!(fs::read(&to).unwrap(), b"new");
    }

    #[test]
    fn test_trim_prefix() {
        assert_eq!(trim_prefix("/rootfs", "/rootfs/out/train/1"), "/out/train/1");
        assert_eq!(trim_prefix("/rootfs/", "/rootfs/out"), "/out");
        assert_eq!(trim_prefix("/rootfs", "/rootfsx/out"), "/rootfsx/out");
        assert_eq!(trim_prefix("", "/out"), "/out");
    }

    #[test]
    fn test_prefix_round_trip() {
        let local = add_prefix("/rootfs", "/out/eval/2");
        assert_eq!(trim_prefix("/rootfs", &local), "/out/eval/2");
    }
}
