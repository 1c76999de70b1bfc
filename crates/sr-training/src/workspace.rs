//! Timestamped training workspace.
//!
//! ```text
//! <outdir>/<YYYYmmdd-HHMMSS>/
//!   args.txt
//!   history.json
//!   models/model.json
//!   models/epoch-001-psnr-30.1234.mpk
//!   log/events.jsonl
//!   log/metrics.csv
//! ```

use chrono::Local;
use sr_core::{Error, Result, TrainConfig};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::info;

/// Format of workspace directory names
pub const WORKSPACE_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

pub const ARGS_FILE: &str = "args.txt";
pub const HISTORY_FILE: &str = "history.json";

const MAX_NAME_ATTEMPTS: usize = 100;

/// Directory layout of one training run
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Create `<outdir>/<timestamp>` with its `models/` and `log/` directories.
    ///
    /// A run started in the same second as an existing one gets a `-2`, `-3`,
    /// ... suffix.
    pub fn create(outdir: &Path) -> Result<Self> {
        let name = Local::now().format(WORKSPACE_TIMESTAMP_FORMAT).to_string();
        let mut attempt = 1;
        loop {
            let candidate = if attempt == 1 {
                name.clone()
            } else {
                format!("{name}-{attempt}")
            };
            match Self::create_named(outdir, &candidate) {
                Err(Error::InvalidArgument(_)) if attempt < MAX_NAME_ATTEMPTS => attempt += 1,
                result => return result,
            }
        }
    }

    /// Create `<outdir>/<name>`, which must not exist yet.
    pub fn create_named(outdir: &Path, name: &str) -> Result<Self> {
        fs::create_dir_all(outdir)?;
        let workspace = Self {
            root: outdir.join(name),
        };
        match fs::create_dir(&workspace.root) {
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(Error::InvalidArgument(format!(
                    "workspace {} already exists",
                    workspace.root.display()
                )));
            }
            result => result?,
        }
        fs::create_dir(workspace.models_dir())?;
        fs::create_dir(workspace.log_dir())?;
        info!("Workspace: {}", workspace.root.display());
        Ok(workspace)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn models_dir(&self) -> PathBuf {
        self.root.join("models")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.root.join("log")
    }

    pub fn args_path(&self) -> PathBuf {
        self.root.join(ARGS_FILE)
    }

    pub fn history_path(&self) -> PathBuf {
        self.root.join(HISTORY_FILE)
    }

    /// Write the resolved configuration to `args.txt`, one `key=value` per line.
    pub fn write_args(&self, config: &TrainConfig) -> Result<PathBuf> {
        let path = self.args_path();
        let mut file = fs::File::create(&path)?;
        for (key, value) in config.key_values()? {
            writeln!(file, "{key}={value}")?;
        }
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_layout() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::create(dir.path()).unwrap();

        assert!(workspace.models_dir().is_dir());
        assert!(workspace.log_dir().is_dir());

        let name = workspace.root().file_name().unwrap().to_str().unwrap();
        assert_eq!(name.len(), "20240101-120000".len());
        assert!(chrono::NaiveDateTime::parse_from_str(name, WORKSPACE_TIMESTAMP_FORMAT).is_ok());
    }

    #[test]
    fn test_existing_workspace_is_rejected() {
        let dir = TempDir::new().unwrap();
        let first = Workspace::create_named(dir.path(), "run").unwrap();
        first.write_args(&TrainConfig::default()).unwrap();

        let second = Workspace::create_named(dir.path(), "run");
        assert!(matches!(second, Err(Error::InvalidArgument(_))));
        assert!(first.args_path().is_file());
    }

    #[test]
    fn test_runs_in_the_same_second_get_distinct_workspaces() {
        let dir = TempDir::new().unwrap();
        let roots: Vec<PathBuf> = (0..3)
            .map(|_| Workspace::create(dir.path()).unwrap().root().to_path_buf())
            .collect();

        assert_ne!(roots[0], roots[1]);
        assert_ne!(roots[1], roots[2]);
        assert_ne!(roots[0], roots[2]);
        assert!(roots.iter().all(|root| root.join("models").is_dir()));
    }

    #[test]
    fn test_write_args() {
        let dir = TempDir::new().unwrap();
        let workspace = Workspace::create_named(dir.path(), "run").unwrap();

        let mut config = TrainConfig::default();
        config.training.epochs = 3;
        let path = workspace.write_args(&config).unwrap();

        let content = fs::read_to_string(path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert!(lines.contains(&"training.epochs=3"));
        assert!(lines.contains(&"dataset.scale=2"));
        assert!(lines.contains(&"model.pretrained_model=None"));

        let mut sorted = lines.clone();
        sorted.sort();
        assert_eq!(lines, sorted);
    }
}
