use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tidemark_logging::{ingest_debug, ingest_info};

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("could not run git: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("cannot resolve {}: {source}", path.display())]
    Resolve {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{} is outside the work tree {}", path.display(), work_tree.display())]
    OutsideWorkTree { path: PathBuf, work_tree: PathBuf },
    #[error("git {step} failed ({status}): {stderr}")]
    GitFailed {
        step: &'static str,
        status: String,
        stderr: String,
    },
}

/// Makes a finished run's outputs durable somewhere beyond the local disk.
pub trait Publisher: Send + Sync {
    fn commit(&self, paths: &[PathBuf], message: &str) -> Result<(), PublishError>;
}

/// Used when publishing is switched off.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPublisher;

impl Publisher for NoopPublisher {
    fn commit(&self, paths: &[PathBuf], _message: &str) -> Result<(), PublishError> {
        ingest_debug!("publishing disabled; {} paths left uncommitted", paths.len());
        Ok(())
    }
}

/// `git add` + `git commit` inside an existing work tree.
#[derive(Debug, Clone)]
pub struct GitPublisher {
    work_tree: PathBuf,
}

impl GitPublisher {
    pub fn new(work_tree: PathBuf) -> Self {
        Self { work_tree }
    }

    fn git(&self, step: &'static str, args: &[&str], paths: &[PathBuf]) -> Result<(), PublishError> {
        let output = Command::new("git")
            .arg("-C")
            .arg(&self.work_tree)
            .args(args)
            .args(paths)
            .output()?;
        if output.status.success() {
            return Ok(());
        }
        Err(PublishError::GitFailed {
            step,
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    fn has_staged_changes(&self) -> Result<bool, PublishError> {
        let status = Command::new("git")
            .arg("-C")
            .arg(&self.work_tree)
            .args(["diff", "--cached", "--quiet"])
            .status()?;
        // exit 1 means "there are differences"
        Ok(status.code() == Some(1))
    }

    /// Paths as git sees them from inside the work tree.
    fn tree_relative(&self, paths: &[PathBuf]) -> Result<Vec<PathBuf>, PublishError> {
        let work_tree = canonical(&self.work_tree)?;
        paths
            .iter()
            .map(|path| {
                let absolute = canonical(path)?;
                match absolute.strip_prefix(&work_tree) {
                    Ok(relative) => Ok(relative.to_path_buf()),
                    Err(_) => Err(PublishError::OutsideWorkTree {
                        path: absolute.clone(),
                        work_tree: work_tree.clone(),
                    }),
                }
            })
            .collect()
    }
}

impl Publisher for GitPublisher {
    fn commit(&self, paths: &[PathBuf], message: &str) -> Result<(), PublishError> {
        if paths.is_empty() {
            return Ok(());
        }
        let paths = self.tree_relative(paths)?;
        self.git("add", &["add", "--"], &paths)?;
        if !self.has_staged_changes()? {
            ingest_info!("nothing to commit in {}", self.work_tree.display());
            return Ok(());
        }
        self.git("commit", &["commit", "-m", message, "--"], &paths)?;
        ingest_info!("committed {} paths: {}", paths.len(), message);
        Ok(())
    }
}

fn canonical(path: &Path) -> Result<PathBuf, PublishError> {
    path.canonicalize().map_err(|source| PublishError::Resolve {
        path: path.to_path_buf(),
        source,
    })
}
