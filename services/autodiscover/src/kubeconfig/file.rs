//! On-disk kubeconfig store

use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use super::{ConfigStore, Kubeconfig};
use crate::error::{AutodiscoverError, Result};

/// Kubeconfig file on the local filesystem.
///
/// Saves go to a temporary file in the same directory which is then renamed
/// over the target, so readers never observe a half-written config.
#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Resolve the kubeconfig path the way kubectl does for writes: an
    /// explicit path, else the first entry of `KUBECONFIG`, else
    /// `~/.kube/config`.
    pub fn discover(explicit: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = explicit {
            return Ok(Self::new(path));
        }

        if let Some(paths) = env::var_os("KUBECONFIG") {
            if let Some(first) = env::split_paths(&paths).find(|p| !p.as_os_str().is_empty()) {
                return Ok(Self::new(first));
            }
        }

        let home = home::home_dir().ok_or_else(|| {
            AutodiscoverError::store_load("~/.kube/config", "cannot determine home directory")
        })?;
        Ok(Self::new(home.join(".kube").join("config")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Result<Kubeconfig> {
        if !self.path.exists() {
            debug!(path = ?self.path, "Kubeconfig does not exist yet, starting empty");
            return Ok(Kubeconfig::empty());
        }

        let text = fs::read_to_string(&self.path)
            .map_err(|e| AutodiscoverError::store_load(&self.path, e))?;

        Kubeconfig::from_yaml(&text).map_err(|e| AutodiscoverError::store_load(&self.path, e))
    }

    fn save(&self, config: &Kubeconfig) -> Result<()> {
        let yaml = config
            .to_yaml()
            .map_err(|e| AutodiscoverError::store_save(&self.path, e))?;

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir).map_err(|e| AutodiscoverError::store_save(&self.path, e))?;

        let mut tmp =
            NamedTempFile::new_in(&dir).map_err(|e| AutodiscoverError::store_save(&self.path, e))?;
        tmp.write_all(yaml.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|e| AutodiscoverError::store_save(&self.path, e))?;
        tmp.persist(&self.path)
            .map_err(|e| AutodiscoverError::store_save(&self.path, e.error))?;

        debug!(path = ?self.path, bytes = yaml.len(), "Wrote kubeconfig");
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
