//! Persistence for skill install records.
//!
//! Records live in one JSON document at the configured install-manifest path.
//! A record that fails to save never reaches readers: the file is replaced
//! whole by renaming a sibling temp file over it.

use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};

use crate::{Result, types::InstallManifest};

/// Reads and replaces the install-record document for one skills setup.
pub struct ManifestStore {
    path: PathBuf,
}

impl ManifestStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Store at the configured install-manifest path.
    pub fn from_config(config: &quiver_config::SkillsConfig) -> Self {
        Self::new(config.install_manifest_path())
    }

    /// Read the install records. No file yet means no records.
    pub fn load(&self) -> Result<InstallManifest> {
        match std::fs::read_to_string(&self.path) {
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(InstallManifest::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the document with `records`, creating its directory on demand.
    ///
    /// On error the previous document is left as it was.
    pub fn save(&self, records: &InstallManifest) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let staged = self.path.with_extension("json.tmp");
        std::fs::write(&staged, serde_json::to_vec_pretty(records)?)?;
        std::fs::rename(&staged, &self.path)?;
        tracing::debug!(path = %self.path.display(), records = records.records.len(), "install records saved");
        Ok(())
    }

    /// Location of the install-record document.
    pub fn path(&self) -> &Path {
        &self.path
    }
}
