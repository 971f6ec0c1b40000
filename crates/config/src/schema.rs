//! Config schema types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::loader::{data_dir, expand_home};

/// Manifest filenames recognised inside a skill package directory.
pub const DEFAULT_MANIFEST_NAMES: &[&str] = &["SKILL.md", "skill.md"];

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct QuiverConfig {
    pub skills: SkillsConfig,
}

/// Skills engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillsConfig {
    /// Whether the skills engine is enabled.
    pub enabled: bool,
    /// Bundled skill roots, highest priority last. Empty means `<data_dir>/skills`.
    pub bundled_paths: Vec<String>,
    /// Extra plugin roots, appended after the ones contributed by plugins.
    pub plugin_paths: Vec<String>,
    /// Manifest filenames that mark a directory as a skill package.
    pub manifest_names: Vec<String>,
    /// Install-record file. Defaults to `<data_dir>/skills-manifest.json`.
    pub install_manifest: Option<String>,
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bundled_paths: Vec::new(),
            plugin_paths: Vec::new(),
            manifest_names: DEFAULT_MANIFEST_NAMES
                .iter()
                .map(ToString::to_string)
                .collect(),
            install_manifest: None,
        }
    }
}

impl SkillsConfig {
    /// Bundled roots with `~` expanded, falling back to `<data_dir>/skills`.
    pub fn bundled_roots(&self) -> Vec<PathBuf> {
        if self.bundled_paths.is_empty() {
            return vec![data_dir().join("skills")];
        }
        self.bundled_paths.iter().map(|p| expand_home(p)).collect()
    }

    /// Configured plugin roots with `~` expanded.
    pub fn plugin_roots(&self) -> Vec<PathBuf> {
        self.plugin_paths.iter().map(|p| expand_home(p)).collect()
    }

    /// Path of the install-record manifest.
    pub fn install_manifest_path(&self) -> PathBuf {
        match &self.install_manifest {
            Some(p) => expand_home(p),
            None => data_dir().join("skills-manifest.json"),
        }
    }
}
