use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use async_trait::async_trait;

#[cfg(feature = "metrics")]
use quiver_metrics::{counter, histogram, skills as skills_metrics};

use {quiver_config::SkillsConfig, serde::Serialize};

use crate::types::{DiscoveryWarning, SkillSource};

/// Packages found by one discovery pass, in root-priority order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryReport {
    pub sources: Vec<SkillSource>,
    pub warnings: Vec<DiscoveryWarning>,
}

/// Discovers skill packages.
#[async_trait]
pub trait SkillDiscoverer: Send + Sync {
    /// Scan every root. Unreadable roots become warnings, never errors.
    async fn discover(&self) -> DiscoveryReport;

    /// Directories worth watching for changes. Roots learned during the
    /// last [`discover`](Self::discover) are included.
    fn watch_paths(&self) -> Vec<PathBuf> {
        Vec::new()
    }
}

/// Supplies plugin-contributed skill roots, in priority order.
///
/// Implemented by whatever tracks installed plugins; the engine only sees
/// the resulting roots.
#[async_trait]
pub trait PluginRootProvider: Send + Sync {
    async fn plugin_roots(&self) -> anyhow::Result<Vec<SkillSource>>;
}

/// A fixed list of plugin roots.
pub struct StaticPluginRoots(pub Vec<SkillSource>);

#[async_trait]
impl PluginRootProvider for StaticPluginRoots {
    async fn plugin_roots(&self) -> anyhow::Result<Vec<SkillSource>> {
        Ok(self.0.clone())
    }
}

/// Default filesystem discoverer.
pub struct FsSkillDiscoverer {
    bundled: Vec<SkillSource>,
    plugins: Vec<SkillSource>,
    provider: Option<Arc<dyn PluginRootProvider>>,
    /// Roots the provider returned on the last pass.
    provider_roots: RwLock<Vec<PathBuf>>,
    manifest_names: Vec<String>,
}

impl FsSkillDiscoverer {
    pub fn new(bundled: Vec<SkillSource>, plugins: Vec<SkillSource>) -> Self {
        Self {
            bundled,
            plugins,
            provider: None,
            provider_roots: RwLock::new(Vec::new()),
            manifest_names: SkillsConfig::default().manifest_names,
        }
    }

    /// Roots and manifest names from config.
    pub fn from_config(config: &SkillsConfig) -> Self {
        let bundled = config
            .bundled_roots()
            .into_iter()
            .map(SkillSource::bundled)
            .collect();
        let plugins = config
            .plugin_roots()
            .into_iter()
            .map(|p| SkillSource::plugin(p, None))
            .collect();
        Self::new(bundled, plugins).with_manifest_names(config.manifest_names.clone())
    }

    /// Plugin roots from `provider` are scanned before the configured ones.
    pub fn with_plugin_provider(mut self, provider: Arc<dyn PluginRootProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_manifest_names(mut self, names: Vec<String>) -> Self {
        if !names.is_empty() {
            self.manifest_names = names;
        }
        self
    }
}

#[async_trait]
impl SkillDiscoverer for FsSkillDiscoverer {
    async fn discover(&self) -> DiscoveryReport {
        let mut plugins = Vec::new();
        let mut provider_warning = None;
        if let Some(provider) = &self.provider {
            match provider.plugin_roots().await {
                Ok(roots) => {
                    *self.provider_roots.write().unwrap_or_else(|e| e.into_inner()) =
                        roots.iter().map(|r| r.path.clone()).collect();
                    plugins.extend(roots);
                },
                Err(e) => {
                    tracing::warn!(%e, "plugin root provider failed");
                    provider_warning = Some(DiscoveryWarning {
                        path: PathBuf::new(),
                        detail: format!("plugin roots unavailable: {e}"),
                    });
                },
            }
        }
        plugins.extend(self.plugins.iter().cloned());

        let mut report = discover(&self.bundled, &plugins, &self.manifest_names).await;
        report.warnings.extend(provider_warning);
        report
    }

    fn watch_paths(&self) -> Vec<PathBuf> {
        let provided = self
            .provider_roots
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let mut paths: Vec<PathBuf> = Vec::new();
        for path in self
            .bundled
            .iter()
            .map(|r| r.path.clone())
            .chain(provided)
            .chain(self.plugins.iter().map(|r| r.path.clone()))
        {
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
        paths
    }
}

/// Walk `roots` then `plugin_roots`, one level deep, and return every package
/// directory holding one of `manifest_names`.
///
/// Package paths are canonicalised; a path already seen (duplicate root,
/// symlink alias, or a link back to a root) is skipped.
pub async fn discover(
    roots: &[SkillSource],
    plugin_roots: &[SkillSource],
    manifest_names: &[String],
) -> DiscoveryReport {
    #[cfg(feature = "metrics")]
    let start = std::time::Instant::now();

    let mut walk = Walk {
        manifest_names,
        scanned_roots: HashSet::new(),
        seen_packages: HashSet::new(),
        report: DiscoveryReport::default(),
    };

    for root in roots.iter().chain(plugin_roots) {
        walk.scan_root(root).await;
    }

    #[cfg(feature = "metrics")]
    {
        counter!(skills_metrics::DISCOVERY_OPERATIONS_TOTAL).increment(1);
        counter!(skills_metrics::DISCOVERY_WARNINGS_TOTAL)
            .increment(walk.report.warnings.len() as u64);
        histogram!(skills_metrics::DISCOVERY_DURATION_SECONDS)
            .record(start.elapsed().as_secs_f64());
    }

    tracing::debug!(
        packages = walk.report.sources.len(),
        warnings = walk.report.warnings.len(),
        "skill discovery finished"
    );
    walk.report
}

struct Walk<'a> {
    manifest_names: &'a [String],
    scanned_roots: HashSet<PathBuf>,
    seen_packages: HashSet<PathBuf>,
    report: DiscoveryReport,
}

impl Walk<'_> {
    async fn scan_root(&mut self, root: &SkillSource) {
        let canonical_root = match tokio::fs::canonicalize(&root.path).await {
            Ok(p) => p,
            Err(e) => {
                self.warn(&root.path, format!("skill root unavailable: {e}"));
                return;
            },
        };
        if !self.scanned_roots.insert(canonical_root.clone()) {
            tracing::debug!(root = %root.path.display(), "skill root listed twice, skipping");
            return;
        }

        let mut entries = match tokio::fs::read_dir(&canonical_root).await {
            Ok(e) => e,
            Err(e) => {
                self.warn(&root.path, format!("failed to list skill root: {e}"));
                return;
            },
        };

        let mut children = Vec::new();
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => children.push(entry.path()),
                Ok(None) => break,
                Err(e) => {
                    self.warn(&root.path, format!("failed to read skill root entry: {e}"));
                    break;
                },
            }
        }
        children.sort();

        for child in children {
            self.visit_package(root, &child).await;
        }
    }

    async fn visit_package(&mut self, root: &SkillSource, dir: &Path) {
        // `metadata` follows symlinks; dangling links fail here and are skipped.
        match tokio::fs::metadata(dir).await {
            Ok(meta) if meta.is_dir() => {},
            _ => return,
        }
        let Ok(canonical) = tokio::fs::canonicalize(dir).await else {
            return;
        };
        if self.scanned_roots.contains(&canonical) || self.seen_packages.contains(&canonical) {
            tracing::debug!(dir = %dir.display(), "skipping already visited skill directory");
            return;
        }

        let Some(manifest) = self.find_manifest(&canonical).await else {
            return;
        };
        self.seen_packages.insert(canonical.clone());
        self.report.sources.push(SkillSource {
            root_kind: root.root_kind,
            path: canonical,
            plugin_id: root.plugin_id.clone(),
            manifest_file: Some(manifest),
        });
    }

    async fn find_manifest(&self, dir: &Path) -> Option<String> {
        for name in self.manifest_names {
            if let Ok(meta) = tokio::fs::metadata(dir.join(name)).await
                && meta.is_file()
            {
                return Some(name.clone());
            }
        }
        None
    }

    fn warn(&mut self, path: &Path, detail: String) {
        tracing::warn!(path = %path.display(), %detail, "skill discovery warning");
        self.report.warnings.push(DiscoveryWarning {
            path: path.to_path_buf(),
            detail,
        });
    }
}
