//! Filesystem watcher for skill roots.
//!
//! Watches skill roots for manifest create/modify/delete events and sends a
//! notification through a channel. [`spawn_auto_refresh`] wires that channel
//! to [`SkillsManager::refresh`].

use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    notify_debouncer_full::{
        DebounceEventResult, Debouncer, RecommendedCache, new_debouncer,
        notify::{EventKind, RecommendedWatcher, RecursiveMode},
    },
    tokio::{sync::mpsc, task::JoinHandle},
    tracing::{debug, info, warn},
};

use crate::{Error, Result, manager::SkillsManager, parse::META_FILE_NAME};

const DEBOUNCE: Duration = Duration::from_millis(500);

/// Events emitted by the skill watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkillWatchEvent {
    /// A manifest or its metadata was created, modified, or deleted.
    Changed,
}

/// Watches skill roots for manifest changes with debouncing.
pub struct SkillWatcher {
    _debouncer: Debouncer<RecommendedWatcher, RecommendedCache>,
}

impl SkillWatcher {
    /// Start watching `dirs`. Missing directories are skipped.
    ///
    /// Events stop when the returned watcher is dropped.
    pub fn start(
        dirs: Vec<PathBuf>,
        manifest_names: Vec<String>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<SkillWatchEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();

        let debouncer = new_debouncer(DEBOUNCE, None, move |result: DebounceEventResult| {
            match result {
                Ok(events) => {
                    let changed = events.iter().any(|event| {
                        matches!(
                            event.kind,
                            EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
                        ) && event.paths.iter().any(|path| {
                            let relevant = path
                                .file_name()
                                .and_then(|n| n.to_str())
                                .is_some_and(|name| is_watched_file(name, &manifest_names));
                            if relevant {
                                debug!(path = %path.display(), "skill watcher event");
                            }
                            relevant
                        })
                    });
                    if changed {
                        let _ = tx.send(SkillWatchEvent::Changed);
                    }
                },
                Err(errors) => {
                    for e in errors {
                        warn!(error = %e, "skill watcher error");
                    }
                },
            }
        })
        .map_err(|e| Error::external("failed to create skill watcher", e))?;

        let mut watcher = Self {
            _debouncer: debouncer,
        };

        for dir in &dirs {
            if dir.exists() {
                watcher
                    ._debouncer
                    .watch(dir, RecursiveMode::Recursive)
                    .map_err(|e| Error::external(format!("failed to watch {}", dir.display()), e))?;
                info!(dir = %dir.display(), "skill watcher: watching directory");
            }
        }

        Ok((watcher, rx))
    }
}

fn is_watched_file(name: &str, manifest_names: &[String]) -> bool {
    name == META_FILE_NAME || manifest_names.iter().any(|m| m == name)
}

/// Rebuild the manager's catalog now, then again after every change under
/// its roots.
///
/// The initial rebuild lets plugin-provided roots be watched too. The task
/// ends when the returned watcher is dropped.
pub async fn spawn_auto_refresh(
    manager: Arc<SkillsManager>,
) -> Result<(SkillWatcher, JoinHandle<()>)> {
    manager.refresh().await;
    let (watcher, mut rx) =
        SkillWatcher::start(manager.watch_paths(), manager.config().manifest_names.clone())?;

    let handle = tokio::spawn(async move {
        while rx.recv().await.is_some() {
            let catalog = manager.refresh().await;
            info!(skills = catalog.len(), "skills reloaded after change");
        }
    });

    Ok((watcher, handle))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watches_manifests_and_meta_only() {
        let names = vec!["SKILL.md".to_string(), "skill.md".to_string()];
        assert!(is_watched_file("SKILL.md", &names));
        assert!(is_watched_file("skill.md", &names));
        assert!(is_watched_file("_meta.json", &names));
        assert!(!is_watched_file("README.md", &names));
    }

    #[tokio::test]
    async fn auto_refresh_builds_catalog_and_watches_plugin_roots() {
        use crate::{discover::StaticPluginRoots, types::SkillSource};

        let tmp = tempfile::tempdir().unwrap();
        let bundled = tmp.path().join("bundled");
        let plugin = tmp.path().join("plugin");
        std::fs::create_dir_all(bundled.join("one")).unwrap();
        std::fs::write(
            bundled.join("one/SKILL.md"),
            "---\ntitle: One\ndescription: d\n---\n",
        )
        .unwrap();
        std::fs::create_dir_all(&plugin).unwrap();

        let config = quiver_config::SkillsConfig {
            bundled_paths: vec![bundled.display().to_string()],
            install_manifest: Some(tmp.path().join("install.json").display().to_string()),
            ..Default::default()
        };
        let provider = StaticPluginRoots(vec![SkillSource::plugin(&plugin, None)]);
        let manager = Arc::new(SkillsManager::from_config(config, Some(Arc::new(provider))));

        let (_watcher, handle) = spawn_auto_refresh(Arc::clone(&manager)).await.unwrap();
        assert!(manager.catalog().contains("one"));
        assert_eq!(manager.watch_paths(), vec![bundled, plugin]);
        handle.abort();
    }

    #[tokio::test]
    async fn start_skips_missing_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let result = SkillWatcher::start(
            vec![tmp.path().to_path_buf(), tmp.path().join("missing")],
            vec!["SKILL.md".into()],
        );
        assert!(result.is_ok());
    }
}
