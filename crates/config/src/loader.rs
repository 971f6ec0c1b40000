use std::{
    path::{Path, PathBuf},
    sync::RwLock,
};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, schema::QuiverConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["quiver.toml", "quiver.yaml", "quiver.yml", "quiver.json"];

static DATA_DIR_OVERRIDE: RwLock<Option<PathBuf>> = RwLock::new(None);

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<QuiverConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./quiver.{toml,yaml,yml,json}` (project-local)
/// 2. `<config_dir>/quiver.{toml,yaml,yml,json}` (user-global)
///
/// Returns `QuiverConfig::default()` if no config file is found or it fails to load.
pub fn discover_and_load() -> QuiverConfig {
    let Some(path) = find_config_file() else {
        debug!("no config file found, using defaults");
        return QuiverConfig::default();
    };

    debug!(path = %path.display(), "loading config");
    match load_config(&path) {
        Ok(cfg) => cfg,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            QuiverConfig::default()
        },
    }
}

fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists());
    if local.is_some() {
        return local;
    }

    let dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (e.g. `~/.config/quiver/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "quiver").map(|d| d.config_dir().to_path_buf())
}

/// Override the data directory (tests, embedding hosts).
pub fn set_data_dir(path: PathBuf) {
    *DATA_DIR_OVERRIDE.write().unwrap_or_else(|e| e.into_inner()) = Some(path);
}

/// Drop a previous [`set_data_dir`] override.
pub fn clear_data_dir() {
    *DATA_DIR_OVERRIDE.write().unwrap_or_else(|e| e.into_inner()) = None;
}

/// Data directory holding bundled skills and install records: `~/.quiver` by default.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = DATA_DIR_OVERRIDE
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
    {
        return dir;
    }
    match directories::BaseDirs::new() {
        Some(base) => base.home_dir().join(".quiver"),
        None => PathBuf::from(".quiver"),
    }
}

/// Expand a leading `~/` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(base) = directories::BaseDirs::new()
    {
        return base.home_dir().join(rest);
    }
    PathBuf::from(path)
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<QuiverConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_toml_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("quiver.toml");
        std::fs::write(
            &path,
            "[skills]\nbundled_paths = [\"/srv/skills\"]\nenabled = true\n",
        )
        .unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.skills.bundled_roots(), vec![PathBuf::from("/srv/skills")]);
    }

    #[test]
    fn loads_yaml_config() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("quiver.yaml");
        std::fs::write(&path, "skills:\n  plugin_paths: [/plugins/x]\n").unwrap();

        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.skills.plugin_roots(), vec![PathBuf::from("/plugins/x")]);
    }

    #[test]
    fn rejects_unknown_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("quiver.ini");
        std::fs::write(&path, "").unwrap();
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn data_dir_override_drives_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        set_data_dir(tmp.path().to_path_buf());

        let skills = crate::SkillsConfig::default();
        assert_eq!(data_dir(), tmp.path());
        assert_eq!(skills.bundled_roots(), vec![tmp.path().join("skills")]);
        assert_eq!(
            skills.install_manifest_path(),
            tmp.path().join("skills-manifest.json")
        );

        clear_data_dir();
        assert_ne!(data_dir(), tmp.path());
    }

    #[test]
    fn expand_home_leaves_absolute_paths() {
        assert_eq!(expand_home("/abs/path"), PathBuf::from("/abs/path"));
    }
}
