//! Configuration loading, env substitution, and data-directory resolution.
//!
//! Config files: `quiver.toml`, `quiver.yaml`, `quiver.yml`, or `quiver.json`.
//! Searched in `./` then the user config directory.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-fallback}` substitution in the raw file.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{
        clear_data_dir, config_dir, data_dir, discover_and_load, expand_home, load_config,
        set_data_dir,
    },
    schema::{QuiverConfig, SkillsConfig},
};
