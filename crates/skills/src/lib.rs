//! Skill resolution and activation engine.
//!
//! Skills are directories containing a `SKILL.md` file with YAML front matter
//! and markdown instructions. The engine discovers them across bundled and
//! plugin roots, parses them into an immutable catalog, and for every turn
//! decides which ones to inject into the agent's prompt.
//!
//! Per turn: [`invocation::match_invocation`] and [`eligibility::evaluate_all`]
//! feed [`select::select`], whose output [`prompt_gen::compose`] renders and
//! hashes. [`manager::SkillsManager`] owns the catalog and runs the pipeline.

pub mod catalog;
pub mod discover;
pub mod eligibility;
pub mod error;
pub mod invocation;
pub mod manager;
pub mod manifest;
pub mod parse;
pub mod prompt_gen;
pub mod rules;
pub mod select;
pub mod types;
#[cfg(feature = "file-watcher")]
pub mod watcher;

pub use {
    catalog::SkillCatalog,
    discover::{DiscoveryReport, FsSkillDiscoverer, PluginRootProvider, SkillDiscoverer},
    error::{Error, Result},
    manager::{SkillsManager, SkillsStatus, TurnPlan, ValidationReport},
    types::{
        ActiveSkillSet, EligibilityDecision, Invocation, PromptFragment, Resolution,
        SkillDefinition, SkillSource, TurnContext,
    },
};
