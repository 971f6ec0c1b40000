//! Prompt rendering for the active skill set and the catalog index.
//!
//! Each skill renders as
//!
//! ```text
//! <skill id="{id}">
//! # {title}
//!
//! {description}
//!
//! {body}
//! </skill>
//! ```
//!
//! and skills are joined with a blank line. Line endings are normalised to
//! `\n` and trailing whitespace is stripped from every line before hashing, so
//! the same skills produce the same hash on every platform.

use sha2::{Digest, Sha256};

#[cfg(feature = "metrics")]
use {
    quiver_metrics::{counter, histogram, skills as skills_metrics},
    std::time::Instant,
};

use crate::{
    catalog::SkillCatalog,
    types::{ActiveSkillSet, PromptFragment, SkillDefinition},
};

/// SHA-256 of the empty string, the hash of an empty fragment.
pub const EMPTY_CONTENT_HASH: &str =
    "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

const SKILL_SEPARATOR: &str = "\n\n";

/// Render the active set, in order, and hash the result.
pub fn compose(active: &ActiveSkillSet<'_>) -> PromptFragment {
    #[cfg(feature = "metrics")]
    let start = Instant::now();

    let text = active
        .iter()
        .map(render_skill)
        .collect::<Vec<_>>()
        .join(SKILL_SEPARATOR);
    let content_hash = content_hash(&text);

    #[cfg(feature = "metrics")]
    {
        counter!(skills_metrics::PROMPT_COMPOSITION_TOTAL).increment(1);
        histogram!(skills_metrics::PROMPT_COMPOSITION_DURATION_SECONDS)
            .record(start.elapsed().as_secs_f64());
    }

    tracing::debug!(skills = active.len(), hash = %content_hash, "composed skills prompt");

    PromptFragment { text, content_hash }
}

/// Render one skill block. An empty body drops its paragraph.
pub fn render_skill(skill: &SkillDefinition) -> String {
    let mut block = format!(
        "<skill id=\"{}\">\n# {}\n\n{}\n",
        skill.id,
        normalize(skill.title.trim()),
        normalize(skill.description.trim()),
    );
    let body = normalize(skill.body.trim());
    if !body.is_empty() {
        block.push('\n');
        block.push_str(&body);
        block.push('\n');
    }
    block.push_str("</skill>");
    block
}

/// Lowercase hex SHA-256 of `text`.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Render an `<available_skills>` listing of the whole catalog.
///
/// Returns an empty string for an empty catalog so callers can skip the
/// section entirely.
pub fn render_skill_index(catalog: &SkillCatalog) -> String {
    if catalog.is_empty() {
        return String::new();
    }

    let mut out = String::from("## Available Skills\n\n<available_skills>\n");
    for skill in catalog.skills() {
        out.push_str(&format!("- `{}`", skill.id));
        if let Some(slash) = &skill.slash_name {
            out.push_str(&format!(" (/{slash})"));
        }
        out.push_str(&format!(
            ": {}. {}\n",
            one_line(&skill.title),
            one_line(&skill.description)
        ));
    }
    out.push_str("</available_skills>\n\n");
    out
}

fn normalize(text: &str) -> String {
    text.replace("\r\n", "\n")
        .replace('\r', "\n")
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n")
}

fn one_line(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches('.')
        .to_string()
}
