//! SKILL.md parsing.
//!
//! Front matter is decoded into a fixed schema and every failure comes back as
//! a [`ParseError`] value. Nothing in here panics or bails past the boundary.

use std::path::Path;

#[cfg(feature = "metrics")]
use quiver_metrics::{counter, labels, skills as skills_metrics};

use serde::{Deserialize, Serialize};

use crate::{
    rules::{EligibilityRules, MAX_RULE_DEPTH},
    types::{ParseError, ParseOutcome, SkillDefinition, SkillSource},
};

/// Fields a manifest must declare with a non-blank value.
pub const REQUIRED_FIELDS: &[&str] = &["title", "description"];

#[derive(Deserialize)]
#[serde(rename_all = "kebab-case")]
struct Frontmatter {
    #[serde(default)]
    name: Option<String>,
    title: String,
    description: String,
    #[serde(default, alias = "slash_name", alias = "slash")]
    slash_name: Option<String>,
    #[serde(default, alias = "trigger-phrases", alias = "trigger_phrases")]
    triggers: Vec<String>,
    #[serde(default)]
    eligibility: EligibilityRules,
    #[serde(default)]
    license: Option<String>,
    #[serde(default, alias = "allowed_tools")]
    allowed_tools: Vec<String>,
}

/// Lowercase, hyphen-separated slug. Runs of anything that isn't
/// alphanumeric collapse into a single hyphen; edges are trimmed.
pub fn slugify(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut gap = false;
    for c in raw.chars() {
        if c.is_alphanumeric() {
            if gap && !slug.is_empty() {
                slug.push('-');
            }
            gap = false;
            slug.extend(c.to_lowercase());
        } else {
            gap = true;
        }
    }
    slug
}

/// Read and parse the package at `source`.
///
/// Read failures are reported as `MalformedManifest` for the manifest path.
pub async fn parse_source(source: &SkillSource) -> ParseOutcome {
    let manifest = source.manifest_path();
    let outcome = match tokio::fs::read_to_string(&manifest).await {
        Ok(content) => {
            let meta = read_meta_json(&source.path).await;
            parse_skill(&content, source).map(|mut skill| {
                if let Some(meta) = meta {
                    skill.version = meta.latest.and_then(|l| l.version);
                    skill.owner = meta.owner;
                }
                skill
            })
        },
        Err(e) => Err(ParseError::malformed(
            &manifest,
            format!("failed to read manifest: {e}"),
        )),
    };

    #[cfg(feature = "metrics")]
    {
        counter!(skills_metrics::PARSE_OPERATIONS_TOTAL).increment(1);
        if let Err(e) = &outcome {
            counter!(skills_metrics::PARSE_ERRORS_TOTAL, labels::ERROR_KIND => e.reason.as_str())
                .increment(1);
        }
    }

    outcome
}

/// Parse manifest text belonging to `source`. Pure given its inputs.
pub fn parse_skill(content: &str, source: &SkillSource) -> ParseOutcome {
    let manifest = source.manifest_path();
    let malformed = |detail: String| ParseError::malformed(&manifest, detail);

    let (frontmatter, body) = split_frontmatter(content).map_err(|d| malformed(d.into()))?;

    let yaml: serde_yaml::Value = serde_yaml::from_str(&frontmatter)
        .map_err(|e| malformed(format!("invalid front matter: {e}")))?;
    let mut value = match serde_json::to_value(yaml)
        .map_err(|e| malformed(format!("unsupported front matter value: {e}")))?
    {
        serde_json::Value::Null => serde_json::Value::Object(Default::default()),
        v @ serde_json::Value::Object(_) => v,
        _ => return Err(malformed("front matter must be a key/value mapping".into())),
    };

    for field in REQUIRED_FIELDS {
        let missing = match value.get(field) {
            None | Some(serde_json::Value::Null) => true,
            Some(serde_json::Value::String(s)) => s.trim().is_empty(),
            // Wrong type: the schema decode below reports it.
            Some(_) => false,
        };
        if missing {
            return Err(ParseError::missing_field(&manifest, field));
        }
    }

    // A key written without a value (`triggers:`) means the field is absent.
    if let serde_json::Value::Object(map) = &mut value {
        map.retain(|_, v| !v.is_null());
    }

    let fm: Frontmatter = serde_json::from_value(value)
        .map_err(|e| malformed(format!("invalid front matter: {e}")))?;

    let depth = fm.eligibility.depth();
    if depth > MAX_RULE_DEPTH {
        return Err(malformed(format!(
            "eligibility rules nest {depth} levels deep (limit {MAX_RULE_DEPTH})"
        )));
    }

    let id = match fm.name.as_deref() {
        Some(name) => slugify(name),
        None => source.dir_name().map(slugify).unwrap_or_default(),
    };
    if id.is_empty() {
        return Err(ParseError::missing_field(&manifest, "name"));
    }

    let slash_name = match fm.slash_name.as_deref().map(normalize_slash_name) {
        Some(Ok(name)) => Some(name),
        Some(Err(detail)) => return Err(malformed(detail)),
        None => None,
    };

    Ok(SkillDefinition {
        id,
        title: fm.title.trim().to_string(),
        description: fm.description.trim().to_string(),
        trigger_phrases: fm
            .triggers
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect(),
        slash_name,
        eligibility: fm.eligibility,
        body,
        source: source.clone(),
        license: fm.license,
        allowed_tools: fm.allowed_tools,
        version: None,
        owner: None,
    })
}

fn normalize_slash_name(raw: &str) -> Result<String, String> {
    let name = raw.trim().trim_start_matches('/').to_lowercase();
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(format!(
            "invalid slash-name '{raw}': must be a single non-empty token"
        ));
    }
    Ok(name)
}

/// Deterministic metadata block for `skill`: `name`, `title`, `description`.
///
/// Parsing the output yields the same `id`, `title` and `description`.
pub fn render_front_matter(skill: &SkillDefinition) -> String {
    #[derive(Serialize)]
    struct Rendered<'a> {
        name: &'a str,
        title: &'a str,
        description: &'a str,
    }

    let yaml = serde_yaml::to_string(&Rendered {
        name: &skill.id,
        title: &skill.title,
        description: &skill.description,
    })
    .unwrap_or_default();
    format!("---\n{yaml}---\n")
}

// ── _meta.json support ──────────────────────────────────────────────────────

pub const META_FILE_NAME: &str = "_meta.json";

/// Optional `_meta.json` sibling of the manifest.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkillMetaJson {
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub latest: Option<SkillMetaVersion>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SkillMetaVersion {
    #[serde(default)]
    pub version: Option<String>,
}

/// Read `_meta.json` from a package directory. Missing or invalid files give `None`.
pub async fn read_meta_json(skill_dir: &Path) -> Option<SkillMetaJson> {
    let content = tokio::fs::read_to_string(skill_dir.join(META_FILE_NAME))
        .await
        .ok()?;
    match serde_json::from_str(&content) {
        Ok(meta) => Some(meta),
        Err(e) => {
            tracing::debug!(?skill_dir, %e, "ignoring invalid _meta.json");
            None
        },
    }
}

/// Split manifest text at `---` fence lines into (front matter, body).
fn split_frontmatter(content: &str) -> Result<(String, String), &'static str> {
    let content = content.replace("\r\n", "\n");
    let trimmed = content.trim_start_matches('\u{feff}').trim_start();
    let (open, after_open) = trimmed.split_once('\n').unwrap_or((trimmed, ""));
    if open.trim_end() != "---" {
        return Err(if open.starts_with("---") {
            "opening --- must be on its own line"
        } else {
            "manifest must start with front matter delimited by ---"
        });
    }

    let mut offset = 0;
    for line in after_open.split_inclusive('\n') {
        if line.trim_end() == "---" {
            let frontmatter = after_open[..offset].to_string();
            let body = after_open[offset + line.len()..].trim().to_string();
            return Ok((frontmatter, body));
        }
        offset += line.len();
    }
    Err("missing closing --- for front matter")
}
