use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::rules::EligibilityRules;

// ── Install records ──────────────────────────────────────────────────────────

/// Persisted install bookkeeping for discovered packages.
///
/// Advisory only: a skill in the catalog is usable whatever its record says.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallManifest {
    pub version: u32,
    #[serde(default)]
    pub records: Vec<InstallRecord>,
}

impl Default for InstallManifest {
    fn default() -> Self {
        Self {
            version: 1,
            records: Vec::new(),
        }
    }
}

impl InstallManifest {
    pub fn find(&self, skill_id: &str) -> Option<&InstallRecord> {
        self.records.iter().find(|r| r.skill_id == skill_id)
    }

    /// Insert or replace the record for `record.skill_id`.
    pub fn upsert(&mut self, record: InstallRecord) {
        match self
            .records
            .iter_mut()
            .find(|r| r.skill_id == record.skill_id)
        {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    /// Returns `true` if a record was removed.
    pub fn remove(&mut self, skill_id: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.skill_id != skill_id);
        self.records.len() != before
    }

    pub fn count(&self, state: InstallState) -> usize {
        self.records.iter().filter(|r| r.state == state).count()
    }
}

/// Install state of one package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallState {
    Installed,
    Pending,
    Failed,
}

impl std::fmt::Display for InstallState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Installed => write!(f, "installed"),
            Self::Pending => write!(f, "pending"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallRecord {
    pub skill_id: String,
    pub state: InstallState,
    /// Where the package came from (plugin id, repo, ...), free-form.
    #[serde(default)]
    pub source: Option<String>,
    pub updated_at_ms: u64,
    #[serde(default)]
    pub detail: Option<String>,
}

// ── Sources ──────────────────────────────────────────────────────────────────

/// Which kind of root a skill package was found under.
///
/// Plugin roots are scanned after bundled roots, so a plugin skill shadows a
/// bundled skill with the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RootKind {
    Bundled,
    Plugin,
}

impl RootKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bundled => "bundled",
            Self::Plugin => "plugin",
        }
    }
}

/// A filesystem location: either a root to scan or a discovered package.
///
/// Identity is the path; discovery canonicalises package paths before
/// handing them out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkillSource {
    pub root_kind: RootKind,
    pub path: PathBuf,
    #[serde(default)]
    pub plugin_id: Option<String>,
    /// Manifest filename found inside the package (unset for roots).
    #[serde(default)]
    pub manifest_file: Option<String>,
}

impl SkillSource {
    pub fn bundled(path: impl Into<PathBuf>) -> Self {
        Self {
            root_kind: RootKind::Bundled,
            path: path.into(),
            plugin_id: None,
            manifest_file: None,
        }
    }

    pub fn plugin(path: impl Into<PathBuf>, plugin_id: Option<String>) -> Self {
        Self {
            root_kind: RootKind::Plugin,
            path: path.into(),
            plugin_id,
            manifest_file: None,
        }
    }

    pub fn identity(&self) -> &Path {
        &self.path
    }

    /// Path of the manifest file, defaulting to `SKILL.md`.
    pub fn manifest_path(&self) -> PathBuf {
        self.path
            .join(self.manifest_file.as_deref().unwrap_or("SKILL.md"))
    }

    /// Directory name of the package, used when the manifest declares no name.
    pub fn dir_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }
}

// ── Skills ───────────────────────────────────────────────────────────────────

/// A validated skill.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkillDefinition {
    /// Canonical slug, unique within a catalog.
    pub id: String,
    pub title: String,
    pub description: String,
    /// Fallback phrases for slash invocation, in declaration order.
    pub trigger_phrases: Vec<String>,
    /// Lowercase, without the leading `/`.
    pub slash_name: Option<String>,
    pub eligibility: EligibilityRules,
    pub body: String,
    pub source: SkillSource,
    pub license: Option<String>,
    pub allowed_tools: Vec<String>,
    /// From the optional `_meta.json` sibling.
    pub version: Option<String>,
    pub owner: Option<String>,
}

impl SkillDefinition {
    pub fn source_path(&self) -> &Path {
        &self.source.path
    }
}

/// Why a package was excluded from the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParseErrorKind {
    MalformedManifest,
    MissingField,
    DuplicateId,
}

impl ParseErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MalformedManifest => "malformed_manifest",
            Self::MissingField => "missing_field",
            Self::DuplicateId => "duplicate_id",
        }
    }
}

impl std::fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{reason} at {}: {detail}", .path.display())]
pub struct ParseError {
    pub path: PathBuf,
    pub reason: ParseErrorKind,
    pub detail: String,
}

impl ParseError {
    pub fn new(path: impl Into<PathBuf>, reason: ParseErrorKind, detail: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason,
            detail: detail.into(),
        }
    }

    pub fn malformed(path: impl Into<PathBuf>, detail: impl Into<String>) -> Self {
        Self::new(path, ParseErrorKind::MalformedManifest, detail)
    }

    pub fn missing_field(path: impl Into<PathBuf>, field: &str) -> Self {
        Self::new(
            path,
            ParseErrorKind::MissingField,
            format!("missing required field `{field}`"),
        )
    }
}

/// Result of parsing one package: never a panic, never an early return.
pub type ParseOutcome = Result<SkillDefinition, ParseError>;

/// A root or plugin contribution that could not be scanned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryWarning {
    pub path: PathBuf,
    pub detail: String,
}

// ── Turns ────────────────────────────────────────────────────────────────────

/// Per-turn input supplied by the host. The engine never mutates it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnContext {
    #[serde(default)]
    pub workspace_signals: BTreeMap<String, String>,
    #[serde(default)]
    pub explicit_user_text: String,
    #[serde(default)]
    pub previously_active_skill_ids: BTreeSet<String>,
}

impl TurnContext {
    pub fn new(explicit_user_text: impl Into<String>) -> Self {
        Self {
            explicit_user_text: explicit_user_text.into(),
            ..Self::default()
        }
    }

    pub fn with_signal(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.workspace_signals.insert(key.into(), value.into());
        self
    }

    pub fn with_previously_active(mut self, skill_id: impl Into<String>) -> Self {
        self.previously_active_skill_ids.insert(skill_id.into());
        self
    }

    pub fn signal(&self, key: &str) -> Option<&str> {
        self.workspace_signals.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// The skill's `when` rule matched.
    MatchedRule,
    /// The skill has a `when` rule and it did not match.
    NoRuleMatched,
    /// The skill's `unless` rule matched.
    ExplicitlyExcluded,
    /// The skill declares no `when` rule and is available everywhere.
    Unscoped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityDecision {
    pub skill_id: String,
    pub eligible: bool,
    pub reason: DecisionReason,
}

/// How a slash command resolved against the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "ids")]
pub enum Resolution {
    NoMatch,
    SingleMatch(String),
    /// Candidate ids in catalog order. The caller disambiguates.
    Ambiguous(Vec<String>),
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoMatch => "no_match",
            Self::SingleMatch(_) => "single_match",
            Self::Ambiguous(_) => "ambiguous",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invocation {
    pub raw: String,
    /// Text after the command token, trimmed. Empty when there is none.
    pub arguments: String,
    pub resolved: Resolution,
}

impl Invocation {
    pub fn no_match(raw: impl Into<String>) -> Self {
        Self {
            raw: raw.into(),
            arguments: String::new(),
            resolved: Resolution::NoMatch,
        }
    }

    pub fn single_match_id(&self) -> Option<&str> {
        match &self.resolved {
            Resolution::SingleMatch(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self.resolved, Resolution::Ambiguous(_))
    }
}

/// Skills to inject this turn, in injection order, unique by id.
///
/// Borrows from the catalog it was selected from and lives for one turn.
#[derive(Debug, Clone, Default)]
pub struct ActiveSkillSet<'a> {
    skills: Vec<&'a SkillDefinition>,
}

impl<'a> ActiveSkillSet<'a> {
    pub fn new() -> Self {
        Self { skills: Vec::new() }
    }

    /// Build from an ordered list, dropping repeated ids (first one wins).
    pub fn from_skills(skills: impl IntoIterator<Item = &'a SkillDefinition>) -> Self {
        let mut set = Self::new();
        for skill in skills {
            set.push(skill);
        }
        set
    }

    /// Append unless a skill with the same id is already present.
    pub fn push(&mut self, skill: &'a SkillDefinition) -> bool {
        if self.contains(&skill.id) {
            return false;
        }
        self.skills.push(skill);
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.skills.iter().any(|s| s.id == id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.skills.iter().map(|s| s.id.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a SkillDefinition> + '_ {
        self.skills.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

/// Rendered prompt block plus its cache key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptFragment {
    pub text: String,
    /// Lowercase hex SHA-256 of `text`.
    pub content_hash: String,
}

impl PromptFragment {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}
