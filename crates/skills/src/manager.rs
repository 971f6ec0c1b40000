//! Pipeline coordination: catalog lifecycle, per-turn planning, install
//! bookkeeping and diagnostics.

use std::{
    path::PathBuf,
    sync::{Arc, RwLock},
    time::SystemTime,
};

#[cfg(feature = "metrics")]
use quiver_metrics::{counter, labels, skills as skills_metrics};

use {
    quiver_config::SkillsConfig,
    serde::{Deserialize, Serialize},
    tokio::sync::Mutex,
};

use crate::{
    Error, Result,
    catalog::SkillCatalog,
    discover::{FsSkillDiscoverer, PluginRootProvider, SkillDiscoverer},
    eligibility::evaluate_all,
    invocation::match_invocation,
    manifest::ManifestStore,
    prompt_gen::compose,
    select::select,
    types::{
        DiscoveryWarning, EligibilityDecision, InstallManifest, InstallRecord, InstallState,
        Invocation, ParseError, PromptFragment, RootKind, TurnContext,
    },
};

/// Everything computed for one turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnPlan {
    pub invocation: Invocation,
    /// One decision per catalog skill, in catalog order.
    pub decisions: Vec<EligibilityDecision>,
    /// Injected skill ids, in injection order.
    pub active_ids: Vec<String>,
    pub fragment: PromptFragment,
}

/// Counts for status displays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SkillsStatus {
    pub enabled: bool,
    /// Skills in the catalog.
    pub loaded: usize,
    /// Packages excluded by a malformed manifest or missing field.
    pub errored: usize,
    /// Packages replaced by a later package with the same id.
    pub shadowed: usize,
    pub warnings: usize,
    pub built_at_ms: u64,
    pub install: InstallCounts,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InstallCounts {
    pub installed: usize,
    pub pending: usize,
    pub failed: usize,
}

/// Mismatch between install records and the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallIssueKind {
    /// Recorded as installed but absent from the catalog.
    RecordedButMissing,
    /// Recorded as pending or failed but present and usable.
    NotInstalled,
    /// A plugin skill with no install record.
    Untracked,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallIssue {
    pub skill_id: String,
    pub kind: InstallIssueKind,
    pub detail: String,
}

/// Full diagnostics for the current catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ParseError>,
    pub warnings: Vec<DiscoveryWarning>,
    pub install_issues: Vec<InstallIssue>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && self.warnings.is_empty() && self.install_issues.is_empty()
    }
}

/// Owns the current catalog and runs turns against it.
///
/// Turns read an `Arc` snapshot and never block each other. Rebuilds are
/// serialised and swap the new catalog in as a whole.
pub struct SkillsManager {
    config: SkillsConfig,
    discoverer: Box<dyn SkillDiscoverer>,
    store: ManifestStore,
    catalog: RwLock<Arc<SkillCatalog>>,
    install: RwLock<InstallManifest>,
    rebuild: Mutex<()>,
}

impl SkillsManager {
    /// Create a manager with an empty catalog. Call [`refresh`](Self::refresh)
    /// before running turns.
    pub fn new(config: SkillsConfig, discoverer: Box<dyn SkillDiscoverer>) -> Self {
        let store = ManifestStore::from_config(&config);
        let install = load_install_records(&store).unwrap_or_default();
        Self {
            config,
            discoverer,
            store,
            catalog: RwLock::new(Arc::new(SkillCatalog::empty())),
            install: RwLock::new(install),
            rebuild: Mutex::new(()),
        }
    }

    /// Manager backed by [`FsSkillDiscoverer`] over the configured roots.
    pub fn from_config(
        config: SkillsConfig,
        plugins: Option<Arc<dyn PluginRootProvider>>,
    ) -> Self {
        let mut discoverer = FsSkillDiscoverer::from_config(&config);
        if let Some(provider) = plugins {
            discoverer = discoverer.with_plugin_provider(provider);
        }
        Self::new(config, Box::new(discoverer))
    }

    pub fn config(&self) -> &SkillsConfig {
        &self.config
    }

    /// Directories whose changes should trigger a refresh.
    pub fn watch_paths(&self) -> Vec<PathBuf> {
        self.discoverer.watch_paths()
    }

    /// Rediscover, reparse and swap in a new catalog.
    ///
    /// Concurrent calls queue; turns keep using the previous catalog until the
    /// swap.
    pub async fn refresh(&self) -> Arc<SkillCatalog> {
        let _guard = self.rebuild.lock().await;

        let catalog = if self.config.enabled {
            SkillCatalog::build(self.discoverer.discover().await).await
        } else {
            tracing::debug!("skills disabled, installing empty catalog");
            SkillCatalog::empty()
        };
        let catalog = Arc::new(catalog);

        if let Some(records) = load_install_records(&self.store) {
            *self.install.write().unwrap_or_else(|e| e.into_inner()) = records;
        }

        *self.catalog.write().unwrap_or_else(|e| e.into_inner()) = Arc::clone(&catalog);

        #[cfg(feature = "metrics")]
        counter!(skills_metrics::CATALOG_REBUILDS_TOTAL).increment(1);

        tracing::info!(
            skills = catalog.len(),
            errors = catalog.errors().len(),
            warnings = catalog.warnings().len(),
            "skill catalog rebuilt"
        );
        catalog
    }

    /// Snapshot of the current catalog.
    pub fn catalog(&self) -> Arc<SkillCatalog> {
        Arc::clone(&self.catalog.read().unwrap_or_else(|e| e.into_inner()))
    }

    pub fn status(&self) -> SkillsStatus {
        let catalog = self.catalog();
        let install = self.install.read().unwrap_or_else(|e| e.into_inner());
        let shadowed = catalog.shadowed().count();
        SkillsStatus {
            enabled: self.config.enabled,
            loaded: catalog.len(),
            errored: catalog.errors().len() - shadowed,
            shadowed,
            warnings: catalog.warnings().len(),
            built_at_ms: catalog.built_at_ms(),
            install: InstallCounts {
                installed: install.count(InstallState::Installed),
                pending: install.count(InstallState::Pending),
                failed: install.count(InstallState::Failed),
            },
        }
    }

    /// Parse errors, discovery warnings and install-record mismatches.
    pub fn validation_report(&self) -> ValidationReport {
        let catalog = self.catalog();
        let install = self.install.read().unwrap_or_else(|e| e.into_inner());
        ValidationReport {
            errors: catalog.errors().to_vec(),
            warnings: catalog.warnings().to_vec(),
            install_issues: install_issues(&catalog, &install),
        }
    }

    /// Prompt fragment for one turn.
    pub fn run_turn(&self, context: &TurnContext) -> PromptFragment {
        self.plan_turn(context).fragment
    }

    /// Full per-turn result, including the decisions behind the fragment.
    pub fn plan_turn(&self, context: &TurnContext) -> TurnPlan {
        plan_turn(&self.catalog(), context)
    }

    /// Record the install state of `skill_id` and persist it.
    ///
    /// Records are advisory; they never change what a turn can use.
    pub fn record_install(
        &self,
        skill_id: &str,
        state: InstallState,
        detail: Option<String>,
    ) -> Result<()> {
        if skill_id.trim().is_empty() {
            return Err(Error::message("skill id must not be empty"));
        }
        let source = self.catalog().get(skill_id).map(|skill| {
            skill
                .source
                .plugin_id
                .clone()
                .unwrap_or_else(|| skill.source.root_kind.as_str().to_string())
        });

        // The lock is held across the save so concurrent writers cannot
        // interleave; the shared manifest only changes once the file does.
        let mut install = self.install.write().unwrap_or_else(|e| e.into_inner());
        let mut updated = install.clone();
        updated.upsert(InstallRecord {
            skill_id: skill_id.to_string(),
            state,
            source,
            updated_at_ms: now_ms(),
            detail,
        });
        self.store.save(&updated)?;
        *install = updated;
        tracing::info!(skill = %skill_id, %state, "install record updated");
        Ok(())
    }

    /// Drop the install record for `skill_id`. Returns `true` if one existed.
    ///
    /// On a failed save the record stays in place.
    pub fn forget_install(&self, skill_id: &str) -> Result<bool> {
        let mut install = self.install.write().unwrap_or_else(|e| e.into_inner());
        let mut updated = install.clone();
        if !updated.remove(skill_id) {
            return Ok(false);
        }
        self.store.save(&updated)?;
        *install = updated;
        tracing::info!(skill = %skill_id, "install record removed");
        Ok(true)
    }
}

/// Matching, eligibility, selection and composition for one turn.
///
/// Pure over `(catalog, context)`: safe to run concurrently.
pub fn plan_turn(catalog: &SkillCatalog, context: &TurnContext) -> TurnPlan {
    let invocation = match_invocation(&context.explicit_user_text, catalog);
    let decisions = evaluate_all(catalog, context);
    let active = select(&invocation, &decisions, catalog);
    let fragment = compose(&active);
    let active_ids = active.ids();

    #[cfg(feature = "metrics")]
    {
        counter!(skills_metrics::TURNS_TOTAL, labels::RESOLUTION => invocation.resolved.as_str())
            .increment(1);
        if invocation.is_ambiguous() {
            counter!(skills_metrics::AMBIGUOUS_INVOCATIONS_TOTAL).increment(1);
        }
    }

    tracing::debug!(
        resolution = invocation.resolved.as_str(),
        active = ?active_ids,
        hash = %fragment.content_hash,
        "planned skills for turn"
    );

    TurnPlan {
        invocation,
        decisions,
        active_ids,
        fragment,
    }
}

fn install_issues(catalog: &SkillCatalog, install: &InstallManifest) -> Vec<InstallIssue> {
    let mut issues = Vec::new();

    for record in &install.records {
        let present = catalog.contains(&record.skill_id);
        let kind = match (record.state, present) {
            (InstallState::Installed, false) => InstallIssueKind::RecordedButMissing,
            (InstallState::Pending | InstallState::Failed, true) => InstallIssueKind::NotInstalled,
            _ => continue,
        };
        let detail = match kind {
            InstallIssueKind::RecordedButMissing => {
                "recorded as installed but not found in any skill root".to_string()
            },
            _ => format!("recorded as {} but present and usable", record.state),
        };
        issues.push(InstallIssue {
            skill_id: record.skill_id.clone(),
            kind,
            detail,
        });
    }

    for skill in catalog.skills() {
        if skill.source.root_kind == RootKind::Plugin && install.find(&skill.id).is_none() {
            issues.push(InstallIssue {
                skill_id: skill.id.clone(),
                kind: InstallIssueKind::Untracked,
                detail: format!(
                    "plugin skill at {} has no install record",
                    skill.source_path().display()
                ),
            });
        }
    }

    issues
}

/// Records from `store`, or `None` (logged) if they can't be read.
fn load_install_records(store: &ManifestStore) -> Option<InstallManifest> {
    match store.load() {
        Ok(records) => Some(records),
        Err(e) => {
            tracing::warn!(path = %store.path().display(), error = %e, "failed to load skill install records");
            None
        },
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
