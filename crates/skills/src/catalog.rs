//! The immutable skill catalog.
//!
//! A catalog is built wholesale from one discovery pass and never patched.
//! Refreshing means building a new one and swapping it in.

use std::{collections::HashMap, time::SystemTime};

#[cfg(feature = "metrics")]
use quiver_metrics::{counter, gauge, labels, skills as skills_metrics};

use crate::{
    discover::DiscoveryReport,
    parse,
    types::{DiscoveryWarning, ParseError, ParseErrorKind, ParseOutcome, SkillDefinition},
};

#[derive(Debug, Clone)]
pub struct SkillCatalog {
    skills: Vec<SkillDefinition>,
    index: HashMap<String, usize>,
    errors: Vec<ParseError>,
    warnings: Vec<DiscoveryWarning>,
    built_at_ms: u64,
}

impl SkillCatalog {
    /// A catalog with no skills, used before the first build and when disabled.
    pub fn empty() -> Self {
        Self::from_outcomes(Vec::new(), Vec::new())
    }

    /// Assemble a catalog from parse outcomes in discovery order.
    ///
    /// When an id repeats, the later package replaces the earlier one at the
    /// earlier one's position, and a `DuplicateId` error for the shadowed
    /// package is recorded.
    pub fn from_outcomes(
        outcomes: impl IntoIterator<Item = ParseOutcome>,
        warnings: Vec<DiscoveryWarning>,
    ) -> Self {
        let mut skills: Vec<SkillDefinition> = Vec::new();
        let mut index = HashMap::new();
        let mut errors = Vec::new();

        for outcome in outcomes {
            let skill = match outcome {
                Ok(skill) => skill,
                Err(e) => {
                    tracing::warn!(path = %e.path.display(), reason = %e.reason, detail = %e.detail, "skipping skill package");
                    errors.push(e);
                    continue;
                },
            };

            match index.get(&skill.id).copied() {
                Some(pos) => {
                    let shadowed: &SkillDefinition = &skills[pos];
                    tracing::info!(
                        id = %skill.id,
                        shadowed = %shadowed.source_path().display(),
                        winner = %skill.source_path().display(),
                        "skill id shadowed by later source"
                    );
                    errors.push(ParseError::new(
                        shadowed.source.manifest_path(),
                        ParseErrorKind::DuplicateId,
                        format!(
                            "skill id '{}' is shadowed by {}",
                            skill.id,
                            skill.source_path().display()
                        ),
                    ));
                    skills[pos] = skill;
                },
                None => {
                    index.insert(skill.id.clone(), skills.len());
                    skills.push(skill);
                },
            }
        }

        let built_at_ms = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;

        #[cfg(feature = "metrics")]
        {
            gauge!(skills_metrics::TOTAL).set(skills.len() as f64);
            for e in errors.iter().filter(|e| e.reason == ParseErrorKind::DuplicateId) {
                counter!(skills_metrics::PARSE_ERRORS_TOTAL, labels::ERROR_KIND => e.reason.as_str())
                    .increment(1);
            }
        }

        Self {
            skills,
            index,
            errors,
            warnings,
            built_at_ms,
        }
    }

    /// Parse every discovered source, in order, and assemble the catalog.
    pub async fn build(report: DiscoveryReport) -> Self {
        let mut outcomes = Vec::with_capacity(report.sources.len());
        for source in &report.sources {
            outcomes.push(parse::parse_source(source).await);
        }
        Self::from_outcomes(outcomes, report.warnings)
    }

    /// Skills in catalog-discovery order.
    pub fn skills(&self) -> &[SkillDefinition] {
        &self.skills
    }

    pub fn get(&self, id: &str) -> Option<&SkillDefinition> {
        self.index.get(id).map(|&pos| &self.skills[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Parse errors, including shadowed duplicates, in the order they arose.
    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn warnings(&self) -> &[DiscoveryWarning] {
        &self.warnings
    }

    pub fn shadowed(&self) -> impl Iterator<Item = &ParseError> {
        self.errors
            .iter()
            .filter(|e| e.reason == ParseErrorKind::DuplicateId)
    }

    pub fn built_at_ms(&self) -> u64 {
        self.built_at_ms
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

impl Default for SkillCatalog {
    fn default() -> Self {
        Self::empty()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::types::{RootKind, SkillSource},
        std::path::Path,
    };

    fn skill(id: &str, source: SkillSource) -> SkillDefinition {
        let content = format!("---\nname: {id}\ntitle: {id}\ndescription: d\n---\nbody");
        parse::parse_skill(&content, &source).unwrap()
    }

    #[test]
    fn keeps_discovery_order_and_records_errors() {
        let outcomes = vec![
            Ok(skill("b", SkillSource::bundled("/r/b"))),
            Err(ParseError::missing_field("/r/broken/SKILL.md", "title")),
            Ok(skill("a", SkillSource::bundled("/r/a"))),
        ];
        let catalog = SkillCatalog::from_outcomes(outcomes, Vec::new());
        let ids: Vec<_> = catalog.skills().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(catalog.errors().len(), 1);
        assert_eq!(catalog.errors()[0].reason, ParseErrorKind::MissingField);
        assert!(catalog.built_at_ms() > 0);
    }

    #[test]
    fn later_source_shadows_earlier_in_place() {
        let outcomes = vec![
            Ok(skill("deploy", SkillSource::bundled("/bundled/deploy"))),
            Ok(skill("lint", SkillSource::bundled("/bundled/lint"))),
            Ok(skill("deploy", SkillSource::plugin("/plugin/deploy", None))),
        ];
        let catalog = SkillCatalog::from_outcomes(outcomes, Vec::new());

        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.skills()[0].id, "deploy");
        let winner = catalog.get("deploy").unwrap();
        assert_eq!(winner.source.root_kind, RootKind::Plugin);

        let shadowed: Vec<_> = catalog.shadowed().collect();
        assert_eq!(shadowed.len(), 1);
        assert_eq!(shadowed[0].path, Path::new("/bundled/deploy/SKILL.md"));
        assert!(shadowed[0].detail.contains("/plugin/deploy"));
    }

    #[test]
    fn empty_catalog_has_no_skills() {
        let catalog = SkillCatalog::empty();
        assert!(catalog.is_empty());
        assert!(catalog.get("anything").is_none());
        assert!(catalog.errors().is_empty());
    }

    #[tokio::test]
    async fn build_parses_discovered_sources() {
        let tmp = tempfile::tempdir().unwrap();
        let root = tmp.path().join("skills");
        std::fs::create_dir_all(root.join("good")).unwrap();
        std::fs::create_dir_all(root.join("bad")).unwrap();
        std::fs::write(
            root.join("good/SKILL.md"),
            "---\ntitle: Good\ndescription: works\n---\nbody",
        )
        .unwrap();
        std::fs::write(root.join("bad/SKILL.md"), "no front matter").unwrap();

        let report = crate::discover::discover(
            &[SkillSource::bundled(&root)],
            &[],
            &["SKILL.md".to_string()],
        )
        .await;
        let catalog = SkillCatalog::build(report).await;
        assert_eq!(catalog.len(), 1);
        assert!(catalog.contains("good"));
        assert_eq!(catalog.errors().len(), 1);
        assert_eq!(catalog.errors()[0].reason, ParseErrorKind::MalformedManifest);
    }
}
