//! Slash-command resolution.
//!
//! `/name arguments...` is matched against the catalog in three tiers, and the
//! first tier with any hit decides:
//!
//! 1. `slash-name` equal to `name`
//! 2. a trigger phrase equal to `name` or to the whole command text
//! 3. a trigger phrase that starts with `name`, or that the command text
//!    starts with (both on word boundaries)
//!
//! Matching ignores case, and for trigger phrases treats `-`, `_` and runs of
//! whitespace as a single space. More than one hit in the deciding tier is
//! `Ambiguous`; the matcher never picks one.

use crate::{
    catalog::SkillCatalog,
    types::{Invocation, Resolution, SkillDefinition},
};

/// Resolve `raw_text` against `catalog`.
pub fn match_invocation(raw_text: &str, catalog: &SkillCatalog) -> Invocation {
    let Some(command) = parse_command(raw_text) else {
        return Invocation::no_match(raw_text);
    };

    let tiers: [&dyn Fn(&SkillDefinition) -> bool; 3] = [
        &|skill: &SkillDefinition| skill.slash_name.as_deref() == Some(command.name.as_str()),
        &|skill: &SkillDefinition| {
            skill.trigger_phrases.iter().any(|t| {
                let t = normalize_phrase(t);
                t == command.phrase_name || t == command.phrase_text
            })
        },
        &|skill: &SkillDefinition| {
            skill.trigger_phrases.iter().any(|t| {
                let t = normalize_phrase(t);
                !t.is_empty()
                    && (word_prefix(&t, &command.phrase_name)
                        || word_prefix(&command.phrase_text, &t))
            })
        },
    ];

    let resolved = tiers
        .iter()
        .map(|tier| {
            catalog
                .skills()
                .iter()
                .filter(|skill| tier(skill))
                .map(|skill| skill.id.clone())
                .collect::<Vec<_>>()
        })
        .find(|ids| !ids.is_empty())
        .map_or(Resolution::NoMatch, |mut ids| {
            if ids.len() == 1 {
                Resolution::SingleMatch(ids.remove(0))
            } else {
                Resolution::Ambiguous(ids)
            }
        });

    if let Resolution::Ambiguous(ids) = &resolved {
        tracing::debug!(command = %command.name, candidates = ?ids, "ambiguous skill invocation");
    }

    Invocation {
        raw: raw_text.to_string(),
        arguments: command.arguments,
        resolved,
    }
}

struct Command {
    /// Command token, lowercased.
    name: String,
    /// Command token as a normalised phrase.
    phrase_name: String,
    /// Everything after the slash as a normalised phrase.
    phrase_text: String,
    arguments: String,
}

fn parse_command(raw_text: &str) -> Option<Command> {
    let rest = raw_text.trim().strip_prefix('/')?;
    if rest.is_empty() || rest.starts_with(char::is_whitespace) {
        return None;
    }

    let (token, arguments) = match rest.split_once(char::is_whitespace) {
        Some((token, args)) => (token, args.trim()),
        None => (rest, ""),
    };
    let name = token.to_lowercase();

    Some(Command {
        phrase_name: normalize_phrase(&name),
        phrase_text: normalize_phrase(rest),
        name,
        arguments: arguments.to_string(),
    })
}

fn normalize_phrase(text: &str) -> String {
    text.to_lowercase()
        .split(|c: char| c.is_whitespace() || c == '-' || c == '_')
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// `haystack` starts with `needle` and the match ends on a word boundary.
fn word_prefix(haystack: &str, needle: &str) -> bool {
    !needle.is_empty()
        && haystack
            .strip_prefix(needle)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(' '))
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{parse::parse_skill, types::SkillSource},
        rstest::rstest,
    };

    fn skill(id: &str, extra: &str) -> SkillDefinition {
        let content = format!("---\nname: {id}\ntitle: {id}\ndescription: d\n{extra}---\nbody");
        parse_skill(&content, &SkillSource::bundled(format!("/skills/{id}"))).unwrap()
    }

    fn catalog(skills: Vec<SkillDefinition>) -> SkillCatalog {
        SkillCatalog::from_outcomes(skills.into_iter().map(Ok), Vec::new())
    }

    fn resolve(raw: &str, cat: &SkillCatalog) -> Resolution {
        match_invocation(raw, cat).resolved
    }

    #[test]
    fn slash_name_single_match() {
        let cat = catalog(vec![
            skill("deployer", "slash-name: deploy\n"),
            skill("linter", "slash-name: lint\n"),
        ]);
        let inv = match_invocation("/deploy", &cat);
        assert_eq!(inv.resolved, Resolution::SingleMatch("deployer".into()));
        assert_eq!(inv.raw, "/deploy");
        assert_eq!(inv.arguments, "");
    }

    #[test]
    fn shared_slash_name_is_ambiguous_in_catalog_order() {
        let cat = catalog(vec![
            skill("deploy-b", "slash-name: deploy\n"),
            skill("deploy-a", "slash-name: deploy\n"),
        ]);
        assert_eq!(
            resolve("/deploy", &cat),
            Resolution::Ambiguous(vec!["deploy-b".into(), "deploy-a".into()])
        );
    }

    #[test]
    fn slash_name_beats_trigger_phrases() {
        let cat = catalog(vec![
            skill("shipper", "triggers: [deploy]\n"),
            skill("deployer", "slash-name: deploy\n"),
        ]);
        assert_eq!(
            resolve("/deploy now", &cat),
            Resolution::SingleMatch("deployer".into())
        );
    }

    #[test]
    fn arguments_are_captured() {
        let cat = catalog(vec![skill("deployer", "slash-name: deploy\n")]);
        let inv = match_invocation("  /Deploy   staging --force  ", &cat);
        assert_eq!(inv.resolved, Resolution::SingleMatch("deployer".into()));
        assert_eq!(inv.arguments, "staging --force");
    }

    #[rstest]
    #[case("/review", "reviewer")]
    #[case("/REVIEW", "reviewer")]
    #[case("/code-review", "reviewer")]
    #[case("/code_review please", "reviewer")]
    #[case("/ship it now", "shipper")]
    #[case("/ship", "shipper")]
    fn trigger_phrase_fallback(#[case] raw: &str, #[case] expected: &str) {
        let cat = catalog(vec![
            skill("reviewer", "triggers: [review, Code Review]\n"),
            skill("shipper", "triggers: [ship it]\n"),
        ]);
        assert_eq!(resolve(raw, &cat), Resolution::SingleMatch(expected.into()));
    }

    #[test]
    fn exact_trigger_beats_prefix_trigger() {
        let cat = catalog(vec![
            skill("release-notes", "triggers: [release notes]\n"),
            skill("releaser", "triggers: [release]\n"),
        ]);
        assert_eq!(
            resolve("/release", &cat),
            Resolution::SingleMatch("releaser".into())
        );
    }

    #[test]
    fn equal_prefix_matches_are_ambiguous() {
        let cat = catalog(vec![
            skill("a", "triggers: [test unit]\n"),
            skill("b", "triggers: [test integration]\n"),
        ]);
        assert_eq!(
            resolve("/test", &cat),
            Resolution::Ambiguous(vec!["a".into(), "b".into()])
        );
    }

    #[test]
    fn prefix_requires_word_boundary() {
        let cat = catalog(vec![skill("tester", "triggers: [testing]\n")]);
        assert_eq!(resolve("/test", &cat), Resolution::NoMatch);
    }

    #[rstest]
    #[case("deploy please")]
    #[case("")]
    #[case("/")]
    #[case("/ deploy")]
    #[case("/unknown")]
    #[case("please /deploy")]
    fn no_match_cases(#[case] raw: &str) {
        let cat = catalog(vec![skill("deployer", "slash-name: deploy\n")]);
        let inv = match_invocation(raw, &cat);
        assert_eq!(inv.resolved, Resolution::NoMatch);
        assert_eq!(inv.raw, raw);
    }
}
