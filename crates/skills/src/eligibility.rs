//! Per-turn eligibility checks.
//!
//! Pure functions of `(skill, context)`: no I/O, no clocks, no globals.

use crate::{
    catalog::SkillCatalog,
    types::{DecisionReason, EligibilityDecision, SkillDefinition, TurnContext},
};

/// Decide whether `skill` is a candidate this turn, ignoring explicit invocation.
///
/// `unless` is checked first; a skill without a `when` rule is eligible.
pub fn evaluate(skill: &SkillDefinition, context: &TurnContext) -> EligibilityDecision {
    let rules = &skill.eligibility;

    let (eligible, reason) = if rules.unless.as_ref().is_some_and(|r| r.matches(context)) {
        (false, DecisionReason::ExplicitlyExcluded)
    } else {
        match &rules.when {
            None => (true, DecisionReason::Unscoped),
            Some(rule) if rule.matches(context) => (true, DecisionReason::MatchedRule),
            Some(_) => (false, DecisionReason::NoRuleMatched),
        }
    };

    EligibilityDecision {
        skill_id: skill.id.clone(),
        eligible,
        reason,
    }
}

/// Evaluate every catalog skill, in catalog order.
pub fn evaluate_all(catalog: &SkillCatalog, context: &TurnContext) -> Vec<EligibilityDecision> {
    catalog
        .skills()
        .iter()
        .map(|skill| evaluate(skill, context))
        .collect()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{parse::parse_skill, types::SkillSource},
    };

    fn skill(eligibility: &str) -> SkillDefinition {
        let content =
            format!("---\nname: s\ntitle: S\ndescription: d\n{eligibility}---\nbody");
        parse_skill(&content, &SkillSource::bundled("/skills/s")).unwrap()
    }

    #[test]
    fn no_rules_is_eligible() {
        let decision = evaluate(&skill(""), &TurnContext::default());
        assert!(decision.eligible);
        assert_eq!(decision.reason, DecisionReason::Unscoped);
        assert_eq!(decision.skill_id, "s");
    }

    #[test]
    fn when_rule_scopes_the_skill() {
        let s = skill("eligibility:\n  when:\n    equals: { key: language, value: rust }\n");

        let rust = TurnContext::default().with_signal("language", "rust");
        let go = TurnContext::default().with_signal("language", "go");

        assert_eq!(evaluate(&s, &rust).reason, DecisionReason::MatchedRule);
        assert!(evaluate(&s, &rust).eligible);
        assert_eq!(evaluate(&s, &go).reason, DecisionReason::NoRuleMatched);
        assert!(!evaluate(&s, &go).eligible);
    }

    #[test]
    fn unless_wins_over_when() {
        let s = skill(
            "eligibility:\n  when:\n    present: repo\n  unless:\n    equals: { key: mode, value: read-only }\n",
        );
        let ctx = TurnContext::default()
            .with_signal("repo", "quiver")
            .with_signal("mode", "read-only");
        let decision = evaluate(&s, &ctx);
        assert!(!decision.eligible);
        assert_eq!(decision.reason, DecisionReason::ExplicitlyExcluded);
    }

    #[test]
    fn unless_alone_keeps_unscoped_default() {
        let s = skill("eligibility:\n  unless:\n    present: offline\n");
        let decision = evaluate(&s, &TurnContext::default());
        assert!(decision.eligible);
        assert_eq!(decision.reason, DecisionReason::Unscoped);
    }

    #[test]
    fn evaluation_is_repeatable() {
        let s = skill(
            "eligibility:\n  when:\n    any:\n      - active: s\n      - one-of: { key: os, values: [linux, macos] }\n",
        );
        let ctx = TurnContext::new("/s")
            .with_signal("os", "linux")
            .with_previously_active("other");
        let first = evaluate(&s, &ctx);
        for _ in 0..10 {
            assert_eq!(evaluate(&s, &ctx), first);
        }
        assert!(first.eligible);
    }
}
