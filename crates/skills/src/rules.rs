//! Eligibility rule grammar.
//!
//! Rules are plain data decoded from the `eligibility` front-matter block.
//! There is no way to call out of the grammar: every predicate reads only the
//! [`TurnContext`], and evaluation depth is capped at [`MAX_RULE_DEPTH`].
//!
//! ```yaml
//! eligibility:
//!   when:
//!     all:
//!       - equals: { key: language, value: rust }
//!       - present: ci
//!   unless:
//!     equals: { key: mode, value: read-only }
//! ```

use serde::{Deserialize, Deserializer, Serialize, de::Error as _};

use crate::types::TurnContext;

/// Deepest rule tree accepted by the parser and walked by the evaluator.
pub const MAX_RULE_DEPTH: usize = 16;

/// A single predicate over the turn context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub enum Rule {
    /// Signal `key` is set to exactly `value`.
    Equals {
        key: String,
        #[serde(deserialize_with = "scalar_string")]
        value: String,
    },
    /// Signal `key` is set to any of `values`.
    OneOf {
        key: String,
        #[serde(deserialize_with = "scalar_strings")]
        values: Vec<String>,
    },
    /// Signal is set, whatever its value.
    Present(String),
    /// Skill id was active on the previous turn.
    Active(String),
    Not(Box<Rule>),
    /// True when every child is true (and for an empty list).
    All(Vec<Rule>),
    /// True when some child is true (false for an empty list).
    Any(Vec<Rule>),
}

impl Rule {
    /// Nesting depth; a leaf predicate has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            Self::Equals { .. } | Self::OneOf { .. } | Self::Present(_) | Self::Active(_) => 1,
            Self::Not(inner) => 1 + inner.depth(),
            Self::All(children) | Self::Any(children) => {
                1 + children.iter().map(Rule::depth).max().unwrap_or(0)
            },
        }
    }

    /// Evaluate against `ctx`. Subtrees deeper than [`MAX_RULE_DEPTH`] are false.
    pub fn matches(&self, ctx: &TurnContext) -> bool {
        self.matches_at(ctx, 1)
    }

    fn matches_at(&self, ctx: &TurnContext, depth: usize) -> bool {
        if depth > MAX_RULE_DEPTH {
            return false;
        }
        match self {
            Self::Equals { key, value } => ctx.signal(key) == Some(value.as_str()),
            Self::OneOf { key, values } => ctx
                .signal(key)
                .is_some_and(|v| values.iter().any(|candidate| candidate == v)),
            Self::Present(key) => ctx.workspace_signals.contains_key(key),
            Self::Active(skill_id) => ctx.previously_active_skill_ids.contains(skill_id),
            Self::Not(inner) => !inner.matches_at(ctx, depth + 1),
            Self::All(children) => children.iter().all(|c| c.matches_at(ctx, depth + 1)),
            Self::Any(children) => children.iter().any(|c| c.matches_at(ctx, depth + 1)),
        }
    }
}

/// The `eligibility` block of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EligibilityRules {
    /// Scope: the skill is eligible only when this matches. Absent = everywhere.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<Rule>,
    /// Exclusion: checked first, wins over `when`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unless: Option<Rule>,
}

impl EligibilityRules {
    pub fn is_empty(&self) -> bool {
        self.when.is_none() && self.unless.is_none()
    }

    pub fn depth(&self) -> usize {
        let when = self.when.as_ref().map_or(0, Rule::depth);
        let unless = self.unless.as_ref().map_or(0, Rule::depth);
        when.max(unless)
    }
}

/// Accept YAML scalars (`1`, `true`) where a string is expected.
fn scalar_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    scalar_to_string(serde_json::Value::deserialize(deserializer)?).map_err(D::Error::custom)
}

fn scalar_strings<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(scalar_to_string)
            .collect::<Result<_, _>>()
            .map_err(D::Error::custom),
        other => Err(D::Error::custom(format!("expected a list, got {other}"))),
    }
}

fn scalar_to_string(value: serde_json::Value) -> Result<String, String> {
    match value {
        serde_json::Value::String(s) => Ok(s),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!("expected a scalar value, got {other}")),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest, serde_json::json};

    fn rule(value: serde_json::Value) -> Rule {
        serde_json::from_value(value).unwrap()
    }

    fn ctx() -> TurnContext {
        TurnContext::new("")
            .with_signal("language", "rust")
            .with_signal("ci", "github")
            .with_previously_active("review")
    }

    #[rstest]
    #[case(json!({"equals": {"key": "language", "value": "rust"}}), true)]
    #[case(json!({"equals": {"key": "language", "value": "Rust"}}), false)]
    #[case(json!({"equals": {"key": "missing", "value": "rust"}}), false)]
    #[case(json!({"one-of": {"key": "ci", "values": ["gitlab", "github"]}}), true)]
    #[case(json!({"present": "ci"}), true)]
    #[case(json!({"present": "docker"}), false)]
    #[case(json!({"active": "review"}), true)]
    #[case(json!({"not": {"present": "docker"}}), true)]
    #[case(json!({"all": [{"present": "ci"}, {"present": "docker"}]}), false)]
    #[case(json!({"any": [{"present": "ci"}, {"present": "docker"}]}), true)]
    #[case(json!({"all": []}), true)]
    #[case(json!({"any": []}), false)]
    fn evaluates_predicates(#[case] input: serde_json::Value, #[case] expected: bool) {
        assert_eq!(rule(input).matches(&ctx()), expected);
    }

    #[test]
    fn numeric_values_are_compared_as_strings() {
        let r = rule(json!({"equals": {"key": "python", "value": 3}}));
        assert!(r.matches(&TurnContext::new("").with_signal("python", "3")));
    }

    #[test]
    fn unknown_predicate_is_rejected() {
        assert!(serde_json::from_value::<Rule>(json!({"exec": "rm -rf /"})).is_err());
    }

    #[test]
    fn depth_counts_nesting() {
        let r = rule(json!({"not": {"all": [{"present": "a"}, {"not": {"present": "b"}}]}}));
        assert_eq!(r.depth(), 4);
    }

    #[test]
    fn over_deep_tree_evaluates_false() {
        let mut r = Rule::Present("ci".into());
        for _ in 0..MAX_RULE_DEPTH {
            r = Rule::All(vec![r]);
        }
        assert_eq!(r.depth(), MAX_RULE_DEPTH + 1);
        assert!(!r.matches(&ctx()));
    }

    #[test]
    fn rules_block_depth_takes_max() {
        let rules: EligibilityRules = serde_json::from_value(json!({
            "when": {"present": "a"},
            "unless": {"not": {"present": "b"}}
        }))
        .unwrap();
        assert_eq!(rules.depth(), 2);
        assert!(!rules.is_empty());
    }
}
