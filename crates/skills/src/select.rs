//! Active-set selection.

use crate::{
    catalog::SkillCatalog,
    types::{ActiveSkillSet, EligibilityDecision, Invocation, Resolution},
};

/// Combine an invocation with per-skill eligibility into the turn's active set.
///
/// A `SingleMatch` skill goes first whatever its eligibility. Eligible skills
/// follow in catalog order. `Ambiguous` and `NoMatch` add nothing explicit.
pub fn select<'a>(
    invocation: &Invocation,
    decisions: &[EligibilityDecision],
    catalog: &'a SkillCatalog,
) -> ActiveSkillSet<'a> {
    let mut set = ActiveSkillSet::new();

    match &invocation.resolved {
        Resolution::SingleMatch(id) => match catalog.get(id) {
            Some(skill) => {
                set.push(skill);
            },
            None => tracing::warn!(id = %id, "invoked skill is not in the catalog"),
        },
        Resolution::Ambiguous(ids) => {
            tracing::debug!(candidates = ?ids, "ambiguous invocation left unresolved");
        },
        Resolution::NoMatch => {},
    }

    // Decisions may arrive in any order; the catalog defines the output order.
    for skill in catalog.skills() {
        let eligible = decisions
            .iter()
            .any(|d| d.eligible && d.skill_id == skill.id);
        if eligible {
            set.push(skill);
        }
    }

    set
}
