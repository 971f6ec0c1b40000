//! Metric name and label definitions.
//!
//! Every metric the engine records is named here so dashboards have a single
//! place to look.

/// Skill engine metrics
pub mod skills {
    /// Skills in the most recently built catalog
    pub const TOTAL: &str = "quiver_skills_total";
    /// Discovery passes
    pub const DISCOVERY_OPERATIONS_TOTAL: &str = "quiver_skills_discovery_operations_total";
    /// Discovery duration in seconds
    pub const DISCOVERY_DURATION_SECONDS: &str = "quiver_skills_discovery_duration_seconds";
    /// Discovery warnings (missing or unreadable roots)
    pub const DISCOVERY_WARNINGS_TOTAL: &str = "quiver_skills_discovery_warnings_total";
    /// Parse operations (SKILL.md)
    pub const PARSE_OPERATIONS_TOTAL: &str = "quiver_skills_parse_operations_total";
    /// Parse errors by kind
    pub const PARSE_ERRORS_TOTAL: &str = "quiver_skills_parse_errors_total";
    /// Catalog rebuilds
    pub const CATALOG_REBUILDS_TOTAL: &str = "quiver_skills_catalog_rebuilds_total";
    /// Turns evaluated
    pub const TURNS_TOTAL: &str = "quiver_skills_turns_total";
    /// Ambiguous invocations reported to the caller
    pub const AMBIGUOUS_INVOCATIONS_TOTAL: &str = "quiver_skills_ambiguous_invocations_total";
    /// Prompt composition operations
    pub const PROMPT_COMPOSITION_TOTAL: &str = "quiver_skills_prompt_composition_total";
    /// Prompt composition duration
    pub const PROMPT_COMPOSITION_DURATION_SECONDS: &str =
        "quiver_skills_prompt_composition_duration_seconds";
}

/// Common label keys
pub mod labels {
    /// Parse error kind (`malformed_manifest`, `missing_field`, `duplicate_id`)
    pub const ERROR_KIND: &str = "error_kind";
    /// Invocation resolution (`no_match`, `single_match`, `ambiguous`)
    pub const RESOLUTION: &str = "resolution";
}
