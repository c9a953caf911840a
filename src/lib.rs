// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//
//! Tickwheel library - delivery-engineering toolkit
//!
//! This crate provides the core functionality for planning epic dependency
//! rounds, auditing sprint status and estimates, attributing Backstage
//! applications to teams, and filing standard compliance tickets.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod backstage;
pub mod commands;
pub mod compliance;
pub mod config;
pub mod datadog;
pub mod graph;
pub mod jira;

/// Core data types for the Jira, Backstage, and Datadog wire formats
pub mod types {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use std::collections::{BTreeMap, HashMap};

    // =========================================================================
    // Jira Issues
    // =========================================================================

    /// Custom field id carrying story points
    pub const STORY_POINTS_FIELD: &str = "customfield_10502";

    /// Custom field id carrying sprint assignments
    pub const SPRINT_FIELD: &str = "customfield_10505";

    /// Custom field id carrying the epic link
    pub const EPIC_LINK_FIELD: &str = "customfield_10000";

    /// Status names (lowercase) that count as completed work
    pub const DONE_STATUSES: [&str; 4] = ["closed", "deployed", "done", "resolved"];

    /// True when a status name denotes completed work
    #[must_use]
    pub fn status_is_done(status: &str) -> bool {
        DONE_STATUSES.contains(&status.to_lowercase().as_str())
    }

    /// Parse a Jira timestamp.
    ///
    /// Jira emits `2024-01-15T10:30:00.000+0000`; RFC 3339 forms with a
    /// `Z` suffix are accepted as well.
    #[must_use]
    pub fn parse_jira_datetime(raw: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z")
            .or_else(|_| DateTime::parse_from_rfc3339(raw))
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// A Jira issue as returned by the REST API
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Issue {
        /// Issue key, e.g. `PROJ-123`
        pub key: String,
        /// Field payload
        #[serde(default)]
        pub fields: IssueFields,
    }

    /// The `fields` object of an issue
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct IssueFields {
        /// One-line summary
        pub summary: Option<String>,
        /// Workflow status
        pub status: Option<Status>,
        /// Current assignee
        pub assignee: Option<User>,
        /// Issue type
        pub issuetype: Option<IssueType>,
        /// Creation timestamp, in the Jira datetime format
        pub created: Option<String>,
        /// Links to other issues
        #[serde(default)]
        pub issuelinks: Vec<IssueLink>,
        /// Parent issue reference (present on subtasks)
        pub parent: Option<ParentRef>,
        /// Time tracking block
        pub timetracking: Option<TimeTracking>,
        /// Everything else, custom fields included
        #[serde(flatten)]
        pub extra: HashMap<String, serde_json::Value>,
    }

    impl IssueFields {
        /// Status name, `Unknown` when absent
        #[must_use]
        pub fn status_name(&self) -> &str {
            self.status.as_ref().map_or("Unknown", |s| s.name.as_str())
        }

        /// Assignee display name, `Unassigned` when absent
        #[must_use]
        pub fn assignee_name(&self) -> &str {
            self.assignee
                .as_ref()
                .and_then(User::label)
                .unwrap_or("Unassigned")
        }

        /// True when the status denotes completed work
        #[must_use]
        pub fn is_done(&self) -> bool {
            status_is_done(self.status_name())
        }

        /// Creation timestamp, parsed
        #[must_use]
        pub fn created_at(&self) -> Option<DateTime<Utc>> {
            self.created.as_deref().and_then(parse_jira_datetime)
        }

        /// Story points, when the story points custom field carries a number
        #[must_use]
        pub fn story_points(&self) -> Option<f64> {
            self.extra
                .get(STORY_POINTS_FIELD)
                .and_then(serde_json::Value::as_f64)
        }

        /// Raw value of the sprint custom field
        #[must_use]
        pub fn sprint_field(&self) -> Option<&serde_json::Value> {
            self.extra.get(SPRINT_FIELD)
        }
    }

    /// Workflow status
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Status {
        /// Status name, e.g. `In Progress`
        pub name: String,
    }

    /// A Jira user
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct User {
        /// Login name
        pub name: Option<String>,
        /// Display name
        #[serde(rename = "displayName")]
        pub display_name: Option<String>,
    }

    impl User {
        /// Best human-readable label for the user
        #[must_use]
        pub fn label(&self) -> Option<&str> {
            self.display_name.as_deref().or(self.name.as_deref())
        }
    }

    /// Issue type descriptor
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct IssueType {
        /// Type name, e.g. `Epic`, `Story`
        pub name: String,
    }

    /// A link between two issues
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct IssueLink {
        /// Link type
        #[serde(rename = "type")]
        pub link_type: LinkType,
        /// The issue on the outward side, when this issue is the source
        #[serde(rename = "outwardIssue")]
        pub outward_issue: Option<LinkedIssue>,
        /// The issue on the inward side, when this issue is the target
        #[serde(rename = "inwardIssue")]
        pub inward_issue: Option<LinkedIssue>,
    }

    /// Issue link type
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct LinkType {
        /// Type name, e.g. `Blocks`
        pub name: String,
    }

    /// The far side of an issue link
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct LinkedIssue {
        /// Issue key
        pub key: String,
    }

    /// Parent issue reference on a subtask
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ParentRef {
        /// Parent issue key
        pub key: String,
    }

    /// The `timetracking` block of an issue
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct TimeTracking {
        /// Original estimate, e.g. `2d 4h`
        #[serde(
            rename = "originalEstimate",
            skip_serializing_if = "Option::is_none"
        )]
        pub original_estimate: Option<String>,
        /// Remaining estimate
        #[serde(
            rename = "remainingEstimate",
            skip_serializing_if = "Option::is_none"
        )]
        pub remaining_estimate: Option<String>,
    }

    /// One page of a JQL search
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct SearchResponse {
        /// Offset of this page
        #[serde(rename = "startAt")]
        pub start_at: u64,
        /// Page size the server applied
        #[serde(rename = "maxResults")]
        pub max_results: u64,
        /// Total matches across all pages
        pub total: u64,
        /// Issues in this page
        #[serde(default)]
        pub issues: Vec<Issue>,
    }

    /// One entry of the field catalog (`/rest/api/2/field`)
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct FieldDef {
        /// Field id, e.g. `customfield_10505`
        pub id: String,
        /// Display name
        pub name: String,
        /// True for custom fields
        #[serde(default)]
        pub custom: bool,
    }

    /// Sprint details from the Agile API
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Sprint {
        /// Sprint id
        pub id: u64,
        /// Sprint name
        pub name: Option<String>,
        /// Start timestamp, when set
        #[serde(rename = "startDate")]
        pub start_date: Option<String>,
        /// End timestamp, when set
        #[serde(rename = "endDate")]
        pub end_date: Option<String>,
    }

    /// One element of the sprint custom field.
    ///
    /// The field carries sprints either as objects with an `id` or as the
    /// legacy Java `toString` form `com.atlassian...Sprint@...[id=123,name=...]`.
    #[derive(Debug, Clone, Deserialize)]
    #[serde(untagged)]
    pub enum SprintFieldEntry {
        /// Object form
        Object {
            /// Sprint id, numeric or stringly
            id: serde_json::Value,
        },
        /// Legacy `toString` form
        Legacy(String),
    }

    impl SprintFieldEntry {
        /// The sprint id carried by this entry
        #[must_use]
        pub fn id(&self) -> Option<u64> {
            match self {
                Self::Object { id } => match id {
                    serde_json::Value::Number(n) => n.as_u64(),
                    serde_json::Value::String(s) => s.parse().ok(),
                    _ => None,
                },
                Self::Legacy(raw) => {
                    let tail = raw.split("[id=").nth(1)?;
                    tail.split([',', ']']).next()?.parse().ok()
                }
            }
        }
    }

    /// Split the raw sprint field into its elements.
    ///
    /// The field arrives either as a list or as a bare entry; callers
    /// parse each element as a [`SprintFieldEntry`] and warn on the ones
    /// that fit neither shape.
    #[must_use]
    pub fn sprint_field_elements(value: &serde_json::Value) -> Vec<&serde_json::Value> {
        match value {
            serde_json::Value::Array(items) => items.iter().collect(),
            other => vec![other],
        }
    }

    // =========================================================================
    // Backstage Catalog
    // =========================================================================

    /// A catalog entity (group, component, or domain)
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Entity {
        /// Entity metadata
        pub metadata: EntityMeta,
        /// Kind-specific spec; every field optional
        #[serde(default)]
        pub spec: EntitySpec,
    }

    impl Entity {
        /// Human title, falling back to the machine name
        #[must_use]
        pub fn title(&self) -> &str {
            self.metadata
                .title
                .as_deref()
                .unwrap_or(&self.metadata.name)
        }
    }

    /// Entity metadata block
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct EntityMeta {
        /// Machine name
        #[serde(default)]
        pub name: String,
        /// Human title
        pub title: Option<String>,
        /// Free-form description
        pub description: Option<String>,
        /// Labels
        #[serde(default)]
        pub labels: BTreeMap<String, String>,
        /// Annotations
        #[serde(default)]
        pub annotations: BTreeMap<String, String>,
    }

    /// Entity spec block; field presence depends on the entity kind
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct EntitySpec {
        /// Component/group/domain type
        #[serde(rename = "type")]
        pub entity_type: Option<String>,
        /// Lifecycle stage (components)
        pub lifecycle: Option<String>,
        /// Owning entity ref; usually a string but left loose here
        pub owner: Option<serde_json::Value>,
        /// System the component belongs to
        pub system: Option<String>,
        /// Parent entity ref (groups)
        pub parent: Option<String>,
        /// Parent domain ref (domains)
        #[serde(rename = "subdomainOf")]
        pub subdomain_of: Option<String>,
        /// Business unit, when a domain spells it out
        #[serde(rename = "businessUnit", alias = "business_unit")]
        pub business_unit: Option<String>,
        /// Product, when a domain spells it out
        pub product: Option<String>,
    }

    impl EntitySpec {
        /// Owner ref as a string, when it is one
        #[must_use]
        pub fn owner_str(&self) -> Option<&str> {
            self.owner.as_ref().and_then(serde_json::Value::as_str)
        }
    }

    /// Entity list responses arrive either bare or wrapped in `items`
    #[derive(Debug, Clone, Deserialize)]
    #[serde(untagged)]
    pub enum CatalogEntities {
        /// `{"items": [...]}` form
        Wrapped {
            /// The wrapped entity list
            items: Vec<Entity>,
        },
        /// Bare `[...]` form
        Plain(Vec<Entity>),
    }

    impl CatalogEntities {
        /// Unwrap to the entity list
        #[must_use]
        pub fn into_vec(self) -> Vec<Entity> {
            match self {
                Self::Wrapped { items } | Self::Plain(items) => items,
            }
        }
    }

    /// One Soundcheck check result
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct CheckResult {
        /// Check id, e.g. `sonarCoverageCheckComponent70.rollups`
        #[serde(rename = "checkId")]
        pub check_id: String,
        /// Result state: `passed`, `failed`, or `warning`
        pub state: String,
        /// Raw details payload, shape varies per check
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub details: Option<serde_json::Value>,
    }

    /// Soundcheck results envelope
    #[derive(Debug, Clone, Default, Deserialize)]
    pub struct SoundcheckResults {
        /// Per-check results
        #[serde(default)]
        pub results: Vec<CheckResult>,
    }

    // =========================================================================
    // Datadog APM
    // =========================================================================

    /// One upstream caller entry; field names vary across API versions
    #[derive(Debug, Clone, Default, Deserialize)]
    pub struct UpstreamService {
        /// Caller name, under `service`
        pub service: Option<String>,
        /// Caller name, under `name`
        pub name: Option<String>,
        /// Call count, under `count`
        pub count: Option<f64>,
        /// Call count, under `requests`
        pub requests: Option<f64>,
    }

    impl UpstreamService {
        /// Caller service name, whichever field carries it
        #[must_use]
        pub fn caller(&self) -> Option<&str> {
            self.service.as_deref().or(self.name.as_deref())
        }

        /// Call count; zero or missing counts default to 1
        #[must_use]
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        pub fn calls(&self) -> u64 {
            let raw = self
                .count
                .filter(|&count| count != 0.0)
                .or(self.requests.filter(|&requests| requests != 0.0))
                .unwrap_or(1.0);
            if raw.is_sign_negative() {
                0
            } else {
                raw.round() as u64
            }
        }
    }

    /// APM service stats; upstreams arrive directly or nested
    #[derive(Debug, Clone, Default, Deserialize)]
    pub struct ApmServiceStats {
        /// Direct upstream list
        #[serde(default)]
        pub upstream_services: Vec<UpstreamService>,
        /// Nested dependency form
        pub dependencies: Option<UpstreamDependencies>,
    }

    /// Nested `dependencies` object of an APM stats response
    #[derive(Debug, Clone, Default, Deserialize)]
    pub struct UpstreamDependencies {
        /// Upstream callers
        #[serde(default)]
        pub upstream: Vec<UpstreamService>,
    }

    /// Trace search response; traces arrive under `traces` or `data`
    #[derive(Debug, Clone, Default, Deserialize)]
    pub struct TraceSearchResults {
        /// Traces under `traces`
        #[serde(default)]
        pub traces: Vec<Trace>,
        /// Traces under `data`
        #[serde(default)]
        pub data: Vec<Trace>,
    }

    /// A single trace
    #[derive(Debug, Clone, Default, Deserialize)]
    pub struct Trace {
        /// Spans of the trace
        #[serde(default)]
        pub spans: Vec<TraceSpan>,
    }

    /// A span within a trace
    #[derive(Debug, Clone, Default, Deserialize)]
    pub struct TraceSpan {
        /// Service that emitted the span
        pub service: Option<String>,
    }

    // =========================================================================
    // Attribution Reports
    // =========================================================================

    /// One application attributed to a team
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(default)]
    pub struct ApplicationInfo {
        /// Component machine name (the service name in Datadog)
        pub name: String,
        /// Human title
        pub title: String,
        /// Component type
        #[serde(rename = "type")]
        pub app_type: String,
        /// Lifecycle stage
        pub lifecycle: String,
        /// Owning system, with the platform label as fallback
        pub system: Option<String>,
        /// Platform label
        pub platform: Option<String>,
        /// Product label
        pub product: Option<String>,
        /// Business unit label
        pub business_unit: Option<String>,
        /// Description
        pub description: String,
    }

    /// A team's attributed applications, as written to the report file
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(default)]
    pub struct TeamApplications {
        /// Team machine name
        pub team_name: String,
        /// Team display title
        pub team_title: String,
        /// Team description
        pub description: String,
        /// Owning domain
        pub domain: Option<String>,
        /// Business unit
        pub business_unit: Option<String>,
        /// Product
        pub product: Option<String>,
        /// Platform
        pub platform: Option<String>,
        /// Parent entity ref
        pub parent: Option<String>,
        /// Group type
        #[serde(rename = "type")]
        pub team_type: Option<String>,
        /// Number of attributed applications
        pub application_count: usize,
        /// The applications, sorted by name
        pub applications: Vec<ApplicationInfo>,
    }

    /// Full attribution report: team key to team data, sorted by key
    pub type AttributionReport = BTreeMap<String, TeamApplications>;

    /// Per-domain consumer report
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct DomainConsumerReport {
        /// The domain receiving calls
        pub domain: String,
        /// Environment analyzed
        pub environment: String,
        /// Calls received per consuming domain
        pub consumer_domains: BTreeMap<String, u64>,
        /// Calls received per system of this domain
        pub consumer_by_system: BTreeMap<String, u64>,
        /// Total calls received
        pub total_calls_received: u64,
        /// Number of distinct consuming domains
        pub unique_consuming_domains: usize,
        /// Number of distinct systems involved
        pub unique_systems: usize,
    }

    /// Overall consumer analysis summary
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ConsumerSummary {
        /// Environment analyzed
        pub environment: String,
        /// Domains that were analyzed
        pub domains_analyzed: Vec<String>,
        /// Per-domain consuming-domain counts
        pub domain_reports: BTreeMap<String, BTreeMap<String, u64>>,
        /// Per-domain system counts
        pub system_reports: BTreeMap<String, BTreeMap<String, u64>>,
    }

    // =========================================================================
    // Ticket Manifest
    // =========================================================================

    /// Input manifest for standard ticket creation
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    pub struct TicketManifest {
        /// Priority applied to every ticket (Jira default when absent)
        pub priority: Option<String>,
        /// Teams to process, keyed by Backstage group name
        #[serde(default)]
        pub teams: BTreeMap<String, TeamTicket>,
    }

    /// Per-team ticket settings in the manifest
    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(default)]
    pub struct TeamTicket {
        /// Jira project key; teams without one are skipped
        pub project: Option<String>,
        /// Issue type, `Task` when absent
        pub issue_type: Option<String>,
        /// Epic to link the created tickets to
        pub epic_link: Option<String>,
        /// Assignee, set after creation
        pub assignee: Option<String>,
        /// Labels applied to the ticket
        pub labels: Vec<String>,
    }
}

/// Prelude for common imports
pub mod prelude {
    pub use crate::types::*;
    pub use anyhow::{Context, Result};
}

#[cfg(test)]
mod tests {
    use crate::types::*;

    #[test]
    fn test_parse_jira_datetime_formats() {
        assert!(parse_jira_datetime("2024-01-15T10:30:00.000+0000").is_some());
        assert!(parse_jira_datetime("2024-01-15T10:30:00+00:00").is_some());
        assert!(parse_jira_datetime("2024-01-15T10:30:00Z").is_some());
        assert!(parse_jira_datetime("January 15th").is_none());
    }

    #[test]
    fn test_done_statuses_case_insensitive() {
        assert!(status_is_done("Done"));
        assert!(status_is_done("RESOLVED"));
        assert!(status_is_done("deployed"));
        assert!(!status_is_done("In Progress"));
        assert!(!status_is_done("Withdrawn"));
    }

    #[test]
    fn test_sprint_entry_object_forms() {
        let numeric = serde_json::json!({"id": 123, "name": "Sprint 1"});
        let entry: SprintFieldEntry = serde_json::from_value(numeric).unwrap();
        assert_eq!(entry.id(), Some(123));

        let stringly = serde_json::json!({"id": "456"});
        let entry: SprintFieldEntry = serde_json::from_value(stringly).unwrap();
        assert_eq!(entry.id(), Some(456));
    }

    #[test]
    fn test_sprint_entry_legacy_form() {
        let raw = serde_json::json!(
            "com.atlassian.greenhopper.service.sprint.Sprint@1a2b[id=789,rapidViewId=12,state=ACTIVE,name=Sprint 42,startDate=2024-01-01T00:00:00.000Z]"
        );
        let entry: SprintFieldEntry = serde_json::from_value(raw).unwrap();
        assert_eq!(entry.id(), Some(789));
    }

    #[test]
    fn test_sprint_field_elements_list_and_bare() {
        let list = serde_json::json!([{"id": 1}, {"id": 2}]);
        assert_eq!(sprint_field_elements(&list).len(), 2);
        let bare = serde_json::json!({"id": 1});
        assert_eq!(sprint_field_elements(&bare).len(), 1);
    }

    #[test]
    fn test_issue_fields_helpers() {
        let issue: Issue = serde_json::from_value(serde_json::json!({
            "key": "PROJ-1",
            "fields": {
                "summary": "Do the thing",
                "status": {"name": "Closed"},
                "customfield_10502": 5.0
            }
        }))
        .unwrap();
        assert!(issue.fields.is_done());
        assert_eq!(issue.fields.story_points(), Some(5.0));
        assert_eq!(issue.fields.assignee_name(), "Unassigned");
    }

    #[test]
    fn test_catalog_entities_two_shapes() {
        let wrapped: CatalogEntities = serde_json::from_value(serde_json::json!({
            "items": [{"metadata": {"name": "a"}}]
        }))
        .unwrap();
        assert_eq!(wrapped.into_vec().len(), 1);

        let plain: CatalogEntities = serde_json::from_value(serde_json::json!(
            [{"metadata": {"name": "a"}}, {"metadata": {"name": "b"}}]
        ))
        .unwrap();
        assert_eq!(plain.into_vec().len(), 2);
    }

    #[test]
    fn test_upstream_service_field_variants() {
        let by_service: UpstreamService =
            serde_json::from_value(serde_json::json!({"service": "checkout", "count": 41.7}))
                .unwrap();
        assert_eq!(by_service.caller(), Some("checkout"));
        assert_eq!(by_service.calls(), 42);

        let by_name: UpstreamService =
            serde_json::from_value(serde_json::json!({"name": "billing", "requests": 3})).unwrap();
        assert_eq!(by_name.caller(), Some("billing"));
        assert_eq!(by_name.calls(), 3);

        let bare: UpstreamService = serde_json::from_value(serde_json::json!({})).unwrap();
        assert_eq!(bare.calls(), 1);
    }
}
