// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Soundcheck scorecard compliance analysis

use crate::types::CheckResult;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Scorecard category a check rolls up into
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Category {
    /// Catalog ownership hygiene
    Ownership,
    /// Code quality, test coverage, and production bugs
    Quality,
    /// Vulnerability and SLA posture
    Security,
    /// Deployments, monitors, and paging
    Reliability,
}

impl Category {
    /// Every category, in report order
    pub const ALL: [Category; 4] = [
        Category::Ownership,
        Category::Quality,
        Category::Security,
        Category::Reliability,
    ];

    /// Highest level a team can reach in this category
    #[must_use]
    pub fn max_level(self) -> Level {
        match self {
            Category::Quality => Level::L4,
            _ => Level::L3,
        }
    }

    /// Level assumed when Soundcheck has no checks for this category
    fn baseline(self) -> Level {
        match self {
            Category::Ownership | Category::Quality => Level::L1,
            Category::Security | Category::Reliability => Level::L3,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Category::Ownership => "Ownership",
            Category::Quality => "Quality",
            Category::Security => "Security",
            Category::Reliability => "Reliability",
        };
        f.write_str(name)
    }
}

/// Compliance level ladder; `NotLeveled` means level-1 checks are failing
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Below L1
    NotLeveled,
    /// Level 1
    L1,
    /// Level 2
    L2,
    /// Level 3
    L3,
    /// Level 4
    L4,
}

impl Level {
    /// The level directly below this one
    #[must_use]
    pub fn below(self) -> Level {
        match self {
            Level::NotLeveled | Level::L1 => Level::NotLeveled,
            Level::L2 => Level::L1,
            Level::L3 => Level::L2,
            Level::L4 => Level::L3,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::NotLeveled => "NL",
            Level::L1 => "L1",
            Level::L2 => "L2",
            Level::L3 => "L3",
            Level::L4 => "L4",
        };
        f.write_str(name)
    }
}

/// One failing or warning check, with the metrics pulled from its details
#[derive(Debug, Clone)]
pub struct Improvement {
    /// Raw Soundcheck check id
    pub check_id: String,
    /// Human-friendly check name
    pub name: String,
    /// Level the check gates
    pub level: Level,
    /// Result state, `failed` or `warning`
    pub state: String,
    /// Components currently passing
    pub current: u64,
    /// Components evaluated
    pub total: u64,
    /// Passing percentage reported by the check
    pub percentage: f64,
    /// Target range from the check details, when present
    pub target: Option<Value>,
}

impl Improvement {
    /// Components still to fix
    #[must_use]
    pub fn needed(&self) -> u64 {
        self.total.saturating_sub(self.current)
    }

    /// Target range as `lower-upper%`, when the details carried one
    #[must_use]
    pub fn target_range(&self) -> Option<String> {
        let target = self.target.as_ref()?;
        let bound = |key: &str| {
            target
                .get(key)
                .and_then(Value::as_f64)
                .map_or_else(|| "??".to_string(), |value| format!("{}", value))
        };
        Some(format!("{}-{}%", bound("lower"), bound("upper")))
    }
}

/// Compliance standing of one category
#[derive(Debug, Clone)]
pub struct CategoryReport {
    /// The category analyzed
    pub category: Category,
    /// Level the team currently holds
    pub current_level: Level,
    /// Highest level available in this category
    pub max_level: Level,
    /// Failing checks, in input order
    pub improvements: Vec<Improvement>,
}

impl CategoryReport {
    /// Whether any check is failing in this category
    #[must_use]
    pub fn improvement_needed(&self) -> bool {
        !self.improvements.is_empty()
    }

    /// Failing checks grouped by the level they gate, lowest level first
    #[must_use]
    pub fn improvements_by_level(&self) -> BTreeMap<Level, Vec<&Improvement>> {
        let mut grouped: BTreeMap<Level, Vec<&Improvement>> = BTreeMap::new();
        for improvement in &self.improvements {
            grouped.entry(improvement.level).or_default().push(improvement);
        }
        grouped
    }
}

/// Category match terms. Order matters: Quality terms run before Security
/// and Reliability so production-bug SLA checks land in Quality.
const CATEGORY_TERMS: [(Category, &[&str]); 4] = [
    (Category::Ownership, &["ownership"]),
    (
        Category::Quality,
        &[
            "sonar", "coverage", "test", "quality", "code", "bluecumber", "cucumber", "e2e",
            "wdio", "integration", "prodbug", "prod", "bug", "sev1", "sev2", "sev3", "sev4",
            "a11y", "pass", "rate", "passing", "itpass", "percentage",
        ],
    ),
    (
        Category::Security,
        &["security", "vuln", "cve", "auth", "api-key", "mend", "challenge"],
    ),
    (
        Category::Reliability,
        &["deployment", "monitor", "uptime", "reliability", "pager", "datadog", "sla"],
    ),
];

/// Readable names for known check ids, matched before the generic
/// camelCase conversion
const KNOWN_CHECK_NAMES: [(&str, &str); 26] = [
    ("defaultMonitorPagerdutyEnabledCheck", "PagerDuty Default Monitors Enabled"),
    ("defaultMonitorPagingPriorityCheck", "PagerDuty Default Monitor Paging Priority"),
    ("datadogIntegrationCheck", "Datadog Integration"),
    ("datadogAPMInstrumentationCheck", "Datadog APM Instrumentation"),
    ("deploymentDriftCheck", "Deployment Drift Check"),
    ("lastDeploymentCheck", "Recent Deployment Check"),
    ("pagerDutyIntegrationCheck", "PagerDuty Integration"),
    ("outOfDateDeploymentsCheck", "Out of Date Deployments"),
    ("deploymentAZResilientCheck", "Deployment AZ Resilience"),
    ("sonarCoverageCheckComponent30", "SonarQube Code Coverage (30%)"),
    ("sonarCoverageCheckComponent50", "SonarQube Code Coverage (50%)"),
    ("sonarCoverageCheckComponent70", "SonarQube Code Coverage (70%)"),
    ("sonarCoverageCheckComponent90", "SonarQube Code Coverage (90%)"),
    ("prodBugInSlaOver80Percentage", "Production Bug SLA > 80%"),
    ("prodBugInSlaOver90Percentage", "Production Bug SLA > 90%"),
    ("prodBugInSlaOver100Percentage", "Production Bug SLA = 100%"),
    ("eightyPercentWithinOriginalSlaCheck", "80% Within Original SLA"),
    ("oneHundredPercentWithinOriginalSlaCheck", "100% Within Original SLA"),
    ("moreThan80WithinSlaCheck", "More Than 80% Within SLA"),
    ("noSlaMissLowPlusCheck", "No SLA Miss (Low+ Priority)"),
    ("noSlaMissMediumPlusCheck", "No SLA Miss (Medium+ Priority)"),
    ("noSlaMissUrgentPlusCheck", "No SLA Miss (Urgent+ Priority)"),
    ("challengeTimeLessThanDoubleSlaExternalCheck", "Challenge Time < 2x SLA (External)"),
    ("challengeTimeLessThanDoubleSlaHighPlusCheck", "Challenge Time < 2x SLA (High+)"),
    ("challengeTimeLessThanDoubleSlaLowPlusCheck", "Challenge Time < 2x SLA (Low+)"),
    ("preventableRcaUnder30", "Preventable RCA Under 30%"),
];

/// Scorecard category for a check id, or `None` for checks that do not
/// roll up into a team scorecard.
#[must_use]
pub fn categorize(check_id: &str) -> Option<Category> {
    let id = check_id.to_lowercase();
    // Only rollup checks describe team-wide standing; per-entity checks
    // are skipped.
    let id = id.strip_suffix(".rollups")?;
    for (category, terms) in &CATEGORY_TERMS {
        if terms.iter().any(|term| id.contains(term)) {
            return Some(*category);
        }
    }
    if id.contains("check") {
        return Some(Category::Quality);
    }
    None
}

/// Analyze a team's Soundcheck results into one report per category
#[must_use]
pub fn analyze(results: &[CheckResult]) -> Vec<CategoryReport> {
    let mut buckets: BTreeMap<Category, Vec<&CheckResult>> = BTreeMap::new();
    for check in results {
        if let Some(category) = categorize(&check.check_id) {
            buckets.entry(category).or_default().push(check);
        }
    }
    Category::ALL
        .iter()
        .map(|&category| {
            let checks = buckets.get(&category).map_or(&[][..], Vec::as_slice);
            analyze_category(category, checks)
        })
        .collect()
}

fn analyze_category(category: Category, checks: &[&CheckResult]) -> CategoryReport {
    let improvements: Vec<Improvement> = checks
        .iter()
        .filter(|check| matches!(check.state.as_str(), "failed" | "warning"))
        .map(|check| {
            let metrics = check_metrics(check.details.as_ref());
            Improvement {
                check_id: check.check_id.clone(),
                name: readable_check_name(&check.check_id),
                level: check_level(&check.check_id),
                state: check.state.clone(),
                current: metrics.current,
                total: metrics.total,
                percentage: metrics.percentage,
                target: metrics.target,
            }
        })
        .collect();

    let current_level = if category == Category::Quality {
        quality_level(checks)
    } else if let Some(lowest) = improvements.iter().map(|imp| imp.level).min() {
        lowest.below()
    } else if checks.is_empty() {
        category.baseline()
    } else {
        category.max_level()
    };

    CategoryReport {
        category,
        current_level,
        max_level: category.max_level(),
        improvements,
    }
}

/// Quality level comes from the highest coverage threshold still passing
fn quality_level(checks: &[&CheckResult]) -> Level {
    let passed = |threshold: &str| {
        checks.iter().any(|check| {
            let id = check.check_id.to_lowercase();
            id.contains("coverage") && id.contains(threshold) && check.state == "passed"
        })
    };
    if passed("90") {
        Level::L4
    } else if passed("70") {
        Level::L3
    } else if passed("50") {
        Level::L2
    } else {
        Level::L1
    }
}

/// Level a check gates, read out of its id
fn check_level(check_id: &str) -> Level {
    let id = check_id.to_lowercase();
    if id.contains("coverage") {
        if id.contains("90") {
            return Level::L4;
        }
        if id.contains("70") {
            return Level::L3;
        }
        if id.contains("50") {
            return Level::L2;
        }
    }
    Level::L1
}

#[derive(Debug, Default)]
struct CheckMetrics {
    current: u64,
    total: u64,
    percentage: f64,
    target: Option<Value>,
}

/// Pull counts out of a check's details. The interesting part sits under
/// `notes.data`, usually as a JSON-encoded string.
fn check_metrics(details: Option<&Value>) -> CheckMetrics {
    let parsed = details
        .and_then(|details| details.get("notes"))
        .and_then(|notes| notes.get("data"))
        .and_then(|data| match data {
            Value::String(text) => serde_json::from_str(text).ok(),
            other => Some(other.clone()),
        });
    let Some(data) = parsed else {
        return CheckMetrics::default();
    };
    let value = data.get("value");
    let field = |key: &str| value.and_then(|v| v.get(key));
    CheckMetrics {
        current: field("count").and_then(Value::as_u64).unwrap_or(0),
        total: field("total").and_then(Value::as_u64).unwrap_or(0),
        percentage: field("percentage").and_then(Value::as_f64).unwrap_or(0.0),
        target: data.get("target").filter(|target| !target.is_null()).cloned(),
    }
}

/// Turn a check id into a readable name: known ids map through a table,
/// anything else gets camelCase split with acronym fixes.
#[must_use]
pub fn readable_check_name(check_id: &str) -> String {
    let name = check_id.strip_suffix(".rollups").unwrap_or(check_id);
    for (pattern, readable) in &KNOWN_CHECK_NAMES {
        if name == *pattern {
            return (*readable).to_string();
        }
    }
    for (pattern, readable) in &KNOWN_CHECK_NAMES {
        if name.contains(pattern) {
            return (*readable).to_string();
        }
    }
    let mut words = camel_words(name);
    if words.last().is_some_and(|word| word.eq_ignore_ascii_case("check")) {
        words.pop();
    }
    let formatted: Vec<String> = words.iter().map(|word| fix_acronym(&title_word(word))).collect();
    formatted.join(" ")
}

/// Split a camelCase identifier into words, keeping acronym runs together
fn camel_words(name: &str) -> Vec<String> {
    let chars: Vec<char> = name.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();
    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        let boundary = match current.chars().last() {
            Some(prev) if c.is_uppercase() => {
                prev.is_lowercase()
                    || prev.is_ascii_digit()
                    || (prev.is_uppercase()
                        && chars.get(i + 1).is_some_and(|next| next.is_lowercase()))
            }
            _ => false,
        };
        if boundary {
            words.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn title_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
    }
}

fn fix_acronym(word: &str) -> String {
    match word {
        "Sla" => "SLA".to_string(),
        "Api" => "API".to_string(),
        "Rca" => "RCA".to_string(),
        "Az" => "AZ".to_string(),
        "Apm" => "APM".to_string(),
        other => other.to_string(),
    }
}
