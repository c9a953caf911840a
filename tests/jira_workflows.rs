// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! End-to-end Jira workflow tests against a mock server

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Write a config file pointing every service at the mock server
fn write_config(dir: &TempDir, uri: &str) -> PathBuf {
    let config = dir.path().join("config.json");
    let body = json!({
        "jira_server": uri,
        "personal_access_token": "test-token",
        "backstage_server": uri,
        "backstage_token": "test-token",
        "datadog_api_key": "api-key",
        "datadog_app_key": "app-key",
        "datadog_site": uri,
    });
    std::fs::write(&config, body.to_string()).unwrap();
    config
}

fn tickwheel(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tickwheel").expect("binary builds");
    cmd.env("TICKWHEEL_CONFIG", config).env("NO_COLOR", "1");
    cmd
}

fn issue(key: &str, fields: serde_json::Value) -> serde_json::Value {
    json!({ "key": key, "fields": fields })
}

fn search_page(issues: &[serde_json::Value]) -> serde_json::Value {
    json!({
        "startAt": 0,
        "maxResults": 200,
        "total": issues.len(),
        "issues": issues,
    })
}

async fn mount_issue(server: &MockServer, key: &str, fields: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/rest/api/2/issue/{key}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(issue(key, fields)))
        .mount(server)
        .await;
}

#[tokio::test(flavor = "multi_thread")]
async fn test_plan_orders_rounds() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, &server.uri());

    mount_issue(
        &server,
        "DEMO-1",
        json!({ "summary": "Checkout revamp", "issuetype": {"name": "Epic"} }),
    )
    .await;
    let children = [
        issue(
            "DEMO-2",
            json!({
                "summary": "Build schema",
                "status": {"name": "Done"},
                "issuelinks": [
                    {"type": {"name": "Blocks"}, "outwardIssue": {"key": "DEMO-3"}}
                ],
            }),
        ),
        issue(
            "DEMO-3",
            json!({
                "summary": "Ship API",
                "status": {"name": "To Do"},
                "issuelinks": [
                    {"type": {"name": "Blocks"}, "inwardIssue": {"key": "DEMO-2"}},
                    {"type": {"name": "Blocks"}, "outwardIssue": {"key": "DEMO-4"}}
                ],
            }),
        ),
        issue(
            "DEMO-4",
            json!({
                "summary": "Integrate UI",
                "status": {"name": "To Do"},
                "issuelinks": [],
            }),
        ),
        issue(
            "DEMO-5",
            json!({
                "summary": "Write docs",
                "status": {"name": "To Do"},
                "issuelinks": [
                    {"type": {"name": "Blocks"}, "outwardIssue": {"key": "OTHER-9"}}
                ],
            }),
        ),
    ];
    Mock::given(method("GET"))
        .and(path("/rest/api/2/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(&children)))
        .mount(&server)
        .await;

    tickwheel(&config)
        .args(["plan", "DEMO-1"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Round 1:\n  DEMO-2: Build schema\n  DEMO-5: Write docs")
                .and(predicate::str::contains("Round 2:\n  DEMO-3: Ship API - [DEMO-2]"))
                .and(predicate::str::contains(
                    "Round 3:\n  DEMO-4: Integrate UI - [DEMO-3]",
                )),
        );

    let output = tickwheel(&config)
        .args(["--json", "plan", "DEMO-1", "--transitive"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["epic"], "DEMO-1");
    assert_eq!(value["rounds"][0][0]["key"], "DEMO-2");
    assert_eq!(value["rounds"][0][1]["key"], "DEMO-5");
    assert_eq!(value["rounds"][1][0]["dependencies"], json!(["DEMO-2"]));
    assert_eq!(value["rounds"][2][0]["key"], "DEMO-4");
    assert_eq!(value["rounds"][2][0]["transitive"], json!(["DEMO-2"]));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_plan_rejects_non_epics() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, &server.uri());

    mount_issue(
        &server,
        "DEMO-2",
        json!({ "summary": "Build schema", "issuetype": {"name": "Task"} }),
    )
    .await;

    tickwheel(&config)
        .args(["plan", "DEMO-2"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "DEMO-2 is not an Epic (issue type: Task)",
        ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_plan_reports_dependency_cycles() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, &server.uri());

    mount_issue(
        &server,
        "DEMO-1",
        json!({ "summary": "Checkout revamp", "issuetype": {"name": "Epic"} }),
    )
    .await;
    let children = [
        issue(
            "DEMO-2",
            json!({
                "summary": "Build schema",
                "status": {"name": "To Do"},
                "issuelinks": [
                    {"type": {"name": "Blocks"}, "outwardIssue": {"key": "DEMO-3"}}
                ],
            }),
        ),
        issue(
            "DEMO-3",
            json!({
                "summary": "Ship API",
                "status": {"name": "To Do"},
                "issuelinks": [
                    {"type": {"name": "Blocks"}, "outwardIssue": {"key": "DEMO-2"}}
                ],
            }),
        ),
    ];
    Mock::given(method("GET"))
        .and(path("/rest/api/2/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(&children)))
        .mount(&server)
        .await;

    tickwheel(&config)
        .args(["plan", "DEMO-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "dependency cycle detected involving: DEMO-2, DEMO-3",
        ));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_status_groups_by_sprint() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, &server.uri());

    mount_issue(
        &server,
        "DEMO-1",
        json!({ "summary": "Checkout revamp", "issuetype": {"name": "Epic"} }),
    )
    .await;
    let children = [
        issue(
            "DEMO-2",
            json!({
                "summary": "Build schema",
                "status": {"name": "Done"},
                "customfield_10505": ["garbage-without-id", {"id": 42, "name": "Sprint 42"}],
            }),
        ),
        issue(
            "DEMO-3",
            json!({
                "summary": "Ship API",
                "status": {"name": "In Progress"},
                "customfield_10505": [
                    "com.atlassian.greenhopper.service.sprint.Sprint@6f70[id=43,rapidViewId=10,state=ACTIVE,name=Sprint 43]"
                ],
            }),
        ),
        issue(
            "DEMO-4",
            json!({ "summary": "Integrate UI", "status": {"name": "To Do"} }),
        ),
        issue(
            "DEMO-5",
            json!({ "summary": "Old spike", "status": {"name": "Withdrawn"} }),
        ),
    ];
    Mock::given(method("GET"))
        .and(path("/rest/api/2/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(&children)))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/agile/1.0/sprint/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 42,
            "name": "Sprint 42",
            "startDate": "2025-01-06T00:00:00.000+0000",
            "endDate": "2025-01-17T00:00:00.000+0000",
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/agile/1.0/sprint/43"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 43,
            "name": "Sprint 43",
            "startDate": "2025-01-20T00:00:00.000+0000",
            "endDate": "2025-01-31T00:00:00.000+0000",
        })))
        .mount(&server)
        .await;

    tickwheel(&config)
        .args(["status", "DEMO-1"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Epic Plan Evaluation: DEMO-1")
                .and(predicate::str::contains(
                    "Completed (Withdrawn or Done no sprint) Work:\n  DEMO-5: Old spike",
                ))
                .and(predicate::str::contains(
                    "Sprint: Sprint 42 (2025-01-06 - 2025-01-17)",
                ))
                .and(predicate::str::contains("    DEMO-2: Build schema"))
                .and(predicate::str::contains(
                    "Sprint: Sprint 43 (2025-01-20 - 2025-01-31)",
                ))
                .and(predicate::str::contains("  In Progress:\n    DEMO-3: Ship API"))
                .and(predicate::str::contains("Unplanned Work:\n  DEMO-4: Integrate UI")),
        )
        .stderr(predicate::str::contains("has invalid sprint data"));

    let output = tickwheel(&config)
        .args(["--json", "status", "DEMO-1"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["epic"], "DEMO-1");
    assert_eq!(value["completed"][0]["sprint_id"], 42);
    assert_eq!(value["completed"][0]["statuses"]["Done"][0]["key"], "DEMO-2");
    assert_eq!(value["planned"][0]["sprint_id"], 43);
    assert_eq!(value["unplanned"][0]["key"], "DEMO-4");
    assert_eq!(value["completed_no_sprint"][0]["key"], "DEMO-5");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_estimate_dry_run_previews_updates() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, &server.uri());

    let issues = [
        issue(
            "DEMO-10",
            json!({
                "summary": "Persist cart",
                "customfield_10502": 5,
                "timetracking": {"originalEstimate": "2d", "remainingEstimate": "0m"},
            }),
        ),
        issue(
            "DEMO-11",
            json!({
                "summary": "Spike cache",
                "timetracking": {"originalEstimate": "1d"},
            }),
        ),
    ];
    Mock::given(method("GET"))
        .and(path("/rest/api/2/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(&issues)))
        .mount(&server)
        .await;

    tickwheel(&config)
        .args(["estimate", "team", "Platform"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Found 2 issues matching the query.")
                .and(predicate::str::contains(
                    "Would set remaining estimate to: 2d (completed ticket)",
                ))
                .and(predicate::str::contains("Skipped - no story points"))
                .and(predicate::str::contains("Would update: 1 issues"))
                .and(predicate::str::contains("Would skip: 1 issues"))
                .and(predicate::str::contains("Run with --apply to apply changes.")),
        );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_estimate_apply_writes_estimates() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, &server.uri());

    let issues = [issue(
        "DEMO-10",
        json!({
            "summary": "Persist cart",
            "customfield_10502": 5,
            "timetracking": {"originalEstimate": "2d", "remainingEstimate": "0m"},
        }),
    )];
    Mock::given(method("GET"))
        .and(path("/rest/api/2/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(&issues)))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/rest/api/2/issue/DEMO-10"))
        .and(body_json(json!({
            "fields": {"timetracking": {"remainingEstimate": "2d"}}
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    tickwheel(&config)
        .args(["estimate", "assignee", "alice", "--apply"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Set remaining estimate to: 2d (completed ticket)")
                .and(predicate::str::contains("Updated: 1 issues"))
                .and(predicate::str::contains("Skipped: 0 issues")),
        );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_subtasks_reports_owner_mismatches() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, &server.uri());

    let subtasks = [
        issue(
            "SUB-1",
            json!({
                "summary": "Wire metrics",
                "status": {"name": "In Progress"},
                "assignee": {"name": "alice", "displayName": "Alice"},
                "parent": {"key": "DEMO-20"},
            }),
        ),
        issue(
            "SUB-2",
            json!({
                "summary": "Update runbook",
                "status": {"name": "To Do"},
                "assignee": {"name": "bob", "displayName": "Bob"},
                "parent": {"key": "DEMO-20"},
            }),
        ),
    ];
    Mock::given(method("GET"))
        .and(path("/rest/api/2/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(&subtasks)))
        .mount(&server)
        .await;
    mount_issue(
        &server,
        "DEMO-20",
        json!({
            "summary": "Observability",
            "status": {"name": "In Progress"},
            "assignee": {"name": "bob", "displayName": "Bob"},
        }),
    )
    .await;

    tickwheel(&config)
        .args(["subtasks", "--project", "DEMO"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Mismatched Subtasks Found:")
                .and(predicate::str::contains(
                    "Subtask: SUB-1 (Wire metrics) - In Progress",
                ))
                .and(predicate::str::contains("Assigned to: Alice"))
                .and(predicate::str::contains("Parent owner: Bob"))
                .and(predicate::str::contains("SUB-2").not()),
        );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_span_measures_epic_development_time() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, &server.uri());

    let epics = [issue(
        "DEMO-1",
        json!({
            "summary": "Checkout revamp",
            "created": "2025-01-01T00:00:00.000+0000",
        }),
    )];
    Mock::given(method("GET"))
        .and(path("/rest/api/2/search"))
        .and(query_param(
            "jql",
            "issueType = Epic AND statusCategory != \"Done\" ORDER BY created ASC",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(&epics)))
        .mount(&server)
        .await;
    let children = [
        issue("DEMO-2", json!({ "created": "2024-12-20T09:00:00.000+0000" })),
        issue("DEMO-3", json!({ "created": "2025-01-10T00:00:00.000+0000" })),
        issue("DEMO-4", json!({ "created": "2025-02-01T00:00:00.000+0000" })),
    ];
    Mock::given(method("GET"))
        .and(path("/rest/api/2/search"))
        .and(query_param(
            "jql",
            "\"Epic Link\" = \"DEMO-1\" OR parent = \"DEMO-1\"",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(search_page(&children)))
        .mount(&server)
        .await;

    tickwheel(&config)
        .args(["span"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Found 1 open epics.")
                .and(predicate::str::contains(
                    "Number of Prior Tickets (Created Before Epic): 1 \
                     (Range: 2024-12-20 to 2024-12-20)",
                ))
                .and(predicate::str::contains(
                    "Number of Relevant Tickets (Created After Epic): 2 \
                     (Range: 2025-01-10 to 2025-02-01)",
                ))
                .and(predicate::str::contains(
                    "Epic Development Span (Epic Creation to Last Relevant Ticket): \
                     31 days, 0:00:00",
                ))
                .and(predicate::str::contains(
                    "Ticket Creation Activity Span (First Relevant Ticket to Last \
                     Relevant Ticket): 22 days, 0:00:00",
                ))
                .and(predicate::str::contains(
                    "Epic Development Time Analysis Summary",
                ))
                .and(predicate::str::contains(
                    "Average Epic Development Span: 31 days, 0:00:00",
                )),
        );

    let output = tickwheel(&config).args(["--json", "span"]).output().unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["epics"][0]["epic_key"], "DEMO-1");
    assert_eq!(value["epics"][0]["development_span_seconds"], 31 * 86_400);
    assert_eq!(value["epics"][0]["activity_span_seconds"], 22 * 86_400);
    assert_eq!(value["longest_epic"], "DEMO-1");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fields_lists_custom_values() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir, &server.uri());

    mount_issue(
        &server,
        "DEMO-1",
        json!({
            "summary": "Checkout revamp",
            "customfield_10502": 8,
            "customfield_10999": null,
        }),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/rest/api/2/field"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "customfield_10502", "name": "Story Points", "custom": true},
            {"id": "customfield_10999", "name": "Release Notes", "custom": true},
            {"id": "summary", "name": "Summary", "custom": false},
        ])))
        .mount(&server)
        .await;

    tickwheel(&config)
        .args(["fields", "DEMO-1"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Examining issue: DEMO-1")
                .and(predicate::str::contains("Summary: Checkout revamp"))
                .and(predicate::str::contains("customfield_10502: Story Points"))
                .and(predicate::str::contains("Value: 8"))
                .and(predicate::str::contains("customfield_10999").not()),
        );
}
