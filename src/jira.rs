// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Jira REST client

use crate::config::Config;
use crate::types::{FieldDef, Issue, SearchResponse, Sprint};
use anyhow::{Context, Result};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

/// Pause between mutating Jira calls
pub const WRITE_PACING: Duration = Duration::from_millis(500);

/// Back-off before retrying a rate-limited update
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(60);

/// Page size for JQL searches
const SEARCH_PAGE_SIZE: u64 = 100;

#[derive(Debug, Deserialize)]
struct CreatedIssue {
    key: String,
}

/// Blocking client for the Jira REST and Agile APIs
pub struct JiraClient {
    http: Client,
    base_url: String,
    token: String,
}

impl JiraClient {
    /// Build a client from the loaded configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let base_url = config.jira_server.as_deref().ok_or_else(|| {
            anyhow::anyhow!("jira_server is not configured. Run 'tickwheel config set jira_server <URL>'")
        })?;
        let token = config.personal_access_token.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "personal_access_token is not configured. Run 'tickwheel config set personal_access_token <TOKEN>'"
            )
        })?;
        Self::new(base_url, token)
    }

    /// Build a client against an explicit base URL
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("GET {}", url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .query(query)
            .send()
            .with_context(|| format!("Request to {} failed", url))?;
        let response = check(response, &url)?;
        response
            .json()
            .with_context(|| format!("Failed to decode response from {}", url))
    }

    /// Fetch a single issue with all its fields
    pub fn issue(&self, key: &str) -> Result<Issue> {
        self.get_json(&format!("/rest/api/2/issue/{}", key), &[])
    }

    /// Run a JQL search, following pagination until exhausted.
    ///
    /// `fields` limits the field payload per issue; pass an empty slice
    /// to fetch everything.
    pub fn search(&self, jql: &str, fields: &[&str]) -> Result<Vec<Issue>> {
        let joined = fields.join(",");
        let mut issues = Vec::new();
        let mut start_at: u64 = 0;
        loop {
            let mut query: Vec<(&str, String)> = vec![
                ("jql", jql.to_string()),
                ("startAt", start_at.to_string()),
                ("maxResults", SEARCH_PAGE_SIZE.to_string()),
            ];
            if !fields.is_empty() {
                query.push(("fields", joined.clone()));
            }
            let page: SearchResponse = self.get_json("/rest/api/2/search", &query)?;
            let fetched = page.issues.len() as u64;
            issues.extend(page.issues);
            start_at += fetched;
            if fetched == 0 || start_at >= page.total {
                break;
            }
        }
        Ok(issues)
    }

    /// Fetch sprint details from the Agile API
    pub fn sprint(&self, id: u64) -> Result<Sprint> {
        self.get_json(&format!("/rest/agile/1.0/sprint/{}", id), &[])
    }

    /// Fetch the field catalog
    pub fn field_catalog(&self) -> Result<Vec<FieldDef>> {
        self.get_json("/rest/api/2/field", &[])
    }

    /// Update issue fields via PUT, backing off once on a rate limit
    pub fn update_fields(&self, key: &str, fields: serde_json::Value) -> Result<()> {
        let url = format!("{}/rest/api/2/issue/{}", self.base_url, key);
        let body = serde_json::json!({ "fields": fields });
        tracing::debug!("PUT {}", url);
        let response = self
            .http
            .put(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .with_context(|| format!("Request to {} failed", url))?;
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            tracing::warn!(
                "Rate limited updating {}; retrying in {}s",
                key,
                RATE_LIMIT_BACKOFF.as_secs()
            );
            std::thread::sleep(RATE_LIMIT_BACKOFF);
            let retry = self
                .http
                .put(&url)
                .bearer_auth(&self.token)
                .json(&body)
                .send()
                .with_context(|| format!("Request to {} failed", url))?;
            check(retry, &url)?;
            return Ok(());
        }
        check(response, &url)?;
        Ok(())
    }

    /// Copy the original estimate into the remaining estimate
    pub fn set_remaining_estimate(&self, key: &str, estimate: &str) -> Result<()> {
        self.update_fields(
            key,
            serde_json::json!({
                "timetracking": { "remainingEstimate": estimate }
            }),
        )
    }

    /// Create an issue and return its new key
    pub fn create_issue(&self, fields: serde_json::Value) -> Result<String> {
        let url = format!("{}/rest/api/2/issue", self.base_url);
        let body = serde_json::json!({ "fields": fields });
        tracing::debug!("POST {}", url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .with_context(|| format!("Request to {} failed", url))?;
        let response = check(response, &url)?;
        let created: CreatedIssue = response
            .json()
            .with_context(|| format!("Failed to decode response from {}", url))?;
        Ok(created.key)
    }

    /// Assign an issue to a user
    pub fn assign_issue(&self, key: &str, assignee: &str) -> Result<()> {
        let url = format!("{}/rest/api/2/issue/{}/assignee", self.base_url, key);
        let body = serde_json::json!({ "name": assignee });
        tracing::debug!("PUT {}", url);
        let response = self
            .http
            .put(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .with_context(|| format!("Request to {} failed", url))?;
        check(response, &url)?;
        Ok(())
    }

    /// Create a link of the named type between two issues
    pub fn link_issues(&self, link_type: &str, inward_key: &str, outward_key: &str) -> Result<()> {
        let url = format!("{}/rest/api/2/issueLink", self.base_url);
        let body = serde_json::json!({
            "type": { "name": link_type },
            "inwardIssue": { "key": inward_key },
            "outwardIssue": { "key": outward_key }
        });
        tracing::debug!("POST {}", url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .with_context(|| format!("Request to {} failed", url))?;
        check(response, &url)?;
        Ok(())
    }
}

/// Bail with status and body on a non-success response
fn check(response: Response, url: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    anyhow::bail!("{} answered {}: {}", url, status, body.trim())
}
