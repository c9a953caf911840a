// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Datadog APM client

use crate::config::Config;
use crate::types::{ApmServiceStats, TraceSearchResults};
use anyhow::{Context, Result};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use std::cell::Cell;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Back-off before retrying a rate-limited Datadog call
const RATE_LIMIT_BACKOFF: Duration = Duration::from_secs(5);

/// Seconds in the seven-day query window
const WEEK_SECONDS: i64 = 7 * 24 * 60 * 60;

/// Blocking client for the Datadog APM and trace-search APIs.
///
/// Requests are paced by a fixed delay, and per-service failures degrade
/// to empty results with a warning so a long analysis run never dies on
/// one flaky service.
pub struct DatadogClient {
    http: Client,
    base_url: String,
    api_key: String,
    app_key: String,
    delay: Duration,
    last_request: Cell<Option<Instant>>,
    auth_warned: Cell<bool>,
}

impl DatadogClient {
    /// Build a client from the loaded configuration
    pub fn from_config(config: &Config, delay: Duration) -> Result<Self> {
        let base_url = config.datadog_base_url().ok_or_else(|| {
            anyhow::anyhow!("datadog_site is not configured. Run 'tickwheel config set datadog_site <SITE>'")
        })?;
        let api_key = config.datadog_api_key.as_deref().ok_or_else(|| {
            anyhow::anyhow!("datadog_api_key is not configured (or set DD_API_KEY)")
        })?;
        let app_key = config.datadog_app_key.as_deref().ok_or_else(|| {
            anyhow::anyhow!("datadog_app_key is not configured (or set DD_APP_KEY)")
        })?;
        Self::new(&base_url, api_key, app_key, delay)
    }

    /// Build a client against an explicit base URL
    pub fn new(base_url: &str, api_key: &str, app_key: &str, delay: Duration) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            app_key: app_key.to_string(),
            delay,
            last_request: Cell::new(None),
            auth_warned: Cell::new(false),
        })
    }

    /// Services that called `service` in `env` over the last seven days,
    /// with call counts. Never fails: query errors are reported on
    /// stderr and produce an empty list.
    #[must_use]
    pub fn service_consumers(&self, env: &str, service: &str, limit: usize) -> Vec<(String, u64)> {
        let now = chrono::Utc::now().timestamp();
        let week_ago = now - WEEK_SECONDS;
        match self.apm_consumers(env, service, limit, week_ago, now) {
            Ok(consumers) => consumers,
            Err(err) => {
                eprintln!(
                    "Warning: Error querying Datadog for service {}: {:#}",
                    service, err
                );
                Vec::new()
            }
        }
    }

    fn apm_consumers(
        &self,
        env: &str,
        service: &str,
        limit: usize,
        start: i64,
        end: i64,
    ) -> Result<Vec<(String, u64)>> {
        let url = format!("{}/api/v1/apm/service/{}", self.base_url, service);
        let query = [
            ("start", start.to_string()),
            ("end", end.to_string()),
            ("env", env.to_string()),
        ];
        let mut retried = false;
        loop {
            self.pace();
            let response = self.send(&url, &query)?;
            match response.status() {
                StatusCode::BAD_REQUEST => {
                    let body = response.text().unwrap_or_default();
                    eprintln!("Warning: Bad request for service {}: {}", service, body.trim());
                    return self.trace_search_consumers(env, service, limit, start, end);
                }
                StatusCode::UNAUTHORIZED => {
                    if !self.auth_warned.get() {
                        self.auth_warned.set(true);
                        eprintln!(
                            "Error: Datadog authentication failed (401 Unauthorized). \
                             Check datadog_api_key and datadog_app_key."
                        );
                    }
                    return Ok(Vec::new());
                }
                StatusCode::NOT_FOUND => {
                    eprintln!("Warning: Service {} not found in APM", service);
                    return Ok(Vec::new());
                }
                StatusCode::TOO_MANY_REQUESTS if !retried => {
                    retried = true;
                    eprintln!(
                        "Warning: Datadog rate limit hit; waiting {} seconds...",
                        RATE_LIMIT_BACKOFF.as_secs()
                    );
                    std::thread::sleep(RATE_LIMIT_BACKOFF);
                }
                status if status.is_success() => {
                    let stats: ApmServiceStats = response
                        .json()
                        .with_context(|| format!("Failed to decode response from {}", url))?;
                    return Ok(upstream_calls(&stats, limit));
                }
                status => {
                    let body = response.text().unwrap_or_default();
                    anyhow::bail!("{} answered {}: {}", url, status, body.trim());
                }
            }
        }
    }

    fn trace_search_consumers(
        &self,
        env: &str,
        service: &str,
        limit: usize,
        start: i64,
        end: i64,
    ) -> Result<Vec<(String, u64)>> {
        let url = format!("{}/api/v1/trace/search", self.base_url);
        let query = [
            ("start", start.to_string()),
            ("end", end.to_string()),
            ("query", format!("env:{} @service.name:{}", env, service)),
            ("limit", limit.to_string()),
        ];
        let mut retried = false;
        loop {
            self.pace();
            let response = self.send(&url, &query)?;
            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS && !retried {
                retried = true;
                eprintln!(
                    "Warning: Datadog rate limit hit on trace search; waiting {} seconds...",
                    RATE_LIMIT_BACKOFF.as_secs()
                );
                std::thread::sleep(RATE_LIMIT_BACKOFF);
                continue;
            }
            if !status.is_success() {
                let body = response.text().unwrap_or_default();
                eprintln!(
                    "Warning: Trace search for {} failed: {} - {}",
                    service,
                    status,
                    body.trim()
                );
                return Ok(Vec::new());
            }
            let results: TraceSearchResults = response
                .json()
                .with_context(|| format!("Failed to decode response from {}", url))?;
            return Ok(span_calls(&results));
        }
    }

    fn send(&self, url: &str, query: &[(&str, String)]) -> Result<Response> {
        tracing::debug!("GET {}", url);
        self.http
            .get(url)
            .header("DD-API-KEY", &self.api_key)
            .header("DD-APPLICATION-KEY", &self.app_key)
            .query(query)
            .send()
            .with_context(|| format!("Request to {} failed", url))
    }

    /// Sleep out the remainder of the configured delay since the last request
    fn pace(&self) {
        if let Some(last) = self.last_request.get() {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                std::thread::sleep(self.delay - elapsed);
            }
        }
        self.last_request.set(Some(Instant::now()));
    }
}

/// Flatten the upstream callers out of either APM stats shape
fn upstream_calls(stats: &ApmServiceStats, limit: usize) -> Vec<(String, u64)> {
    let upstream = if stats.upstream_services.is_empty() {
        stats
            .dependencies
            .as_ref()
            .map_or(&[][..], |deps| deps.upstream.as_slice())
    } else {
        stats.upstream_services.as_slice()
    };
    upstream
        .iter()
        .take(limit)
        .filter_map(|svc| svc.caller().map(|name| (name.to_string(), svc.calls())))
        .collect()
}

/// Count calling services from trace spans, busiest first
fn span_calls(results: &TraceSearchResults) -> Vec<(String, u64)> {
    let traces = if results.traces.is_empty() {
        &results.data
    } else {
        &results.traces
    };
    let mut counts: BTreeMap<String, u64> = BTreeMap::new();
    for trace in traces {
        for span in &trace.spans {
            if let Some(service) = span.service.as_deref() {
                *counts.entry(service.to_string()).or_insert(0) += 1;
            }
        }
    }
    let mut calls: Vec<(String, u64)> = counts.into_iter().collect();
    calls.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    calls
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_calls_direct_shape() {
        let stats: ApmServiceStats = serde_json::from_value(serde_json::json!({
            "upstream_services": [
                {"service": "checkout", "count": 12},
                {"name": "billing", "requests": 4},
                {"service": "idle", "count": 0},
                {"count": 99}
            ]
        }))
        .unwrap();
        let calls = upstream_calls(&stats, 100);
        assert_eq!(
            calls,
            vec![
                ("checkout".to_string(), 12),
                ("billing".to_string(), 4),
                ("idle".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_upstream_calls_nested_shape_and_limit() {
        let stats: ApmServiceStats = serde_json::from_value(serde_json::json!({
            "dependencies": {
                "upstream": [
                    {"service": "a", "requests": 3},
                    {"service": "b", "requests": 2},
                    {"service": "c", "requests": 1}
                ]
            }
        }))
        .unwrap();
        let calls = upstream_calls(&stats, 2);
        assert_eq!(calls, vec![("a".to_string(), 3), ("b".to_string(), 2)]);
    }

    #[test]
    fn test_span_calls_count_and_order() {
        let results: TraceSearchResults = serde_json::from_value(serde_json::json!({
            "traces": [
                {"spans": [{"service": "web"}, {"service": "web"}, {"service": "auth"}]},
                {"spans": [{"service": "auth"}, {"service": "web"}, {}]}
            ]
        }))
        .unwrap();
        let calls = span_calls(&results);
        assert_eq!(calls, vec![("web".to_string(), 3), ("auth".to_string(), 2)]);
    }

    #[test]
    fn test_span_calls_reads_data_key() {
        let results: TraceSearchResults = serde_json::from_value(serde_json::json!({
            "data": [{"spans": [{"service": "cron"}]}]
        }))
        .unwrap();
        assert_eq!(span_calls(&results), vec![("cron".to_string(), 1)]);
    }
}
