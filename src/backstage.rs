// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2025 Jonathan D.A. Jewell
//! Backstage catalog and Soundcheck client

use crate::config::Config;
use crate::types::{ApplicationInfo, CatalogEntities, Entity, SoundcheckResults, TeamApplications};
use anyhow::{Context, Result};
use reqwest::blocking::{Client, Response};
use std::time::Duration;

/// Blocking client for the Backstage catalog and Soundcheck APIs
pub struct BackstageClient {
    http: Client,
    base_url: String,
    token: Option<String>,
}

/// Domain facts gathered while resolving a team's parent ref
struct DomainInfo {
    name: String,
    title: String,
    business_unit: Option<String>,
    product: Option<String>,
}

impl BackstageClient {
    /// Build a client from the loaded configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let base_url = config.backstage_server.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "backstage_server is not configured. Run 'tickwheel config set backstage_server <URL>'"
            )
        })?;
        Self::new(base_url, config.backstage_token.as_deref())
    }

    /// Build a client against an explicit base URL
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(str::to_string),
        })
    }

    fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("GET {}", url);
        let mut request = self.http.get(&url).query(query);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .with_context(|| format!("Request to {} failed", url))?;
        let response = check(response, &url)?;
        response
            .json()
            .with_context(|| format!("Failed to decode response from {}", url))
    }

    /// All groups in the catalog
    pub fn groups(&self) -> Result<Vec<Entity>> {
        let entities: CatalogEntities =
            self.get_json("/api/catalog/entities", &[("filter", "kind=group".to_string())])?;
        Ok(entities.into_vec())
    }

    /// All components in the catalog
    pub fn components(&self) -> Result<Vec<Entity>> {
        let entities: CatalogEntities = self.get_json(
            "/api/catalog/entities",
            &[("filter", "kind=component".to_string())],
        )?;
        Ok(entities.into_vec())
    }

    /// Fetch one entity by kind, namespace, and name. Lookup failures of
    /// any sort resolve to `None`; callers fall through to their next
    /// source of the same fact.
    #[must_use]
    pub fn entity_by_name(&self, kind: &str, namespace: &str, name: &str) -> Option<Entity> {
        let path = format!("/api/catalog/entities/by-name/{}/{}/{}", kind, namespace, name);
        match self.get_json(&path, &[]) {
            Ok(entity) => Some(entity),
            Err(err) => {
                tracing::debug!("Entity lookup {} failed: {:#}", path, err);
                None
            }
        }
    }

    /// Soundcheck check results for an entity ref
    pub fn soundcheck_results(&self, entity_ref: &str) -> Result<SoundcheckResults> {
        self.get_json(
            "/api/soundcheck/results",
            &[("entityRef", entity_ref.to_string())],
        )
    }

    fn domain_info(&self, domain_ref: &str) -> Option<DomainInfo> {
        let (namespace, name) = split_entity_ref(domain_ref)?;
        let entity = self.entity_by_name("domain", namespace, name)?;
        let annotations = &entity.metadata.annotations;
        let spec = &entity.spec;

        // A subdomain's business unit is its parent domain's title.
        let mut business_unit = None;
        let parent_ref = spec.owner_str().map(str::to_string).or_else(|| {
            spec.subdomain_of
                .as_ref()
                .map(|sub| format!("domain:{}/{}", namespace, sub))
        });
        if let Some(parent_ref) = parent_ref {
            if parent_ref.starts_with("domain:") {
                let parent_name = parent_ref.rsplit('/').next().unwrap_or(&parent_ref);
                if let Some(parent) = self.entity_by_name("domain", namespace, parent_name) {
                    business_unit = non_empty(parent.title().to_string());
                }
            }
        }
        let business_unit = business_unit
            .or_else(|| lookup(annotations, "backstage.io/business-unit"))
            .or_else(|| lookup(annotations, "business-unit"))
            .or_else(|| spec.business_unit.clone());

        let product = lookup(annotations, "backstage.io/product")
            .or_else(|| lookup(annotations, "product"))
            .or_else(|| spec.product.clone());

        Some(DomainInfo {
            name: entity.metadata.name.clone(),
            title: entity.title().to_string(),
            business_unit,
            product,
        })
    }

    /// Assemble team metadata: labels first, the parent domain entity as
    /// fallback, annotations last. Kebab-case values come back
    /// title-cased, and a bare parent segment becomes an uppercased
    /// domain name.
    #[must_use]
    pub fn team_info(&self, team: &Entity) -> TeamApplications {
        let metadata = &team.metadata;
        let spec = &team.spec;
        let labels = &metadata.labels;
        let annotations = &metadata.annotations;

        let mut business_unit =
            lookup(labels, "business-unit").or_else(|| lookup(labels, "businessUnit"));
        let mut product = lookup(labels, "product");
        let mut platform = lookup(labels, "platform");
        let parent = spec.parent.clone();

        let mut domain = None;
        if let Some(parent_ref) = parent.as_deref() {
            if parent_ref.starts_with("domain:") {
                if let Some(info) = self.domain_info(parent_ref) {
                    domain = non_empty(info.title).or_else(|| non_empty(info.name));
                    if business_unit.is_none() {
                        business_unit = info.business_unit;
                    }
                    if product.is_none() {
                        product = info.product;
                    }
                }
            }
        }

        // Without a resolvable domain entity, fall back to the ref itself.
        if domain.is_none() {
            if let Some(parent_ref) = parent.as_deref() {
                if parent_ref.starts_with("domain:") {
                    let part = match parent_ref.split_once('/') {
                        Some((_, tail)) => tail,
                        None => parent_ref.split_once(':').map_or("", |(_, tail)| tail),
                    };
                    if !part.is_empty() && part != "default" {
                        domain = Some(part.to_uppercase());
                    }
                }
            }
        }

        let business_unit = business_unit
            .or_else(|| lookup(annotations, "backstage.io/business-unit"))
            .or_else(|| lookup(annotations, "business-unit"))
            .or_else(|| lookup(annotations, "businessUnit"));
        let product = product
            .or_else(|| lookup(annotations, "backstage.io/product"))
            .or_else(|| lookup(annotations, "product"));
        let platform = platform
            .or_else(|| lookup(annotations, "backstage.io/platform"))
            .or_else(|| lookup(annotations, "platform"));

        TeamApplications {
            team_name: metadata.name.clone(),
            team_title: team.title().to_string(),
            description: metadata.description.clone().unwrap_or_default(),
            domain,
            business_unit: business_unit.map(|value| title_case(&value)),
            product: product.map(|value| capitalize(&value)),
            platform: platform.map(|value| title_case(&value)),
            parent,
            team_type: spec.entity_type.clone(),
            application_count: 0,
            applications: Vec::new(),
        }
    }
}

/// Extract the report fields from an application component entity
#[must_use]
pub fn application_info(component: &Entity) -> ApplicationInfo {
    let metadata = &component.metadata;
    let spec = &component.spec;
    let labels = &metadata.labels;

    let name = if metadata.name.is_empty() {
        "Unknown".to_string()
    } else {
        metadata.name.clone()
    };
    let platform = labels.get("platform").cloned();
    ApplicationInfo {
        title: metadata.title.clone().unwrap_or_else(|| name.clone()),
        name,
        app_type: spec.entity_type.clone().unwrap_or_else(|| "Unknown".to_string()),
        lifecycle: spec.lifecycle.clone().unwrap_or_else(|| "Unknown".to_string()),
        system: spec.system.clone().or_else(|| platform.clone()),
        platform,
        product: labels.get("product").cloned(),
        business_unit: labels.get("business-unit").cloned(),
        description: metadata.description.clone().unwrap_or_default(),
    }
}

/// True when a component owner ref names the team, in any accepted form,
/// case-insensitively
#[must_use]
pub fn owner_matches(owner: &str, team_name: &str) -> bool {
    if owner.is_empty() {
        return false;
    }
    let owner = owner.to_lowercase();
    let team = team_name.to_lowercase();
    owner == format!("group:default/{}", team)
        || owner == format!("group:{}", team)
        || owner == team
        || owner.ends_with(&format!("/{}", team))
        || owner.ends_with(&format!(":{}", team))
}

/// Split `domain:default/iam` into (namespace, name); refs missing either
/// separator are not entity refs
fn split_entity_ref(reference: &str) -> Option<(&str, &str)> {
    if !reference.contains(':') || !reference.contains('/') {
        return None;
    }
    let name = reference.rsplit('/').next()?;
    let namespace = reference.split('/').next()?.rsplit(':').next()?;
    Some((namespace, name))
}

fn lookup(map: &std::collections::BTreeMap<String, String>, key: &str) -> Option<String> {
    map.get(key).filter(|value| !value.is_empty()).cloned()
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

/// Title-case a kebab or space separated value: `event-cloud` to `Event Cloud`
fn title_case(value: &str) -> String {
    value
        .replace('-', " ")
        .split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Uppercase the first character, lowercasing the rest: `essentials` to `Essentials`
fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
        None => String::new(),
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
