// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP client for the rate limiter configuration API.
//!
//! Every request carries `Content-Type: application/json` and the
//! session-identifying header. The header value is supplied per call so a
//! single client can be shared by concurrent sessions.

use crate::config::Config;
use crate::error::{Result, SimulatorError};
use crate::rules::{Rule, StoredRule};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

/// Rule list envelope returned by `GET /config`.
#[derive(Debug, Default, Deserialize)]
struct RuleList {
    #[serde(default)]
    rules: Vec<StoredRule>,
}

/// One stored revision of a rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleVersion {
    #[serde(default)]
    pub version: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `GET /rules/{id}/versions` answers either a bare list or a wrapper.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum VersionsResponse {
    List(Vec<RuleVersion>),
    Wrapped { versions: Vec<RuleVersion> },
}

/// Rate limiter configuration API client.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    session_header: String,
    client: reqwest::Client,
}

impl ApiClient {
    /// Create a client from the simulator configuration.
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            base_url: config.trimmed_base_url().to_string(),
            session_header: config.session_header.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST /config`
    pub async fn create_rule(&self, session: &str, rule: &Rule) -> Result<StoredRule> {
        let response = self
            .send(self.request(Method::POST, "/config", session).json(rule))
            .await?;
        let created: StoredRule = response.json().await?;
        if created.id().is_empty() {
            return Err(SimulatorError::MissingRuleId);
        }
        Ok(created)
    }

    /// `GET /config`
    pub async fn get_rules(&self, session: &str) -> Result<Vec<StoredRule>> {
        let response = self
            .send(self.request(Method::GET, "/config", session))
            .await?;
        let list: RuleList = response.json().await?;
        Ok(list.rules)
    }

    /// `GET /rules/{id}`
    pub async fn get_rule(&self, session: &str, rule_id: &str) -> Result<StoredRule> {
        let path = format!("/rules/{}", rule_id);
        let response = self.send(self.request(Method::GET, &path, session)).await?;
        Ok(response.json().await?)
    }

    /// `PUT /rules/{id}`
    pub async fn update_rule(&self, session: &str, rule_id: &str, body: &Value) -> Result<Value> {
        let path = format!("/rules/{}", rule_id);
        let response = self
            .send(self.request(Method::PUT, &path, session).json(body))
            .await?;
        json_or_null(response).await
    }

    /// `DELETE /rules/{id}`
    pub async fn delete_rule(&self, session: &str, rule_id: &str) -> Result<()> {
        let path = format!("/rules/{}", rule_id);
        self.send(self.request(Method::DELETE, &path, session))
            .await?;
        Ok(())
    }

    /// `PUT /config/reorder` with the full rule objects in their new order.
    pub async fn reorder_rules(&self, session: &str, rules: &[StoredRule]) -> Result<Value> {
        let response = self
            .send(
                self.request(Method::PUT, "/config/reorder", session)
                    .json(&json!({ "rules": rules })),
            )
            .await?;
        json_or_null(response).await
    }

    /// `PUT /rules/{id}/revert`
    pub async fn revert_rule(&self, session: &str, rule_id: &str, version: u64) -> Result<Value> {
        let path = format!("/rules/{}/revert", rule_id);
        let response = self
            .send(
                self.request(Method::PUT, &path, session)
                    .json(&json!({ "targetVersion": version })),
            )
            .await?;
        json_or_null(response).await
    }

    /// `GET /rules/{id}/versions`
    pub async fn rule_versions(&self, session: &str, rule_id: &str) -> Result<Vec<RuleVersion>> {
        let path = format!("/rules/{}/versions", rule_id);
        let response = self.send(self.request(Method::GET, &path, session)).await?;
        Ok(match response.json::<VersionsResponse>().await? {
            VersionsResponse::List(versions) => versions,
            VersionsResponse::Wrapped { versions } => versions,
        })
    }

    fn request(&self, method: Method, path: &str, session: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, session, "API request");
        self.client
            .request(method, url)
            .header(CONTENT_TYPE, "application/json")
            .header(self.session_header.as_str(), session)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            let body = response.text().await.unwrap_or_default();
            debug!(%status, body = %body, "API error response");
            Err(SimulatorError::Status { status, body })
        }
    }
}

async fn json_or_null(response: Response) -> Result<Value> {
    let text = response.text().await?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_str(&text)?)
}
