// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Rate limiting rule payloads.
//!
//! [`Rule`] is the typed shape of the rules this tool builds itself.
//! Rules fetched from the server are kept verbatim as [`StoredRule`], so
//! update and reorder payloads send back exactly what the server holds,
//! nested fields and unusual condition shapes included.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// A rate limiting rule built by the simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    pub version: u64,
    pub name: String,
    pub description: String,
    pub rate_limit: RateLimit,
    pub fingerprint: Fingerprint,
    pub initial_match: InitialMatch,
    pub else_if_actions: Vec<Value>,
    pub id: String,
    pub order: i64,
}

/// A rule as returned by the server, field for field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StoredRule(Map<String, Value>);

impl StoredRule {
    /// Rule id, empty when the server sent none.
    pub fn id(&self) -> &str {
        self.0.get("id").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    pub fn version(&self) -> Option<u64> {
        self.0.get("version").and_then(Value::as_u64)
    }

    pub fn order(&self) -> Option<i64> {
        self.0.get("order").and_then(Value::as_i64)
    }

    /// Overwrite `order` and leave every other field untouched.
    pub fn set_order(&mut self, order: i64) {
        self.0.insert("order".to_string(), Value::from(order));
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for StoredRule {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateLimit {
    pub limit: u64,
    /// Window length in seconds
    pub period: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    #[serde(default)]
    pub parameters: Vec<FingerprintParameter>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintParameter {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub header_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitialMatch {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub action: Action,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: String,
}

impl Default for Action {
    fn default() -> Self {
        Self::rate_limit()
    }
}

impl Action {
    pub fn rate_limit() -> Self {
        Self {
            kind: "rateLimit".to_string(),
        }
    }
}

impl FingerprintParameter {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            header_name: None,
        }
    }
}

impl Condition {
    fn new(field: &str, operator: &str, value: &str) -> Self {
        Self {
            field: field.to_string(),
            operator: operator.to_string(),
            value: Value::String(value.to_string()),
        }
    }
}

/// Hostname-matching rule, 100 requests per minute.
pub fn hostname_rate_limit_rule() -> Rule {
    Rule {
        version: 0,
        name: "Test URL Hostname Rate Limit".to_string(),
        description: "Rate limit test for hostname matching".to_string(),
        rate_limit: RateLimit {
            limit: 100,
            period: 60,
        },
        fingerprint: Fingerprint {
            parameters: vec![FingerprintParameter::named("url.hostname")],
        },
        initial_match: InitialMatch {
            conditions: vec![Condition::new(
                "url.hostname",
                "eq",
                "httpbun-nl.erfianugrah.com",
            )],
            action: Action::rate_limit(),
        },
        else_if_actions: Vec::new(),
        id: Uuid::new_v4().to_string(),
        order: 3,
    }
}

/// POST-method rule keyed on client IP, 10 requests per 10 minutes.
pub fn bot_protection_rule() -> Rule {
    Rule {
        version: 0,
        name: "Test Bot Protection".to_string(),
        description: "Rate limit test for method matching".to_string(),
        rate_limit: RateLimit {
            limit: 10,
            period: 600,
        },
        fingerprint: Fingerprint {
            parameters: vec![FingerprintParameter::named("clientIP")],
        },
        initial_match: InitialMatch {
            conditions: vec![Condition::new("method", "eq", "POST")],
            action: Action::rate_limit(),
        },
        else_if_actions: Vec::new(),
        id: Uuid::new_v4().to_string(),
        order: 4,
    }
}

/// Replacement body for an existing rule.
pub fn url_update_rule(rule_id: &str, order: i64) -> Rule {
    Rule {
        version: 1,
        name: "Test URL Update".to_string(),
        description: "Test updating URL rule".to_string(),
        rate_limit: RateLimit {
            limit: 123,
            period: 10,
        },
        fingerprint: Fingerprint {
            parameters: vec![
                FingerprintParameter::named("url"),
                FingerprintParameter {
                    name: "headers.name".to_string(),
                    header_name: Some("456".to_string()),
                },
            ],
        },
        initial_match: InitialMatch {
            conditions: vec![Condition::new("url", "starts_with", "www")],
            action: Action::rate_limit(),
        },
        else_if_actions: Vec::new(),
        id: rule_id.to_string(),
        order,
    }
}

/// Shallow-merge `update` over the server's copy; keys present in
/// `update` win, everything else the server holds is kept as is.
pub fn merge_rule(current: &StoredRule, update: &Rule) -> serde_json::Result<Value> {
    let mut merged = current.as_map().clone();
    if let Value::Object(overlay) = serde_json::to_value(update)? {
        merged.extend(overlay);
    }
    Ok(Value::Object(merged))
}

/// Move each promoted id to the front of `ids`, in turn.
///
/// The last promoted id present in the list ends up first. Ids that are
/// not in the list are ignored.
pub fn promote_to_front(ids: &mut Vec<String>, promoted: &[&str]) {
    for id in promoted {
        if let Some(pos) = ids.iter().position(|existing| existing == id) {
            let moved = ids.remove(pos);
            ids.insert(0, moved);
        }
    }
}

/// Order value just past the highest existing one.
pub fn next_order(rules: &[StoredRule]) -> i64 {
    rules
        .iter()
        .filter_map(StoredRule::order)
        .max()
        .map_or(0, |max| max + 1)
}
