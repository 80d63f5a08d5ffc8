// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! In-memory stand-in for the rate limiter configuration API.

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::{Request, Respond, ResponseTemplate};

/// One request as seen by the fake.
#[derive(Debug, Clone)]
pub struct LoggedRequest {
    pub method: String,
    pub path: String,
    pub session: Option<String>,
    pub content_type: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    /// Rules in their current order
    rules: Vec<Value>,
    /// Every stored revision per rule id
    history: HashMap<String, Vec<Value>>,
    requests: Vec<LoggedRequest>,
    /// Rule ids of each reorder request, in the order sent
    reorders: Vec<Vec<String>>,
    /// Raw bodies of reorder requests
    reorder_bodies: Vec<Value>,
    /// Raw bodies of rule updates
    update_bodies: Vec<Value>,
    fail_deletes: bool,
    delay: Option<Duration>,
    create_delay: Option<Duration>,
}

/// Shared, cloneable fake API.
#[derive(Debug, Clone, Default)]
pub struct FakeApi {
    state: Arc<Mutex<State>>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with rules that exist before the simulator runs.
    pub fn with_rules(rules: Vec<Value>) -> Self {
        let api = Self::new();
        {
            let mut state = api.state.lock().unwrap();
            for rule in rules {
                let id = rule["id"].as_str().unwrap().to_string();
                state.history.insert(id, vec![rule.clone()]);
                state.rules.push(rule);
            }
        }
        api
    }

    /// Answer every DELETE with a server error.
    pub fn fail_deletes(self) -> Self {
        self.state.lock().unwrap().fail_deletes = true;
        self
    }

    /// Delay every response.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().delay = Some(delay);
        self
    }

    /// Delay only `POST /config` responses. The rule is stored as soon as
    /// the request arrives.
    pub fn with_create_delay(self, delay: Duration) -> Self {
        self.state.lock().unwrap().create_delay = Some(delay);
        self
    }

    pub fn rule_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .rules
            .iter()
            .map(|r| r["id"].as_str().unwrap_or_default().to_string())
            .collect()
    }

    pub fn rule(&self, id: &str) -> Option<Value> {
        self.state
            .lock()
            .unwrap()
            .rules
            .iter()
            .find(|r| r["id"] == id)
            .cloned()
    }

    pub fn requests(&self) -> Vec<LoggedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn reorders(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().reorders.clone()
    }

    pub fn reorder_bodies(&self) -> Vec<Value> {
        self.state.lock().unwrap().reorder_bodies.clone()
    }

    pub fn update_bodies(&self) -> Vec<Value> {
        self.state.lock().unwrap().update_bodies.clone()
    }
}

impl Respond for FakeApi {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let mut state = self.state.lock().unwrap();
        let method = request.method.as_str().to_string();
        let path = request.url.path().to_string();
        let header = |name: &str| {
            request
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        state.requests.push(LoggedRequest {
            method: method.clone(),
            path: path.clone(),
            session: header("rate-limiter-configurator"),
            content_type: header("content-type"),
        });

        let response = if header("content-type").as_deref() != Some("application/json") {
            ResponseTemplate::new(415).set_body_string("expected application/json")
        } else {
            let body: Value = serde_json::from_slice(&request.body).unwrap_or(Value::Null);
            let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
            route(&mut state, &method, &segments, body)
        };

        let delay = match (method.as_str(), path.as_str()) {
            ("POST", "/config") => state.create_delay.or(state.delay),
            _ => state.delay,
        };
        match delay {
            Some(delay) => response.set_delay(delay),
            None => response,
        }
    }
}

fn route(state: &mut State, method: &str, segments: &[&str], body: Value) -> ResponseTemplate {
    match (method, segments) {
        ("POST", ["config"]) => create(state, body),
        ("GET", ["config"]) => ResponseTemplate::new(200).set_body_json(json!({ "rules": state.rules })),
        ("PUT", ["config", "reorder"]) => reorder(state, body),
        ("GET", ["rules", id]) => match find(state, id) {
            Some(idx) => ResponseTemplate::new(200).set_body_json(&state.rules[idx]),
            None => not_found(id),
        },
        ("PUT", ["rules", id]) => update(state, id, body),
        ("DELETE", ["rules", id]) => {
            if state.fail_deletes {
                return ResponseTemplate::new(500).set_body_string("delete disabled");
            }
            match find(state, id) {
                Some(idx) => {
                    state.rules.remove(idx);
                    ResponseTemplate::new(204)
                }
                None => not_found(id),
            }
        }
        ("PUT", ["rules", id, "revert"]) => revert(state, id, body),
        ("GET", ["rules", id, "versions"]) => match state.history.get(*id) {
            Some(versions) => {
                let summary: Vec<Value> = versions
                    .iter()
                    .map(|v| json!({ "version": v["version"], "name": v["name"] }))
                    .collect();
                ResponseTemplate::new(200).set_body_json(json!({ "versions": summary }))
            }
            None => not_found(id),
        },
        _ => ResponseTemplate::new(404).set_body_string("no such route"),
    }
}

fn find(state: &State, id: &str) -> Option<usize> {
    state.rules.iter().position(|r| r["id"] == id)
}

fn not_found(id: &str) -> ResponseTemplate {
    ResponseTemplate::new(404).set_body_json(json!({ "error": format!("rule {} not found", id) }))
}

fn create(state: &mut State, mut rule: Value) -> ResponseTemplate {
    let Some(id) = rule["id"].as_str().map(str::to_string) else {
        return ResponseTemplate::new(400).set_body_string("missing id");
    };
    rule["version"] = json!(0);
    rule["createdAt"] = json!("2024-01-01T00:00:00Z");
    state.history.insert(id, vec![rule.clone()]);
    state.rules.push(rule.clone());
    ResponseTemplate::new(201).set_body_json(rule)
}

fn update(state: &mut State, id: &str, mut rule: Value) -> ResponseTemplate {
    state.update_bodies.push(rule.clone());
    let Some(idx) = find(state, id) else {
        return not_found(id);
    };
    let next = state.rules[idx]["version"].as_u64().unwrap_or(0) + 1;
    rule["version"] = json!(next);
    state.rules[idx] = rule.clone();
    state.history.entry(id.to_string()).or_default().push(rule.clone());
    ResponseTemplate::new(200).set_body_json(rule)
}

fn revert(state: &mut State, id: &str, body: Value) -> ResponseTemplate {
    let Some(idx) = find(state, id) else {
        return not_found(id);
    };
    let target = body["targetVersion"].as_u64().unwrap_or(0);
    let history = state.history.entry(id.to_string()).or_default();
    let Some(mut restored) = history.iter().find(|v| v["version"] == target).cloned() else {
        return ResponseTemplate::new(400).set_body_string("unknown version");
    };
    let next = history.len() as u64;
    restored["version"] = json!(next);
    restored["order"] = state.rules[idx]["order"].clone();
    history.push(restored.clone());
    state.rules[idx] = restored.clone();
    ResponseTemplate::new(200).set_body_json(restored)
}

fn reorder(state: &mut State, body: Value) -> ResponseTemplate {
    state.reorder_bodies.push(body.clone());
    let sent = body["rules"].as_array().cloned().unwrap_or_default();
    let ids: Vec<String> = sent
        .iter()
        .filter_map(|r| r["id"].as_str().map(str::to_string))
        .collect();

    let mut reordered = Vec::with_capacity(state.rules.len());
    for (position, id) in ids.iter().enumerate() {
        if let Some(idx) = find(state, id) {
            let mut rule = state.rules.remove(idx);
            rule["order"] = json!(position);
            reordered.push(rule);
        }
    }
    reordered.append(&mut state.rules);
    state.rules = reordered;
    state.reorders.push(ids);

    ResponseTemplate::new(200).set_body_json(json!({ "message": "Rules reordered", "rules": state.rules }))
}
