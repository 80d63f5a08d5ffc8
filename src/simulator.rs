// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Session-aware simulator over the configuration API.
//!
//! Operations here log and continue: API failures are printed and turned
//! into `false` / `None`, never propagated.

use crate::client::{ApiClient, RuleVersion};
use crate::error::SimulatorError;
use crate::output;
use crate::rules::{self, Rule, StoredRule};
use crate::session::{header_value_for, Session, SessionRegistry, ANONYMOUS_HEADER_VALUE};
use chrono::Local;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// A simulated configurator client with its own current session.
#[derive(Debug)]
pub struct Simulator {
    client: Arc<ApiClient>,
    registry: SessionRegistry,
    current: Option<String>,
    print_responses: bool,
}

impl Simulator {
    pub fn new(client: ApiClient, print_responses: bool) -> Self {
        Self {
            client: Arc::new(client),
            registry: SessionRegistry::new(),
            current: None,
            print_responses,
        }
    }

    /// A new simulator sharing this one's client and session registry,
    /// with no current session.
    pub fn fork(&self) -> Self {
        Self {
            client: Arc::clone(&self.client),
            registry: self.registry.clone(),
            current: None,
            print_responses: self.print_responses,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn current_session_id(&self) -> Option<&str> {
        self.current.as_deref()
    }

    /// Create a new session and make it current.
    pub async fn create_session(&mut self) -> String {
        let session = self.registry.create().await;
        self.current = Some(session.id.clone());
        output::success(format!("Created new session: {}", session.id));
        session.id
    }

    pub async fn switch_session(&mut self, session_id: &str) {
        if !self.registry.contains(session_id).await {
            output::failure(format!("Session {} not found", session_id));
            return;
        }
        self.current = Some(session_id.to_string());
        output::success(format!("Switched to session: {}", session_id));
    }

    /// Snapshot of the current session, if there is one.
    pub async fn current_session(&self) -> Option<Session> {
        match &self.current {
            Some(id) => self.registry.get(id).await,
            None => {
                output::failure(SimulatorError::NoActiveSession.to_string());
                None
            }
        }
    }

    fn header(&self) -> String {
        self.current
            .as_deref()
            .map(header_value_for)
            .unwrap_or_else(|| ANONYMOUS_HEADER_VALUE.to_string())
    }

    /// Create a rule in the current session and record its id.
    ///
    /// If the session was removed while the request was in flight, the
    /// rule is deleted straight away instead of being left untracked.
    pub async fn create_rule(&self, rule: &Rule) -> Option<String> {
        let session = self.current_session().await?;
        match self.client.create_rule(&session.header_value(), rule).await {
            Ok(created) => {
                let rule_id = created.id().to_string();
                if !self.registry.record_rule(&session.id, &rule_id).await {
                    warn!(
                        session = %session.id,
                        rule = %rule_id,
                        "Rule created after its session was removed, deleting it"
                    );
                    self.discard_orphan(&session, &rule_id).await;
                    return None;
                }
                info!(session = %session.id, rule = %rule_id, "Rule created");
                output::success(format!("Created rule: {}", rule_id));
                if self.print_responses {
                    output::response(&created);
                }
                Some(rule_id)
            }
            Err(SimulatorError::MissingRuleId) => {
                warn!(session = %session.id, "Create response carried no rule id");
                None
            }
            Err(e) => {
                report("creating rule", &e);
                None
            }
        }
    }

    async fn discard_orphan(&self, session: &Session, rule_id: &str) {
        match self.client.delete_rule(&session.header_value(), rule_id).await {
            Ok(()) => {
                info!(session = %session.id, rule = %rule_id, "Orphaned rule deleted");
            }
            Err(e) => {
                error!(
                    session = %session.id,
                    rule = %rule_id,
                    error = %e,
                    "Orphaned rule could not be deleted"
                );
                output::failure(format!("Rule {} left on the server: {}", rule_id, e));
            }
        }
    }

    pub async fn get_rules(&self) -> Option<Vec<StoredRule>> {
        match self.client.get_rules(&self.header()).await {
            Ok(rules) => {
                output::success(format!("Retrieved {} rules", rules.len()));
                Some(rules)
            }
            Err(e) => {
                report("getting rules", &e);
                None
            }
        }
    }

    pub async fn get_rule(&self, rule_id: &str) -> Option<StoredRule> {
        match self.client.get_rule(&self.header(), rule_id).await {
            Ok(rule) => {
                match rule.version() {
                    Some(version) => output::success(format!(
                        "Retrieved rule: {} (version {})",
                        rule.id(),
                        version
                    )),
                    None => output::success(format!("Retrieved rule: {}", rule.id())),
                }
                Some(rule)
            }
            Err(e) => {
                report("getting rule", &e);
                None
            }
        }
    }

    /// Merge `update` over the server's copy of the rule and PUT it back.
    pub async fn update_rule(&self, rule_id: &str, update: &Rule) -> bool {
        let Some(current_rules) = self.get_rules().await else {
            return false;
        };
        let Some(current) = current_rules.iter().find(|r| r.id() == rule_id) else {
            output::failure(SimulatorError::RuleNotFound(rule_id.to_string()).to_string());
            return false;
        };

        let result = match rules::merge_rule(current, update) {
            Ok(body) => self.client.update_rule(&self.header(), rule_id, &body).await,
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(response) => {
                info!(rule = %rule_id, "Rule updated");
                output::success(format!("Updated rule: {}", rule_id));
                if self.print_responses {
                    output::response(&response);
                }
                true
            }
            Err(e) => {
                report("updating rule", &e);
                false
            }
        }
    }

    /// Delete a rule on behalf of the current session.
    pub async fn delete_rule(&self, rule_id: &str) -> bool {
        let Some(session) = self.current_session().await else {
            return false;
        };
        self.delete_rule_in(&session, rule_id).await
    }

    async fn delete_rule_in(&self, session: &Session, rule_id: &str) -> bool {
        match self.client.delete_rule(&session.header_value(), rule_id).await {
            Ok(()) => {
                self.registry.forget_rule(&session.id, rule_id).await;
                info!(session = %session.id, rule = %rule_id, "Rule deleted");
                output::success(format!("Deleted rule: {}", rule_id));
                true
            }
            Err(e) => {
                report("deleting rule", &e);
                false
            }
        }
    }

    /// Send the given ids as the new rule order. Ids unknown to the server
    /// are skipped; each sent rule is the server's copy with `order` set to
    /// its index.
    pub async fn reorder_rules(&self, rule_ids: &[String]) -> bool {
        let current_rules = match self.get_rules().await {
            Some(rules) if !rules.is_empty() => rules,
            _ => return false,
        };

        let reordered: Vec<StoredRule> = rule_ids
            .iter()
            .filter_map(|id| current_rules.iter().find(|r| r.id() == id))
            .cloned()
            .enumerate()
            .map(|(idx, mut rule)| {
                rule.set_order(idx as i64);
                rule
            })
            .collect();

        match self.client.reorder_rules(&self.header(), &reordered).await {
            Ok(response) => {
                info!(count = reordered.len(), "Rules reordered");
                output::success("Rules reordered successfully");
                if self.print_responses {
                    output::response(&response);
                }
                true
            }
            Err(e) => {
                report("reordering rules", &e);
                false
            }
        }
    }

    pub async fn revert_rule(&self, rule_id: &str, version: u64) -> bool {
        match self.client.revert_rule(&self.header(), rule_id, version).await {
            Ok(response) => {
                info!(rule = %rule_id, version, "Rule reverted");
                output::success(format!("Reverted rule {} to version {}", rule_id, version));
                if self.print_responses {
                    output::response(&response);
                }
                true
            }
            Err(e) => {
                report("reverting rule", &e);
                false
            }
        }
    }

    pub async fn rule_versions(&self, rule_id: &str) -> Option<Vec<RuleVersion>> {
        match self.client.rule_versions(&self.header(), rule_id).await {
            Ok(versions) => {
                output::success(format!(
                    "Retrieved {} versions of rule {}",
                    versions.len(),
                    rule_id
                ));
                Some(versions)
            }
            Err(e) => {
                report("getting rule versions", &e);
                None
            }
        }
    }

    /// Delete every rule a session created. Returns whether every delete
    /// succeeded.
    ///
    /// With an explicit id the session is also removed from the registry
    /// (and cleared if current). Without one, the current session's rules
    /// are deleted and the session is kept.
    pub async fn cleanup_session(&mut self, session_id: Option<&str>) -> bool {
        let session = match session_id {
            Some(id) => match self.registry.get(id).await {
                Some(session) => session,
                None => {
                    output::failure(SimulatorError::SessionNotFound(id.to_string()).to_string());
                    return false;
                }
            },
            None => match self.current_session().await {
                Some(session) => session,
                None => return false,
            },
        };

        output::notice(format!("Cleaning up session: {}", session.id));
        let mut undeleted = Vec::new();
        for rule_id in &session.created_rules {
            if !self.delete_rule_in(&session, rule_id).await {
                undeleted.push(rule_id.clone());
            }
        }

        if let Some(id) = session_id {
            if let Some(removed) = self.registry.remove(id).await {
                // Rules recorded while the deletes above were in flight.
                let late = removed
                    .created_rules
                    .iter()
                    .filter(|r| !session.created_rules.contains(r));
                for rule_id in late {
                    if !self.delete_rule_in(&removed, rule_id).await {
                        undeleted.push(rule_id.clone());
                    }
                }
            }
            if !undeleted.is_empty() {
                warn!(
                    session = %id,
                    leftover = ?undeleted,
                    "Session removed with undeleted rules"
                );
            }
            if self.current.as_deref() == Some(id) {
                self.current = None;
            }
            output::success(format!("Session {} cleaned up and removed", id));
        }
        undeleted.is_empty()
    }

    pub async fn cleanup_all_sessions(&mut self) {
        output::notice("Cleaning up all sessions");
        let ids = self.registry.ids().await;
        debug!(count = ids.len(), "Cleaning up sessions");
        for id in ids {
            self.cleanup_session(Some(&id)).await;
        }
        output::success("All sessions cleaned up");
    }

    /// Print a summary of a session (the current one by default).
    pub async fn session_info(&self, session_id: Option<&str>) {
        let session = match session_id {
            Some(id) => self.registry.get(id).await,
            None => self.current_session().await,
        };
        let Some(session) = session else {
            return;
        };

        output::plain("");
        output::heading("Session Information:");
        output::plain(format!("Session ID: {}", session.id));
        output::plain(format!(
            "Created: {}",
            session
                .start_time
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S")
        ));
        output::plain(format!("Rules created: {}", session.created_rules.len()));
        output::plain("Rule IDs:");
        for rule_id in &session.created_rules {
            output::plain(format!("  - {}", rule_id));
        }
    }
}

fn report(context: &str, err: &SimulatorError) {
    warn!(error = %err, "Failed {}", context);
    output::failure(format!("Error {}: {}", context, err));
    if let Some(body) = err.response_body() {
        output::failure(format!("Response: {}", body));
    }
}
