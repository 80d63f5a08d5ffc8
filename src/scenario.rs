// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Scripted demonstration run.
//!
//! Two sessions each create a rule; the first rule is updated, both are
//! moved to the front of the rule order, and everything is cleaned up.

use crate::output;
use crate::rules::{self, StoredRule};
use crate::simulator::Simulator;
use tracing::info;

/// What the scripted run managed to do.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ScenarioSummary {
    pub existing_rules: usize,
    pub next_order: i64,
    pub first_rule: Option<String>,
    pub second_rule: Option<String>,
    pub updated: bool,
    pub reordered: bool,
}

pub async fn run(simulator: &mut Simulator) -> ScenarioSummary {
    let mut summary = ScenarioSummary::default();

    let first_session = simulator.create_session().await;
    let second_session = simulator.create_session().await;

    output::plain("\nFetching current rules...");
    if let Some(current) = simulator.get_rules().await {
        if !current.is_empty() {
            output::heading("\nCurrent Rules:");
            output::plain(output::pretty_json(&current));
        }
        summary.existing_rules = current.len();
        summary.next_order = rules::next_order(&current);
    }
    info!(
        existing = summary.existing_rules,
        next_order = summary.next_order,
        "Fetched existing rules"
    );

    simulator.switch_session(&first_session).await;
    let first_data = rules::hostname_rate_limit_rule();
    summary.first_rule = simulator.create_rule(&first_data).await;

    if let Some(rule_id) = &summary.first_rule {
        output::plain("\nUpdating rule...");
        let update = rules::url_update_rule(rule_id, first_data.order);
        summary.updated = simulator.update_rule(rule_id, &update).await;
    }

    simulator.switch_session(&second_session).await;
    summary.second_rule = simulator.create_rule(&rules::bot_protection_rule()).await;

    if let (Some(first), Some(second)) = (&summary.first_rule, &summary.second_rule) {
        output::plain("\nReordering rules...");
        if let Some(current) = simulator.get_rules().await {
            if !current.is_empty() {
                let ids = promoted_order(&current, &[first.as_str(), second.as_str()]);
                summary.reordered = simulator.reorder_rules(&ids).await;
            }
        }
    }

    simulator.session_info(Some(&first_session)).await;
    simulator.session_info(Some(&second_session)).await;

    output::plain("\nCleaning up...");
    simulator.cleanup_all_sessions().await;

    summary
}

/// Rule ids in server order with `promoted` moved to the front.
fn promoted_order(current: &[StoredRule], promoted: &[&str]) -> Vec<String> {
    let mut ids: Vec<String> = current.iter().map(|r| r.id().to_string()).collect();
    rules::promote_to_front(&mut ids, promoted);
    ids
}
