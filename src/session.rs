// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Session bookkeeping.
//!
//! A session tracks which rules a simulated configurator created so they
//! can be removed again. The registry is shared by every simulated client
//! in the process and is only ever touched under its lock.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Identifier value sent when no session is active.
pub const ANONYMOUS_HEADER_VALUE: &str = "simulator";

/// A simulated configurator session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    /// Rule ids created in this session, in creation order
    pub created_rules: Vec<String>,
    pub start_time: DateTime<Utc>,
}

impl Session {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_rules: Vec::new(),
            start_time: Utc::now(),
        }
    }

    /// Value of the session-identifying request header.
    pub fn header_value(&self) -> String {
        header_value_for(&self.id)
    }
}

/// Header value for a session id: `simulator-` plus its first 8 chars.
pub fn header_value_for(session_id: &str) -> String {
    let short: String = session_id.chars().take(8).collect();
    format!("{}-{}", ANONYMOUS_HEADER_VALUE, short)
}

/// Thread-safe session table.
#[derive(Debug, Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a fresh session and return a copy of it.
    pub async fn create(&self) -> Session {
        let session = Session::new();
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session.clone());
        debug!(session = %session.id, total = sessions.len(), "Session registered");
        session
    }

    pub async fn get(&self, id: &str) -> Option<Session> {
        self.sessions.read().await.get(id).cloned()
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Append a created rule to a session. Returns `false` when the
    /// session is no longer registered, leaving the rule untracked.
    pub async fn record_rule(&self, id: &str, rule_id: &str) -> bool {
        match self.sessions.write().await.get_mut(id) {
            Some(session) => {
                session.created_rules.push(rule_id.to_string());
                true
            }
            None => false,
        }
    }

    /// Drop the first occurrence of a rule from a session.
    pub async fn forget_rule(&self, id: &str, rule_id: &str) {
        if let Some(session) = self.sessions.write().await.get_mut(id) {
            if let Some(pos) = session.created_rules.iter().position(|r| r == rule_id) {
                session.created_rules.remove(pos);
            }
        }
    }

    pub async fn remove(&self, id: &str) -> Option<Session> {
        self.sessions.write().await.remove(id)
    }

    /// Snapshot of the registered session ids.
    pub async fn ids(&self) -> Vec<String> {
        self.sessions.read().await.keys().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
