// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Per-session and per-turn state passed into every tool call
//!
//! A `TurnContext` owns the invocation records of one conversational turn.
//! Sessions outlive turns and hold the pending confirmation tokens used by
//! commands that must be repeated before they run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use uuid::Uuid;

/// Terminal state of one tool invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvocationStatus {
    Completed,
    Failed,
}

impl std::fmt::Display for InvocationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvocationStatus::Completed => write!(f, "completed"),
            InvocationStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Audit entry for one tool invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationRecord {
    pub tool: String,
    /// Input mapping as received, before the tool parsed it
    pub input: Value,
    /// Tool output, or the error text on failure
    pub output: String,
    pub status: InvocationStatus,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Result of a confirmation check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// First request: a token was issued and expires after the TTL
    Issued { expires_in: Duration },
    /// Repeated within the TTL: the token was consumed
    Confirmed,
}

/// Pending confirmation tokens keyed by (command, session)
#[derive(Debug)]
pub struct ConfirmationTokens {
    ttl: Duration,
    pending: Mutex<HashMap<(String, String), Instant>>,
}

impl ConfirmationTokens {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            pending: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Consume a live token for `command`, or issue one
    pub fn confirm_or_issue(&self, command: &str, session_id: &str) -> Confirmation {
        let now = Instant::now();
        let key = (command.trim().to_string(), session_id.to_string());
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);

        pending.retain(|_, expires| *expires > now);

        if pending.remove(&key).is_some() {
            Confirmation::Confirmed
        } else {
            pending.insert(key, now + self.ttl);
            Confirmation::Issued {
                expires_in: self.ttl,
            }
        }
    }

    /// Number of unexpired tokens
    pub fn pending_count(&self) -> usize {
        let now = Instant::now();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .filter(|expires| **expires > now)
            .count()
    }
}

/// State that survives across turns of one conversation
#[derive(Debug)]
pub struct SessionContext {
    id: String,
    confirmations: ConfirmationTokens,
}

impl SessionContext {
    pub fn new(id: impl Into<String>, confirmation_ttl: Duration) -> Self {
        Self {
            id: id.into(),
            confirmations: ConfirmationTokens::new(confirmation_ttl),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Confirmation check for `command` in this session
    pub fn confirm(&self, command: &str) -> Confirmation {
        self.confirmations.confirm_or_issue(command, &self.id)
    }

    pub fn confirmations(&self) -> &ConfirmationTokens {
        &self.confirmations
    }
}

/// Invocation records of one turn
///
/// Clones share the same record sequence.
#[derive(Debug, Clone)]
pub struct TurnContext {
    turn_id: Uuid,
    session: Arc<SessionContext>,
    records: Arc<Mutex<Vec<InvocationRecord>>>,
}

impl TurnContext {
    pub fn new(session: Arc<SessionContext>) -> Self {
        Self {
            turn_id: Uuid::new_v4(),
            session,
            records: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn turn_id(&self) -> Uuid {
        self.turn_id
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub(crate) fn append(&self, record: InvocationRecord) {
        self.lock().push(record);
    }

    /// Copy of the records so far
    pub fn snapshot(&self) -> Vec<InvocationRecord> {
        self.lock().clone()
    }

    /// Clear the records; only called when a turn starts
    pub fn reset(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<InvocationRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
