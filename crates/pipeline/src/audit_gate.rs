//! Audit gate: decides whether an access log entry is written, and whether a
//! failed write blocks the action that triggered it.
//!
//! Rules and blacklist are cached per gate instance for `ttl`, together with
//! the role of every user looked up during that window. After an
//! administrator edits the matrix or a user's role, callers may observe the
//! old values for at most one TTL window unless [`AuditGate::invalidate`] is
//! called.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use courier_core::audit::{self, AuditAction, FALLBACK_ACTION};
use courier_core::clock::Clock;
use courier_core::types::{DbId, Timestamp};
use courier_db::models::audit::CreateAccessLog;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::AuditStore;

/// Point-in-time copy of the rule matrix and blacklist.
#[derive(Debug)]
struct AuditSnapshot {
    /// `(role, action) -> is_enabled`.
    rules: HashMap<(String, AuditAction), bool>,
    blacklist: HashSet<DbId>,
    /// Roles resolved since `fetched_at`; `None` for users without one.
    roles: RwLock<HashMap<DbId, Option<String>>>,
    fetched_at: Timestamp,
}

pub struct AuditGate {
    store: Arc<dyn AuditStore>,
    clock: Arc<dyn Clock>,
    ttl: chrono::Duration,
    cache: RwLock<Option<Arc<AuditSnapshot>>>,
}

impl AuditGate {
    pub fn new(store: Arc<dyn AuditStore>, clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            store,
            clock,
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::seconds(1)),
            cache: RwLock::new(None),
        }
    }

    /// Drop the cached snapshot; the next call reloads from the store.
    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
        tracing::debug!("Audit settings cache invalidated");
    }

    /// Whether an entry for `raw_action` by `user_id` must be written.
    ///
    /// Blacklisted users are never logged. Otherwise the user's role and the
    /// normalized action select a rule; no rule means "log".
    pub async fn should_log(&self, user_id: DbId, raw_action: &str) -> Result<bool, StoreError> {
        let snapshot = self.snapshot().await?;
        if snapshot.blacklist.contains(&user_id) {
            return Ok(false);
        }

        let action = audit::lookup_action(raw_action).unwrap_or_else(|| {
            tracing::debug!(action = raw_action, fallback = %FALLBACK_ACTION, "Unmapped audit action");
            FALLBACK_ACTION
        });

        let Some(role) = self.role(&snapshot, user_id).await? else {
            return Ok(true);
        };

        Ok(snapshot
            .rules
            .get(&(role, action))
            .copied()
            .unwrap_or(true))
    }

    async fn role(&self, snapshot: &AuditSnapshot, user_id: DbId) -> Result<Option<String>, StoreError> {
        if let Some(role) = snapshot.roles.read().await.get(&user_id) {
            return Ok(role.clone());
        }
        let role = self.store.find_role(user_id).await?;
        snapshot.roles.write().await.insert(user_id, role.clone());
        Ok(role)
    }

    /// Write `entry` if it should be logged. Failures are logged and dropped.
    pub async fn log_best_effort(&self, entry: CreateAccessLog) {
        match self.should_log(entry.user_id, &entry.action).await {
            Ok(false) => {}
            Ok(true) => {
                if let Err(e) = self.store.append_access_log(&prepare(entry)).await {
                    tracing::warn!(error = %e, "Access log write failed");
                }
            }
            Err(e) => {
                tracing::warn!(
                    user_id = entry.user_id,
                    action = %entry.action,
                    error = %e,
                    "Audit settings unavailable, access log skipped"
                );
            }
        }
    }

    /// Write `entry` for a security-sensitive action.
    ///
    /// Returns `true` when the action may proceed: either no log is required,
    /// or the log was written. Any failure to decide or to write returns
    /// `false`.
    pub async fn log_or_block(&self, entry: CreateAccessLog) -> bool {
        let user_id = entry.user_id;
        match self.should_log(user_id, &entry.action).await {
            Ok(false) => true,
            Ok(true) => match self.store.append_access_log(&prepare(entry)).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(user_id, error = %e, "Access log write failed, action blocked");
                    false
                }
            },
            Err(e) => {
                tracing::error!(user_id, error = %e, "Audit settings unavailable, action blocked");
                false
            }
        }
    }

    async fn snapshot(&self) -> Result<Arc<AuditSnapshot>, StoreError> {
        let now = self.clock.now();
        if let Some(snapshot) = self.fresh(&*self.cache.read().await, now) {
            return Ok(snapshot);
        }

        let mut guard = self.cache.write().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(snapshot) = self.fresh(&guard, now) {
            return Ok(snapshot);
        }

        let rules = self.store.load_rules().await?;
        let blacklist = self.store.load_blacklist().await?;

        let rules = rules
            .into_iter()
            .filter_map(|rule| match rule.action_type.parse::<AuditAction>() {
                Ok(action) => Some(((rule.target_role, action), rule.is_enabled)),
                Err(_) => {
                    tracing::warn!(action_type = %rule.action_type, "Ignoring rule for unknown action");
                    None
                }
            })
            .collect();

        let snapshot = Arc::new(AuditSnapshot {
            rules,
            blacklist: blacklist.into_iter().collect(),
            roles: RwLock::new(HashMap::new()),
            fetched_at: now,
        });
        *guard = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    fn fresh(&self, cached: &Option<Arc<AuditSnapshot>>, now: Timestamp) -> Option<Arc<AuditSnapshot>> {
        cached
            .as_ref()
            .filter(|s| now - s.fetched_at < self.ttl)
            .map(Arc::clone)
    }
}

/// Fill in the category and strip secrets before the entry is stored.
fn prepare(mut entry: CreateAccessLog) -> CreateAccessLog {
    if entry.category.is_empty() {
        entry.category = audit::normalize_action(&entry.action).category().to_string();
    }
    entry.details = entry.details.as_ref().map(audit::redact_sensitive_fields);
    entry
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
