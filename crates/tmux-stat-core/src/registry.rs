//! Pane registry: concurrency-safe pane to conversation bindings.
//!
//! A pane is registered before its Codex conversation id is known, so a
//! binding starts either `Pending` (keyed by its pane) or `Bound` (keyed by
//! the conversation id). The first telemetry event carrying an unknown
//! conversation id adopts a pending binding.
//!
//! ## Transitions
//!
//! - `register(pane, None)`: creates/overwrites `Pending` under `BindingKey::Pending(pane)`
//! - `register(pane, Some(c))`: creates/overwrites `Bound(c)` under `BindingKey::Conversation(c)`
//! - `resolve(c)` with no binding for `c`: oldest `Pending -> Bound(c)` (adoption)
//! - `unregister(pane)` / `evict_stale`: removal
//!
//! Every operation runs under a single lock held for the whole logical
//! operation; nothing inside the critical section performs IO.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::error::RegistryError;

/// Prefix of the wire form of a pending key.
pub const PENDING_KEY_PREFIX: &str = "pending_";

// ─── Keys & States ───────────────────────────────────────────────

/// Table key. Pending and conversation keys never collide, even when a
/// conversation id happens to look like a pending key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BindingKey {
    /// Placeholder for a pane whose conversation id is not yet known.
    Pending(String),
    /// Real conversation identifier.
    Conversation(String),
}

impl fmt::Display for BindingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending(pane_id) => write!(f, "{PENDING_KEY_PREFIX}{pane_id}"),
            Self::Conversation(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindingState {
    Pending,
    Bound { conversation_id: String },
}

// ─── Binding ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub pane_id: String,
    pub state: BindingState,
    /// Creation time; carried over on adoption. Drives stale eviction.
    pub registered_at: DateTime<Utc>,
    /// Registration order, breaks `registered_at` ties.
    pub seq: u64,
}

impl Binding {
    pub fn key(&self) -> BindingKey {
        match &self.state {
            BindingState::Pending => BindingKey::Pending(self.pane_id.clone()),
            BindingState::Bound { conversation_id } => {
                BindingKey::Conversation(conversation_id.clone())
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state == BindingState::Pending
    }

    pub fn conversation_id(&self) -> Option<&str> {
        match &self.state {
            BindingState::Pending => None,
            BindingState::Bound { conversation_id } => Some(conversation_id),
        }
    }

    /// `Pending -> Bound`. A bound binding cannot be adopted again.
    pub fn adopt(self, conversation_id: &str) -> Result<Self, RegistryError> {
        if let BindingState::Bound {
            conversation_id: existing,
        } = &self.state
        {
            return Err(RegistryError::AlreadyBound {
                pane_id: self.pane_id.clone(),
                conversation_id: existing.clone(),
            });
        }
        Ok(Self {
            state: BindingState::Bound {
                conversation_id: conversation_id.to_string(),
            },
            ..self
        })
    }

    fn age_order(&self) -> (DateTime<Utc>, u64) {
        (self.registered_at, self.seq)
    }
}

// ─── Registry ────────────────────────────────────────────────────

#[derive(Debug)]
struct Table {
    bindings: HashMap<BindingKey, Binding>,
    next_seq: u64,
    last_activity: DateTime<Utc>,
}

impl Table {
    /// Oldest pending binding: earliest `registered_at`, then lowest `seq`.
    fn oldest_pending(&self) -> Option<&Binding> {
        self.bindings
            .values()
            .filter(|b| b.is_pending())
            .min_by_key(|b| b.age_order())
    }
}

/// Shared pane registry. Wrap in `Arc` to share across request handlers.
#[derive(Debug)]
pub struct PaneRegistry {
    table: Mutex<Table>,
}

impl PaneRegistry {
    /// Empty registry; `now` seeds the activity clock.
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            table: Mutex::new(Table {
                bindings: HashMap::new(),
                next_seq: 0,
                last_activity: now,
            }),
        }
    }

    /// Bind `pane_id` to `conversation_id`, or to a pending placeholder when
    /// the conversation is not yet known. Overwrites any binding under the
    /// same key. Returns the key used.
    pub fn register(
        &self,
        pane_id: &str,
        conversation_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<BindingKey, RegistryError> {
        if pane_id.is_empty() {
            return Err(RegistryError::EmptyPaneId);
        }
        let state = match conversation_id.filter(|c| !c.is_empty()) {
            Some(c) => BindingState::Bound {
                conversation_id: c.to_string(),
            },
            None => BindingState::Pending,
        };

        let mut table = self.table.lock();
        table.last_activity = now;
        let seq = table.next_seq;
        table.next_seq += 1;

        let binding = Binding {
            pane_id: pane_id.to_string(),
            state,
            registered_at: now,
            seq,
        };
        let key = binding.key();
        table.bindings.insert(key.clone(), binding);
        Ok(key)
    }

    /// Pane bound to `conversation_id`, adopting the oldest pending binding
    /// when the conversation is unknown. `None` when nothing can be resolved.
    ///
    /// An empty `conversation_id` routes to the oldest pending pane without
    /// adopting it.
    pub fn resolve(&self, conversation_id: &str) -> Option<String> {
        let mut table = self.table.lock();
        if conversation_id.is_empty() {
            return table.oldest_pending().map(|b| b.pane_id.clone());
        }

        let direct = BindingKey::Conversation(conversation_id.to_string());
        if let Some(binding) = table.bindings.get(&direct) {
            return Some(binding.pane_id.clone());
        }

        let pending_key = table.oldest_pending().map(Binding::key)?;
        let pending = table.bindings.remove(&pending_key)?;
        match pending.adopt(conversation_id) {
            Ok(bound) => {
                let pane_id = bound.pane_id.clone();
                table.bindings.insert(direct, bound);
                Some(pane_id)
            }
            // oldest_pending only yields pending bindings
            Err(_) => None,
        }
    }

    /// Remove every binding targeting `pane_id`. Returns how many were removed.
    pub fn unregister(&self, pane_id: &str, now: DateTime<Utc>) -> Result<usize, RegistryError> {
        if pane_id.is_empty() {
            return Err(RegistryError::EmptyPaneId);
        }
        let mut table = self.table.lock();
        table.last_activity = now;
        let before = table.bindings.len();
        table.bindings.retain(|_, b| b.pane_id != pane_id);
        Ok(before - table.bindings.len())
    }

    /// Remove bindings strictly older than `ttl`. An age equal to `ttl` is kept.
    pub fn evict_stale(&self, now: DateTime<Utc>, ttl: Duration) -> usize {
        let mut table = self.table.lock();
        let before = table.bindings.len();
        table.bindings.retain(|_, b| now - b.registered_at <= ttl);
        before - table.bindings.len()
    }

    /// Record activity for idle detection.
    pub fn touch(&self, now: DateTime<Utc>) {
        self.table.lock().last_activity = now;
    }

    /// Time since the last activity-touching call. Never negative.
    pub fn idle_for(&self, now: DateTime<Utc>) -> Duration {
        let last = self.table.lock().last_activity;
        (now - last).max(Duration::zero())
    }

    pub fn count(&self) -> usize {
        self.table.lock().bindings.len()
    }

    /// Copy of all bindings, oldest first.
    pub fn snapshot(&self) -> Vec<Binding> {
        let table = self.table.lock();
        let mut bindings: Vec<Binding> = table.bindings.values().cloned().collect();
        drop(table);
        bindings.sort_by_key(Binding::age_order);
        bindings
    }
}
