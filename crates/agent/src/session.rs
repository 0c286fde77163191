//! Bounded, TTL-expiring conversation sessions.
//!
//! Each entry owns its partial leave request, so evicting or resetting a session drops the
//! tracked request along with it.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use leave_core::config::SessionConfig;
use serde::Serialize;
use tracing::debug;

use crate::conversation::LeaveRequestState;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub content: String,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug)]
struct SessionEntry {
    last_access: Instant,
    recency_tick: u64,
    history: VecDeque<ConversationTurn>,
    leave_request: LeaveRequestState,
}

#[derive(Debug)]
pub struct SessionStore {
    entries: HashMap<String, SessionEntry>,
    recency: BTreeMap<u64, String>,
    next_tick: u64,
    max_sessions: usize,
    max_history: usize,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(max_sessions: usize, max_history: usize, ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            next_tick: 0,
            max_sessions,
            max_history,
            ttl,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.max_sessions, config.max_history, Duration::from_secs(config.ttl_secs))
    }

    pub fn touch(&mut self, session_id: &str) {
        self.touch_at(session_id, Instant::now());
    }

    /// Creates the session if absent and moves it to the most-recent end of the eviction order.
    pub fn touch_at(&mut self, session_id: &str, now: Instant) {
        let tick = self.next_tick;
        self.next_tick += 1;

        match self.entries.get_mut(session_id) {
            Some(entry) => {
                self.recency.remove(&entry.recency_tick);
                entry.recency_tick = tick;
                entry.last_access = now;
            }
            None => {
                self.entries.insert(
                    session_id.to_string(),
                    SessionEntry {
                        last_access: now,
                        recency_tick: tick,
                        history: VecDeque::new(),
                        leave_request: LeaveRequestState::default(),
                    },
                );
            }
        }
        self.recency.insert(tick, session_id.to_string());
    }

    pub fn prune(&mut self) -> usize {
        self.prune_at(Instant::now())
    }

    /// Drops sessions idle longer than the TTL, then the least recently touched ones until the
    /// store is back within capacity. Returns how many sessions were evicted.
    pub fn prune_at(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, entry)| now.saturating_duration_since(entry.last_access) > self.ttl)
            .map(|(session_id, _)| session_id.clone())
            .collect();

        let mut evicted = 0;
        for session_id in expired {
            if self.remove(&session_id) {
                evicted += 1;
            }
        }

        while self.entries.len() > self.max_sessions {
            let Some((_, oldest)) = self.recency.pop_first() else {
                break;
            };
            if self.entries.remove(&oldest).is_some() {
                evicted += 1;
            }
        }

        if evicted > 0 {
            debug!(
                event_name = "agent.sessions.pruned",
                evicted,
                remaining = self.entries.len(),
                "sessions pruned"
            );
        }
        evicted
    }

    pub fn remove(&mut self, session_id: &str) -> bool {
        match self.entries.remove(session_id) {
            Some(entry) => {
                self.recency.remove(&entry.recency_tick);
                true
            }
            None => false,
        }
    }

    pub fn size(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.entries.contains_key(session_id)
    }

    /// Appends a turn to an existing session, dropping the oldest turns beyond the history cap.
    pub fn append_turn(&mut self, session_id: &str, role: TurnRole, content: &str) -> bool {
        let Some(entry) = self.entries.get_mut(session_id) else {
            return false;
        };
        entry.history.push_back(ConversationTurn {
            role,
            content: content.to_string(),
            recorded_at: Utc::now(),
        });
        while entry.history.len() > self.max_history {
            entry.history.pop_front();
        }
        true
    }

    pub fn history(&self, session_id: &str) -> Vec<ConversationTurn> {
        self.entries
            .get(session_id)
            .map(|entry| entry.history.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn leave_request(&self, session_id: &str) -> Option<&LeaveRequestState> {
        self.entries.get(session_id).map(|entry| &entry.leave_request)
    }

    pub fn leave_request_mut(&mut self, session_id: &str) -> Option<&mut LeaveRequestState> {
        self.entries.get_mut(session_id).map(|entry| &mut entry.leave_request)
    }
}
