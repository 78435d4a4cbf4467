//! Append-only per-user interaction log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::RwLock;

use crate::config::ActionWeights;
use crate::sync::RecoverableLock;

/// Kind of user interaction with a title
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Viewed,
    Rated,
    AddedToList,
    Skipped,
    Liked,
    Disliked,
}

impl ActionKind {
    pub const ALL: [ActionKind; 6] = [
        ActionKind::Viewed,
        ActionKind::Rated,
        ActionKind::AddedToList,
        ActionKind::Skipped,
        ActionKind::Liked,
        ActionKind::Disliked,
    ];

    /// Signed preference signal in [-1, 1] for an action of the given strength.
    ///
    /// Strength is in [0, 1]; for ratings it is the normalized rating, so a
    /// middling rating is neutral and a low one is negative.
    pub fn signal(self, strength: f32, weights: &ActionWeights) -> f32 {
        let s = strength.clamp(0.0, 1.0);
        let raw = match self {
            ActionKind::Viewed => weights.viewed * s,
            ActionKind::Rated => weights.rated * (2.0 * s - 1.0),
            ActionKind::AddedToList => weights.added_to_list * s,
            ActionKind::Skipped => -weights.skipped * s,
            ActionKind::Liked => weights.liked * s,
            ActionKind::Disliked => -weights.disliked * s,
        };
        raw.clamp(-1.0, 1.0)
    }

    /// Titles the user has already seen or rejected
    pub fn excludes_title(self) -> bool {
        matches!(self, ActionKind::Viewed | ActionKind::Disliked)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Viewed => "viewed",
            ActionKind::Rated => "rated",
            ActionKind::AddedToList => "added_to_list",
            ActionKind::Skipped => "skipped",
            ActionKind::Liked => "liked",
            ActionKind::Disliked => "disliked",
        };
        f.write_str(name)
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .into_iter()
            .find(|a| a.to_string() == normalized)
            .ok_or_else(|| format!("unknown action: {s}"))
    }
}

/// One recorded interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionEvent {
    pub user_id: String,
    pub title_id: String,
    pub action: ActionKind,
    pub strength: f32,
    pub timestamp: DateTime<Utc>,
}

impl InteractionEvent {
    pub fn new(
        user_id: impl Into<String>,
        title_id: impl Into<String>,
        action: ActionKind,
        strength: f32,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            title_id: title_id.into(),
            action,
            strength,
            timestamp: Utc::now(),
        }
    }

    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// Read/append access to interaction history.
///
/// Implementations only ever append; nothing is edited in place.
pub trait InteractionLog: Send + Sync {
    fn append(&self, event: InteractionEvent);

    /// All events for a user, ordered by timestamp then title id
    fn events_for(&self, user_id: &str) -> Vec<InteractionEvent>;

    /// Titles the user viewed or disliked
    fn excluded_titles(&self, user_id: &str) -> HashSet<String>;

    /// Share of the user's co-interacting neighbours who engaged positively
    /// with each candidate
    fn co_interaction_scores(&self, user_id: &str, candidates: &[&str]) -> HashMap<String, f32>;

    fn has_history(&self, user_id: &str) -> bool;
}

#[derive(Debug, Default)]
struct LogState {
    events: HashMap<String, Vec<InteractionEvent>>,
    excluded: HashMap<String, HashSet<String>>,
    /// user -> titles engaged with positively
    positive_by_user: HashMap<String, HashSet<String>>,
    /// title -> users who engaged with it positively
    positive_by_title: HashMap<String, HashSet<String>>,
}

/// In-memory interaction log with positive-engagement indexes
#[derive(Debug, Default)]
pub struct MemoryInteractionLog {
    weights: ActionWeights,
    state: RwLock<LogState>,
}

impl MemoryInteractionLog {
    pub fn new(weights: ActionWeights) -> Self {
        Self {
            weights,
            state: RwLock::new(LogState::default()),
        }
    }

    pub fn len(&self) -> usize {
        self.state
            .read_or_recover()
            .events
            .values()
            .map(Vec::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl InteractionLog for MemoryInteractionLog {
    fn append(&self, event: InteractionEvent) {
        let positive = event.action.signal(event.strength, &self.weights) > 0.0;
        let mut state = self.state.write_or_recover();

        if event.action.excludes_title() {
            state
                .excluded
                .entry(event.user_id.clone())
                .or_default()
                .insert(event.title_id.clone());
        }
        if positive {
            state
                .positive_by_user
                .entry(event.user_id.clone())
                .or_default()
                .insert(event.title_id.clone());
            state
                .positive_by_title
                .entry(event.title_id.clone())
                .or_default()
                .insert(event.user_id.clone());
        }
        state
            .events
            .entry(event.user_id.clone())
            .or_default()
            .push(event);
    }

    fn events_for(&self, user_id: &str) -> Vec<InteractionEvent> {
        let mut events = self
            .state
            .read_or_recover()
            .events
            .get(user_id)
            .cloned()
            .unwrap_or_default();
        events.sort_by(|a, b| {
            a.timestamp
                .cmp(&b.timestamp)
                .then_with(|| a.title_id.cmp(&b.title_id))
        });
        events
    }

    fn excluded_titles(&self, user_id: &str) -> HashSet<String> {
        self.state
            .read_or_recover()
            .excluded
            .get(user_id)
            .cloned()
            .unwrap_or_default()
    }

    fn co_interaction_scores(&self, user_id: &str, candidates: &[&str]) -> HashMap<String, f32> {
        let state = self.state.read_or_recover();
        let Some(liked) = state.positive_by_user.get(user_id) else {
            return HashMap::new();
        };

        let neighbours: HashSet<&String> = liked
            .iter()
            .filter_map(|title| state.positive_by_title.get(title))
            .flatten()
            .filter(|other| other.as_str() != user_id)
            .collect();
        if neighbours.is_empty() {
            return HashMap::new();
        }

        let total = neighbours.len() as f32;
        candidates
            .iter()
            .filter_map(|candidate| {
                let likers = state.positive_by_title.get(*candidate)?;
                let shared = likers.iter().filter(|u| neighbours.contains(u)).count();
                (shared > 0).then(|| (candidate.to_string(), shared as f32 / total))
            })
            .collect()
    }

    fn has_history(&self, user_id: &str) -> bool {
        self.state
            .read_or_recover()
            .events
            .get(user_id)
            .is_some_and(|e| !e.is_empty())
    }
}
