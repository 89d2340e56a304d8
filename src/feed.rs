//! Height-bounded notification feed.
//!
//! Holds one record per query outcome, newest first. Each record carries an
//! estimated rendered height, and the feed evicts from the tail to stay
//! within a height budget.

use crate::config::FeedConfig;
use crate::engine::Timings;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::debug;

/// Unique notification identifier, a millisecond timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NotificationId(pub u64);

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    /// A query result with timings.
    Success,
    Error,
    Info,
}

/// Row count and timings of a query that returned rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuerySummary {
    pub row_count: usize,
    pub timings: Option<Timings>,
}

impl fmt::Display for QuerySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let noun = if self.row_count == 1 { "row" } else { "rows" };
        write!(f, "{} {noun}", self.row_count)?;
        if let Some(timings) = &self.timings {
            write!(f, " ({timings})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationDetail {
    Summary(QuerySummary),
    /// Engine error message.
    Message(String),
}

impl fmt::Display for NotificationDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Summary(summary) => write!(f, "{summary}"),
            Self::Message(message) => write!(f, "{message}"),
        }
    }
}

/// What a notification shows: the statement text and an optional detail line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationContent {
    pub title: String,
    pub detail: Option<NotificationDetail>,
}

impl NotificationContent {
    pub fn title(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: NotificationDetail) -> Self {
        self.detail = Some(detail);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub kind: NotificationKind,
    pub estimated_height: u32,
    pub content: NotificationContent,
}

impl Notification {
    pub fn new(
        id: NotificationId,
        kind: NotificationKind,
        estimated_height: u32,
        content: NotificationContent,
    ) -> Self {
        Self {
            id,
            kind,
            estimated_height,
            content,
        }
    }
}

/// Per-kind height estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeightEstimates {
    pub success: u32,
    pub plain: u32,
}

impl HeightEstimates {
    pub fn for_kind(&self, kind: NotificationKind) -> u32 {
        match kind {
            NotificationKind::Success => self.success,
            NotificationKind::Error | NotificationKind::Info => self.plain,
        }
    }
}

impl From<&FeedConfig> for HeightEstimates {
    fn from(config: &FeedConfig) -> Self {
        Self {
            success: config.success_height,
            plain: config.plain_height,
        }
    }
}

/// Snapshot of the feed handed to observers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationFeedState {
    /// Newest first.
    pub notifications: VecDeque<Notification>,
    pub max_height: u32,
}

impl NotificationFeedState {
    /// Sum of the estimates, widened so large configured heights cannot overflow.
    pub fn total_height(&self) -> u64 {
        self.notifications
            .iter()
            .map(|n| u64::from(n.estimated_height))
            .sum()
    }

    pub fn len(&self) -> usize {
        self.notifications.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }
}

/// The feed itself. Every mutation returns the resulting state.
#[derive(Debug, Clone)]
pub struct NotificationFeed {
    state: NotificationFeedState,
    heights: HeightEstimates,
    last_id: u64,
}

impl NotificationFeed {
    pub fn new(max_height: u32, heights: HeightEstimates) -> Self {
        Self {
            state: NotificationFeedState {
                notifications: VecDeque::new(),
                max_height,
            },
            heights,
            last_id: 0,
        }
    }

    pub fn from_config(config: &FeedConfig) -> Self {
        Self::new(config.max_height, HeightEstimates::from(config))
    }

    pub fn state(&self) -> &NotificationFeedState {
        &self.state
    }

    pub fn total_height(&self) -> u64 {
        self.state.total_height()
    }

    pub fn heights(&self) -> HeightEstimates {
        self.heights
    }

    /// Builds a notification with a fresh id and the estimate for `kind`,
    /// then adds it.
    pub fn notify(&mut self, kind: NotificationKind, content: NotificationContent) -> NotificationId {
        let id = self.next_id();
        let height = self.heights.for_kind(kind);
        self.add(Notification::new(id, kind, height, content));
        id
    }

    /// Prepends `notification`, then evicts from the tail while more than one
    /// remains and the total exceeds the budget.
    pub fn add(&mut self, notification: Notification) -> &NotificationFeedState {
        self.last_id = self.last_id.max(notification.id.0);
        self.state.notifications.push_front(notification);

        let budget = u64::from(self.state.max_height);
        while self.state.notifications.len() > 1 && self.total_height() > budget {
            self.evict_oldest();
        }
        &self.state
    }

    /// Changes the budget and evicts from the tail until the feed fits.
    ///
    /// Unlike `add`, this may empty the feed.
    pub fn set_max_height(&mut self, max_height: u32) -> &NotificationFeedState {
        self.state.max_height = max_height;
        while self.total_height() > u64::from(max_height) {
            self.evict_oldest();
        }
        &self.state
    }

    /// Drops the notification with `id`; unknown ids are ignored.
    pub fn remove(&mut self, id: NotificationId) -> &NotificationFeedState {
        self.state.notifications.retain(|n| n.id != id);
        &self.state
    }

    pub fn clear(&mut self) -> &NotificationFeedState {
        self.state.notifications.clear();
        &self.state
    }

    fn evict_oldest(&mut self) {
        if let Some(evicted) = self.state.notifications.pop_back() {
            debug!("Evicted notification {} ({}px)", evicted.id, evicted.estimated_height);
        }
    }

    /// Current time in milliseconds, bumped past the last id on collision.
    fn next_id(&mut self) -> NotificationId {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        self.last_id = now.max(self.last_id + 1);
        NotificationId(self.last_id)
    }
}

impl Default for NotificationFeed {
    fn default() -> Self {
        Self::from_config(&FeedConfig::default())
    }
}
