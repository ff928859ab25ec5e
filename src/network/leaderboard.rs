//! Match Log
//!
//! Append-only record of finished games, queried newest first.
//! In-memory and bounded: the oldest record is dropped once full.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::game::events::GameOverSummary;
use crate::game::state::Winner;

/// One finished game.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRecord {
    /// Winning color.
    pub winner: Winner,
    /// Red pieces left.
    pub red_pieces: usize,
    /// Blue pieces left.
    pub blue_pieces: usize,
    /// Game length in seconds.
    pub duration: f64,
    /// When the result was recorded.
    pub timestamp: DateTime<Utc>,
}

impl MatchRecord {
    /// Record a summary at `timestamp`.
    pub fn from_summary(summary: &GameOverSummary, timestamp: DateTime<Utc>) -> Self {
        Self {
            winner: summary.winner,
            red_pieces: summary.red_pieces,
            blue_pieces: summary.blue_pieces,
            duration: summary.duration_seconds,
            timestamp,
        }
    }
}

/// Bounded log of match records.
pub struct MatchLog {
    records: RwLock<VecDeque<MatchRecord>>,
    capacity: usize,
}

impl MatchLog {
    /// Create a log holding at most `capacity` records.
    pub fn new(capacity: usize) -> Self {
        Self {
            records: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
        }
    }

    /// Append a game-over summary, stamped now.
    pub async fn record(&self, summary: &GameOverSummary) -> MatchRecord {
        let record = MatchRecord::from_summary(summary, Utc::now());
        self.push(record.clone()).await;
        record
    }

    /// Append a prepared record.
    pub async fn push(&self, record: MatchRecord) {
        let mut records = self.records.write().await;
        while records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    /// Up to `limit` most recent records, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<MatchRecord> {
        let records = self.records.read().await;
        records.iter().rev().take(limit).cloned().collect()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the log is empty.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}
