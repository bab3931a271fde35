//! history.rs: bounded in-memory ledger of recent readings (FIFO eviction).

use std::collections::VecDeque;
use std::num::NonZeroUsize;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::aggregator::SentimentReading;

/// Characters of the submitted text kept in a record.
pub const PREVIEW_CHARS: usize = 40;
/// Oracle score reported while the ledger is empty.
pub const NO_DATA_ORACLE_SCORE: u8 = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryRecord {
    pub username: String,
    pub text_preview: String,
    #[serde(flatten)]
    pub reading: SentimentReading,
    pub timestamp: DateTime<Utc>,
}

impl HistoryRecord {
    pub fn new(username: &str, text: &str, reading: SentimentReading) -> Self {
        Self::at(username, text, reading, Utc::now())
    }

    pub fn at(
        username: &str,
        text: &str,
        reading: SentimentReading,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            username: username.to_string(),
            text_preview: text.chars().take(PREVIEW_CHARS).collect(),
            reading,
            timestamp,
        }
    }
}

/// Answer of [`HistoryLedger::current`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CurrentScore {
    Latest {
        oracle_score: u8,
        community_vibe_score: f64,
        timestamp: DateTime<Utc>,
    },
    NoData {
        oracle_score: u8,
        status: &'static str,
    },
}

impl CurrentScore {
    pub fn no_data() -> Self {
        CurrentScore::NoData {
            oracle_score: NO_DATA_ORACLE_SCORE,
            status: "no_data",
        }
    }

    pub fn oracle_score(&self) -> u8 {
        match self {
            CurrentScore::Latest { oracle_score, .. } | CurrentScore::NoData { oracle_score, .. } => {
                *oracle_score
            }
        }
    }
}

/// A consistent view of the ledger taken under one lock acquisition.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerWindow {
    pub records: Vec<HistoryRecord>,
    /// Ledger length, not window length.
    pub total: usize,
    pub latest_oracle_score: u8,
}

/// Append-only sequence with a hard capacity. Every mutation and every read
/// happens under the same lock, so appends racing at capacity each evict once.
#[derive(Debug)]
pub struct HistoryLedger {
    inner: Mutex<VecDeque<HistoryRecord>>,
    cap: usize,
}

impl HistoryLedger {
    /// `cap` is raised to 1 if zero.
    pub fn with_capacity(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            inner: Mutex::new(VecDeque::with_capacity(cap.min(10_000))),
            cap,
        }
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    /// Append `entry`, evicting the oldest record when over capacity.
    /// Returns the ledger length after the append.
    pub fn record(&self, entry: HistoryRecord) -> usize {
        let mut v = self.inner.lock();
        v.push_back(entry);
        while v.len() > self.cap {
            v.pop_front();
        }
        v.len()
    }

    /// The most recent `limit` records, oldest first; everything when `None`.
    pub fn latest(&self, limit: Option<NonZeroUsize>) -> Vec<HistoryRecord> {
        self.window(limit).records
    }

    /// Like [`latest`](Self::latest), plus ledger length and newest score from the same snapshot.
    pub fn window(&self, limit: Option<NonZeroUsize>) -> LedgerWindow {
        let v = self.inner.lock();
        let start = limit.map_or(0, |n| v.len().saturating_sub(n.get()));
        LedgerWindow {
            records: v.range(start..).cloned().collect(),
            total: v.len(),
            latest_oracle_score: v
                .back()
                .map_or(NO_DATA_ORACLE_SCORE, |r| r.reading.oracle_score),
        }
    }

    pub fn current(&self) -> CurrentScore {
        let v = self.inner.lock();
        match v.back() {
            Some(last) => CurrentScore::Latest {
                oracle_score: last.reading.oracle_score,
                community_vibe_score: last.reading.community_vibe_score,
                timestamp: last.timestamp,
            },
            None => CurrentScore::no_data(),
        }
    }

    pub fn latest_oracle_score(&self) -> u8 {
        self.inner
            .lock()
            .back()
            .map_or(NO_DATA_ORACLE_SCORE, |r| r.reading.oracle_score)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
