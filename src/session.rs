use std::collections::VecDeque;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::prompt::ContentType;
use crate::verdict::{Category, ClassificationResult, Verdict};

pub const HISTORY_CAPACITY: usize = 10;
const PREVIEW_CHARS: usize = 55;

/// Fixed-capacity queue, newest first. Pushing past capacity evicts the
/// oldest entry.
#[derive(Debug, Clone)]
pub struct HistoryRing<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> HistoryRing<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, entry: T) -> Option<T> {
        self.entries.push_front(entry);
        if self.entries.len() > self.capacity {
            self.entries.pop_back()
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub id: Uuid,
    pub verdict: Verdict,
    pub confidence: u8,
    pub spam_score: u8,
    pub category: Category,
    pub content_type: ContentType,
    pub preview: String,
    pub recorded_at: OffsetDateTime,
}

impl HistoryEntry {
    pub fn new(result: &ClassificationResult, text: &str, content_type: ContentType) -> Self {
        Self {
            id: Uuid::new_v4(),
            verdict: result.verdict,
            confidence: result.confidence,
            spam_score: result.spam_score,
            category: result.category,
            content_type,
            preview: preview(text),
            recorded_at: OffsetDateTime::now_utc(),
        }
    }
}

fn preview(text: &str) -> String {
    let text = text.trim();
    let mut chars = text.chars();
    let head: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{}...", head)
    } else {
        head
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    pub spam: usize,
    pub suspicious: usize,
    pub clean: usize,
    pub total: usize,
}

/// Everything one interactive session remembers. Nothing here outlives
/// the process.
#[derive(Debug, Clone)]
pub struct SessionContext {
    history: HistoryRing<HistoryEntry>,
    spam_count: u64,
    safe_count: u64,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        Self {
            history: HistoryRing::with_capacity(HISTORY_CAPACITY),
            spam_count: 0,
            safe_count: 0,
        }
    }

    /// Records a finished classification. Pending results are ignored.
    pub fn record(&mut self, result: &ClassificationResult, text: &str, content_type: ContentType) {
        if !result.verdict.is_terminal() {
            return;
        }
        if result.verdict.is_spam() {
            self.spam_count += 1;
        } else if result.verdict.is_safe() {
            self.safe_count += 1;
        }
        self.history
            .push(HistoryEntry::new(result, text, content_type));
    }

    pub fn history(&self) -> &HistoryRing<HistoryEntry> {
        &self.history
    }

    /// Lifetime counters since the last clear; unlike [`Self::stats`] these
    /// are not bounded by the history capacity.
    pub fn running_counts(&self) -> (u64, u64) {
        (self.spam_count, self.safe_count)
    }

    /// Counts over the retained history window.
    pub fn stats(&self) -> SessionStats {
        let mut stats = SessionStats::default();
        for entry in self.history.iter() {
            match entry.verdict {
                Verdict::Spam => stats.spam += 1,
                Verdict::Suspicious => stats.suspicious += 1,
                Verdict::Clean | Verdict::NotSpam => stats.clean += 1,
                Verdict::Unknown | Verdict::Pending => {}
            }
            stats.total += 1;
        }
        stats
    }

    pub fn clear(&mut self) {
        self.history.clear();
        self.spam_count = 0;
        self.safe_count = 0;
    }
}
