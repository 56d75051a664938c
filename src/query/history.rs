use super::types::ResultType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

pub const HISTORY_CAPACITY: usize = 10;

/// Summary of one successful query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    pub query: String,
    pub timestamp: DateTime<Utc>,
    pub query_type: ResultType,
}

/// Newest-first log of successful queries, bounded to `HISTORY_CAPACITY`
#[derive(Debug, Clone, Default)]
pub struct QueryHistory {
    entries: VecDeque<HistoryEntry>,
}

impl QueryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prepend an entry, evicting the oldest beyond capacity
    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.push_front(entry);
        self.entries.truncate(HISTORY_CAPACITY);
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> HistoryEntry {
        HistoryEntry {
            id: n.to_string(),
            query: format!("query {}", n),
            timestamp: Utc::now(),
            query_type: ResultType::Sql,
        }
    }

    #[test]
    fn test_history_is_bounded_newest_first() {
        let mut history = QueryHistory::new();
        for n in 0..15 {
            history.push(entry(n));
        }

        let entries = history.entries();
        assert_eq!(entries.len(), HISTORY_CAPACITY);
        assert_eq!(entries[0].query, "query 14");
        assert_eq!(entries[9].query, "query 5");
    }

    #[test]
    fn test_empty_history() {
        let history = QueryHistory::new();
        assert!(history.is_empty());
        assert_eq!(history.len(), 0);
    }
}
