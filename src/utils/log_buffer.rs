use chrono::Utc;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: i64,
    pub level: String,
    pub message: String,
    /// Source-relative path the entry is about, if any
    pub path: Option<String>,
}

/// Bounded in-memory log of recent diagnostics, oldest dropped first.
#[derive(Clone)]
pub struct LogBuffer {
    buffer: Arc<Mutex<VecDeque<LogEntry>>>,
    max_entries: usize,
}

impl LogBuffer {
    pub fn new(max_entries: usize) -> Self {
        let max_entries = max_entries.max(1);
        Self {
            buffer: Arc::new(Mutex::new(VecDeque::with_capacity(max_entries))),
            max_entries,
        }
    }

    pub fn add_log(&self, level: &str, message: String, path: Option<String>) {
        let entry = LogEntry {
            timestamp: Utc::now().timestamp(),
            level: level.to_string(),
            message,
            path,
        };

        let mut buffer = self.buffer.lock();
        if buffer.len() >= self.max_entries {
            buffer.pop_front();
        }
        buffer.push_back(entry);
    }

    /// The newest `limit` entries (all when `None`), oldest first.
    pub fn get_logs(&self, limit: Option<usize>) -> Vec<LogEntry> {
        let buffer = self.buffer.lock();
        let skip = match limit {
            Some(n) => buffer.len().saturating_sub(n),
            None => 0,
        };
        buffer.iter().skip(skip).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oldest_entries_dropped() {
        let logs = LogBuffer::new(3);
        for i in 0..5 {
            logs.add_log("info", format!("entry {}", i), None);
        }
        let messages: Vec<String> = logs.get_logs(None).into_iter().map(|e| e.message).collect();
        assert_eq!(messages, vec!["entry 2", "entry 3", "entry 4"]);
    }

    #[test]
    fn test_limit_returns_newest() {
        let logs = LogBuffer::new(10);
        logs.add_log("info", "first".to_string(), None);
        logs.add_log("warning", "second".to_string(), Some("a/b.txt".to_string()));
        logs.add_log("error", "third".to_string(), None);

        let recent = logs.get_logs(Some(2));
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].message, "second");
        assert_eq!(recent[0].path.as_deref(), Some("a/b.txt"));
        assert_eq!(recent[1].level, "error");
        assert_eq!(logs.get_logs(Some(50)).len(), 3);
    }
}
