//! 本地生成历史
//!
//! 最新的条目在最前面，只在头部插入，从不重新排序。

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::storage::StoragePort;
use super::ClientError;
use crate::services::GenerationResult;

/// 历史记录的存储键
pub const HISTORY_KEY: &str = "postHistory";

/// 一条历史记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// 创建时间戳（毫秒），同时作为唯一键
    pub id: i64,
    pub topic: String,
    pub tone: String,
    pub response_text: String,
    #[serde(default)]
    pub search_queries: Vec<String>,
}

impl HistoryEntry {
    /// 还原为生成结果，用于重新渲染
    pub fn to_result(&self) -> GenerationResult {
        GenerationResult {
            response_text: self.response_text.clone(),
            search_queries: self.search_queries.clone(),
        }
    }
}

/// 历史列表
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    /// 从存储加载，数据损坏时视为空
    pub fn load(storage: &dyn StoragePort) -> Self {
        let entries = match storage.get(HISTORY_KEY) {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!("Discarding unreadable history: {}", e);
                Vec::new()
            }),
            None => Vec::new(),
        };
        Self { entries }
    }

    pub fn save(&self, storage: &dyn StoragePort) -> Result<(), ClientError> {
        let raw = serde_json::to_string(&self.entries)
            .map_err(|e| ClientError::Storage(e.to_string()))?;
        storage.set(HISTORY_KEY, &raw)
    }

    /// 在头部插入一条记录
    ///
    /// 时钟回拨或同一毫秒内多次插入时，id 取当前头部 id + 1
    pub fn record(
        &mut self,
        topic: &str,
        tone: &str,
        result: &GenerationResult,
        now_ms: i64,
    ) -> &HistoryEntry {
        let id = match self.entries.first() {
            Some(head) if now_ms <= head.id => head.id + 1,
            _ => now_ms,
        };

        self.entries.insert(
            0,
            HistoryEntry {
                id,
                topic: topic.to_string(),
                tone: tone.to_string(),
                response_text: result.response_text.clone(),
                search_queries: result.search_queries.clone(),
            },
        );
        &self.entries[0]
    }

    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    pub fn get(&self, id: i64) -> Option<&HistoryEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// 按主题过滤（不区分大小写），保持原有顺序
    pub fn filter(&self, term: &str) -> Vec<&HistoryEntry> {
        let term = term.trim().to_lowercase();
        self.entries
            .iter()
            .filter(|e| term.is_empty() || e.topic.to_lowercase().contains(&term))
            .collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::storage::MemoryStorage;

    fn result(text: &str) -> GenerationResult {
        GenerationResult {
            response_text: text.to_string(),
            search_queries: vec![format!("{} query", text)],
        }
    }

    #[test]
    fn test_record_inserts_at_head() {
        let mut history = History::default();
        history.record("first", "Simple", &result("a"), 1_000);
        history.record("second", "Casual", &result("b"), 2_000);

        let topics: Vec<&str> = history.entries().iter().map(|e| e.topic.as_str()).collect();
        assert_eq!(topics, vec!["second", "first"]);
        assert_eq!(history.entries()[0].id, 2_000);
    }

    #[test]
    fn test_ids_stay_unique() {
        let mut history = History::default();
        history.record("a", "Simple", &result("a"), 5_000);
        history.record("b", "Simple", &result("b"), 5_000);
        history.record("c", "Simple", &result("c"), 4_000);

        let ids: Vec<i64> = history.entries().iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![5_002, 5_001, 5_000]);
    }

    #[test]
    fn test_save_and_load() {
        let storage = MemoryStorage::new();
        let mut history = History::default();
        history.record("tides", "Simple", &result("moon"), 42);
        history.save(&storage).unwrap();

        let raw = storage.get(HISTORY_KEY).unwrap();
        assert!(raw.contains("\"responseText\":\"moon\""));
        assert!(raw.contains("\"searchQueries\""));

        let loaded = History::load(&storage);
        assert_eq!(loaded.entries(), history.entries());
    }

    #[test]
    fn test_load_corrupt_is_empty() {
        let storage = MemoryStorage::new();
        storage.set(HISTORY_KEY, "not json").unwrap();
        assert!(History::load(&storage).is_empty());
    }

    #[test]
    fn test_filter_and_clear() {
        let mut history = History::default();
        history.record("History of AI", "Simple", &result("a"), 1);
        history.record("Ocean tides", "Simple", &result("b"), 2);
        history.record("AI safety", "Simple", &result("c"), 3);

        let matched: Vec<&str> = history.filter("ai").iter().map(|e| e.topic.as_str()).collect();
        assert_eq!(matched, vec!["AI safety", "History of AI"]);
        assert_eq!(history.filter("  ").len(), 3);

        history.clear();
        assert!(history.is_empty());
    }
}
