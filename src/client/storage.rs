//! 客户端本地存储端口
//!
//! 按键存取字符串值，对应浏览器 localStorage 的语义。

use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use super::ClientError;

/// 键值存储端口
pub trait StoragePort: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<(), ClientError>;
}

/// 内存存储
#[derive(Default)]
pub struct MemoryStorage {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoragePort for MemoryStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// 单个 JSON 文件存储，文件内容是 `{键: 字符串值}`
pub struct FileStorage {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStorage {
    /// 打开存储文件，不存在或已损坏时从空状态开始
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let values = Self::read_file(&path).unwrap_or_default();
        Self {
            path,
            values: Mutex::new(values),
        }
    }

    fn read_file(path: &Path) -> Option<BTreeMap<String, String>> {
        let content = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(values) => Some(values),
            Err(e) => {
                warn!("Ignoring corrupt client state {}: {}", path.display(), e);
                None
            }
        }
    }

    fn flush(&self, values: &BTreeMap<String, String>) -> Result<(), ClientError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ClientError::Storage(format!("{}: {}", parent.display(), e)))?;
        }
        let content = serde_json::to_string_pretty(values)
            .map_err(|e| ClientError::Storage(e.to_string()))?;
        fs::write(&self.path, content)
            .map_err(|e| ClientError::Storage(format!("{}: {}", self.path.display(), e)))
    }
}

impl StoragePort for FileStorage {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ClientError> {
        let mut values = self.values.lock();
        values.insert(key.to_string(), value.to_string());
        self.flush(&values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("theme"), None);
        storage.set("theme", "dark").unwrap();
        assert_eq!(storage.get("theme").as_deref(), Some("dark"));
        storage.set("theme", "light").unwrap();
        assert_eq!(storage.get("theme").as_deref(), Some("light"));
    }

    #[test]
    fn test_file_storage_persists_across_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("client_state.json");

        let storage = FileStorage::open(&path);
        storage.set("theme", "dark").unwrap();
        storage.set("postHistory", "[]").unwrap();

        let reopened = FileStorage::open(&path);
        assert_eq!(reopened.get("theme").as_deref(), Some("dark"));
        assert_eq!(reopened.get("postHistory").as_deref(), Some("[]"));
    }

    #[test]
    fn test_file_storage_ignores_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("client_state.json");
        fs::write(&path, "{broken").unwrap();

        let storage = FileStorage::open(&path);
        assert_eq!(storage.get("theme"), None);
        storage.set("theme", "light").unwrap();
        assert_eq!(FileStorage::open(&path).get("theme").as_deref(), Some("light"));
    }
}
