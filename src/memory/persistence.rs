//! 持久化：键值存储端口 + 消息日志 / 助手设置的读写
//!
//! 核心逻辑只依赖 KeyValueStore（get / set / remove）；FileStore 把每个键写成 `<dir>/<key>.json`，
//! MemoryStore 用于测试与无盘运行。缺失的键等价于空状态 / 默认设置。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;

use crate::config::AssistantSettings;
use crate::memory::Message;

pub const MESSAGES_KEY: &str = "bizpilot-messages";
pub const SETTINGS_KEY: &str = "bizpilot-settings";

/// 持久键值存储端口
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    fn remove(&self, key: &str) -> anyhow::Result<()>;
}

/// 进程内存储
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let map = self.entries.lock().map_err(|_| anyhow::anyhow!("memory store poisoned"))?;
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut map = self.entries.lock().map_err(|_| anyhow::anyhow!("memory store poisoned"))?;
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        let mut map = self.entries.lock().map_err(|_| anyhow::anyhow!("memory store poisoned"))?;
        map.remove(key);
        Ok(())
    }
}

/// 文件存储：每个键一个 JSON 文件；目录不存在时写入前自动创建
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
        Ok(Some(data))
    }

    fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir).with_context(|| format!("creating {}", self.dir.display()))?;
        let path = self.path_for(key);
        std::fs::write(&path, value).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> anyhow::Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            std::fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
        }
        Ok(())
    }
}

/// 读取消息日志；缺失为空，内容损坏时记录告警并视为空
pub fn load_messages(store: &dyn KeyValueStore) -> anyhow::Result<Vec<Message>> {
    let Some(data) = store.get(MESSAGES_KEY)? else {
        return Ok(Vec::new());
    };
    match serde_json::from_str(&data) {
        Ok(messages) => Ok(messages),
        Err(e) => {
            tracing::warn!(error = %e, key = MESSAGES_KEY, "stored messages unreadable, starting empty");
            Ok(Vec::new())
        }
    }
}

pub fn save_messages(store: &dyn KeyValueStore, messages: &[Message]) -> anyhow::Result<()> {
    store.set(MESSAGES_KEY, &serde_json::to_string_pretty(messages)?)
}

pub fn clear_messages(store: &dyn KeyValueStore) -> anyhow::Result<()> {
    store.remove(MESSAGES_KEY)
}

/// 读取助手设置；缺失或损坏时返回默认值
pub fn load_settings(store: &dyn KeyValueStore) -> anyhow::Result<AssistantSettings> {
    let Some(data) = store.get(SETTINGS_KEY)? else {
        return Ok(AssistantSettings::default());
    };
    match serde_json::from_str(&data) {
        Ok(settings) => Ok(settings),
        Err(e) => {
            tracing::warn!(error = %e, key = SETTINGS_KEY, "stored settings unreadable, using defaults");
            Ok(AssistantSettings::default())
        }
    }
}

pub fn save_settings(store: &dyn KeyValueStore, settings: &AssistantSettings) -> anyhow::Result<()> {
    store.set(SETTINGS_KEY, &serde_json::to_string_pretty(settings)?)
}

pub fn clear_settings(store: &dyn KeyValueStore) -> anyhow::Result<()> {
    store.remove(SETTINGS_KEY)
}
