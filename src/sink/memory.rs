//! 内存写入实现

use super::{FingerprintEntry, RecordSink};
use crate::error::Result;
use tokio::sync::Mutex;

/// 把数据行保存在内存中的写入器
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<FingerprintEntry>>,
}

impl MemorySink {
    /// 创建空写入器
    pub fn new() -> Self {
        Self::default()
    }

    /// 已写入的数据行副本
    pub async fn entries(&self) -> Vec<FingerprintEntry> {
        self.entries.lock().await.clone()
    }

    /// 已写入的行数
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// 是否为空
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }
}

#[async_trait::async_trait]
impl RecordSink for MemorySink {
    async fn store(&self, entry: FingerprintEntry) -> Result<()> {
        self.entries.lock().await.push(entry);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}
