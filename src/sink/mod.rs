//! 持久化接口模块
//!
//! 聚合器只负责投递完成的记录；写库由外部协作者完成。这里定义
//! 写入的数据行、异步写入trait，以及把二者接到聚合器回调上的
//! [`SinkHandler`]。写入是"发出即忘"的：失败只记录日志，不重试。

pub mod memory;

pub use memory::MemorySink;

use crate::core::collator::CompletionHandler;
use crate::core::fonts::FontCatalog;
use crate::core::record::DeviceRecord;
use crate::error::{FingerprintError, Result};
use crate::{fp_debug, fp_error};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use uuid::Uuid;

/// 指纹数据行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FingerprintEntry {
    /// 来源地址
    pub address: String,
    /// 记录创建时间
    pub timestamp: DateTime<Utc>,
    /// 聚合周期ID
    pub cycle_id: Uuid,
    /// 指纹JSON（已推导出安装字体）
    pub fingerprint: String,
    /// 自定义属性
    pub custom_properties: BTreeMap<String, String>,
}

impl FingerprintEntry {
    /// 从完成的记录生成数据行
    ///
    /// 会对记录执行一次字体推导，记录中的字体必须仍是探测状态。
    pub fn from_record(address: &str, mut record: DeviceRecord, catalog: &FontCatalog) -> Result<Self> {
        record.fingerprint.derive_present_fonts(catalog.iter())?;
        Ok(Self {
            address: address.to_string(),
            timestamp: record.timestamp(),
            cycle_id: record.cycle_id(),
            fingerprint: record.fingerprint.to_json()?,
            custom_properties: record.custom_properties,
        })
    }
}

/// 记录写入trait
#[async_trait::async_trait]
pub trait RecordSink: Send + Sync {
    /// 写入一行
    async fn store(&self, entry: FingerprintEntry) -> Result<()>;

    /// 名称，用于日志
    fn name(&self) -> &str {
        "sink"
    }
}

/// 把完成的记录写入 [`RecordSink`] 的回调
pub struct SinkHandler<S> {
    sink: Arc<S>,
    catalog: Arc<FontCatalog>,
    runtime: Handle,
    min_properties: usize,
}

impl<S: RecordSink + 'static> SinkHandler<S> {
    /// 创建回调，写入任务派生在当前运行时上
    pub fn new(sink: Arc<S>, catalog: FontCatalog) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| FingerprintError::config_error(format!("no tokio runtime: {}", e)))?;
        Ok(Self {
            sink,
            catalog: Arc::new(catalog),
            runtime,
            min_properties: 0,
        })
    }

    /// 属性少于 `min` 的记录不写入（页面刷新等零碎请求）
    pub fn with_min_properties(mut self, min: usize) -> Self {
        self.min_properties = min;
        self
    }

    /// 指定写入任务所在的运行时
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = runtime;
        self
    }
}

impl<S: RecordSink + 'static> CompletionHandler for SinkHandler<S> {
    fn on_complete(&self, address: String, record: DeviceRecord) {
        let properties = record.fingerprint.properties.len();
        if properties < self.min_properties {
            fp_debug!(
                "skipping {} with {} properties (minimum {})",
                address,
                properties,
                self.min_properties
            );
            return;
        }

        let entry = match FingerprintEntry::from_record(&address, record, &self.catalog) {
            Ok(entry) => entry,
            Err(err) => {
                fp_error!("failed to build entry for {}: {}", address, err);
                return;
            }
        };

        let sink = Arc::clone(&self.sink);
        self.runtime.spawn(async move {
            if let Err(err) = sink.store(entry).await {
                fp_error!("{} failed to store record for {}: {}", sink.name(), address, err);
            }
        });
    }
}
