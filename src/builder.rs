//! 聚合器构造器模块
//!
//! 提供流畅的链式API来构建和配置请求聚合器。

use crate::core::collator::{Collator, CollatorConfig, CompletionHandler};
use crate::core::predicate::{AlwaysComplete, CompletionPredicate};
use crate::error::{FingerprintError, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;

/// 聚合器构造器
///
/// # 示例
///
/// ```rust
/// use css_fingerprint::{CollatorBuilder, DeviceRecord};
/// use std::time::Duration;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let collator = CollatorBuilder::new()
///     .with_poll_interval(Duration::from_millis(500))
///     .with_predicate_fn(|record: &DeviceRecord| record.fingerprint.properties.len() >= 10)
///     .build(|address: String, record: DeviceRecord| {
///         println!("{} -> {:?}", address, record.fingerprint.properties);
///     })?;
///
/// collator.insert("203.0.113.7", "font-probe", "Arial", None)?;
/// # Ok(())
/// # }
/// ```
pub struct CollatorBuilder {
    config: CollatorConfig,
    predicate: Arc<dyn CompletionPredicate>,
    runtime: Option<Handle>,
}

impl Default for CollatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CollatorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollatorBuilder")
            .field("config", &self.config)
            .field("predicate", &self.predicate.name())
            .field("runtime", &self.runtime.is_some())
            .finish()
    }
}

impl CollatorBuilder {
    /// 创建新的聚合器构造器
    pub fn new() -> Self {
        Self {
            config: CollatorConfig::default(),
            predicate: Arc::new(AlwaysComplete),
            runtime: None,
        }
    }

    /// 使用完整配置
    pub fn with_config(mut self, config: CollatorConfig) -> Self {
        self.config = config;
        self
    }

    /// 设置轮询间隔
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// 设置判定失败上限，达到后强制投递
    pub fn with_max_predicate_failures(mut self, max: u32) -> Self {
        self.config.max_predicate_failures = Some(max);
        self
    }

    /// 设置完成判定
    pub fn with_predicate<P: CompletionPredicate + 'static>(mut self, predicate: P) -> Self {
        self.predicate = Arc::new(predicate);
        self
    }

    /// 使用同步闭包作为完成判定
    pub fn with_predicate_fn<F>(self, f: F) -> Self
    where
        F: Fn(&crate::core::record::DeviceRecord) -> bool + Send + Sync + 'static,
    {
        self.with_predicate(crate::core::predicate::predicate_fn(f))
    }

    /// 指定轮询任务所在的运行时，默认使用当前运行时
    pub fn with_runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// 构建聚合器
    pub fn build<H: CompletionHandler>(self, handler: H) -> Result<Collator> {
        self.config.validate()?;
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|e| {
                FingerprintError::config_error(format!("no tokio runtime: {}", e))
            })?,
        };
        Collator::with_parts(self.config, self.predicate, Arc::new(handler), runtime)
    }
}
