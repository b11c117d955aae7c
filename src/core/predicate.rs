//! 完成判定模块
//!
//! 聚合器在每个轮询周期询问判定函数"该记录是否可以投递"。
//! 判定函数可以是异步的（例如等待外部信号），轮询会等它返回后
//! 才安排下一次判定。

use crate::core::record::DeviceRecord;
use crate::error::Result;
use std::future::Future;

/// 完成判定trait
#[async_trait::async_trait]
pub trait CompletionPredicate: Send + Sync {
    /// 判断记录是否已完成
    ///
    /// 返回错误时聚合器视为"尚未完成"并在下一个周期重试。
    async fn is_complete(&self, record: &DeviceRecord) -> Result<bool>;

    /// 判定函数名称，用于日志
    fn name(&self) -> &str {
        "predicate"
    }
}

/// 默认判定：第一次轮询即完成
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysComplete;

#[async_trait::async_trait]
impl CompletionPredicate for AlwaysComplete {
    async fn is_complete(&self, _record: &DeviceRecord) -> Result<bool> {
        Ok(true)
    }

    fn name(&self) -> &str {
        "always"
    }
}

/// 同步闭包判定
pub struct FnPredicate<F> {
    f: F,
}

/// 用同步闭包创建判定函数
pub fn predicate_fn<F>(f: F) -> FnPredicate<F>
where
    F: Fn(&DeviceRecord) -> bool + Send + Sync,
{
    FnPredicate { f }
}

#[async_trait::async_trait]
impl<F> CompletionPredicate for FnPredicate<F>
where
    F: Fn(&DeviceRecord) -> bool + Send + Sync,
{
    async fn is_complete(&self, record: &DeviceRecord) -> Result<bool> {
        Ok((self.f)(record))
    }

    fn name(&self) -> &str {
        "fn"
    }
}

/// 异步闭包判定
///
/// 闭包接收记录快照的所有权，因此返回的 future 不借用聚合器状态。
pub struct AsyncFnPredicate<F> {
    f: F,
}

/// 用异步闭包创建判定函数
pub fn async_predicate<F, Fut>(f: F) -> AsyncFnPredicate<F>
where
    F: Fn(DeviceRecord) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool>> + Send,
{
    AsyncFnPredicate { f }
}

#[async_trait::async_trait]
impl<F, Fut> CompletionPredicate for AsyncFnPredicate<F>
where
    F: Fn(DeviceRecord) -> Fut + Send + Sync,
    Fut: Future<Output = Result<bool>> + Send,
{
    async fn is_complete(&self, record: &DeviceRecord) -> Result<bool> {
        (self.f)(record.clone()).await
    }

    fn name(&self) -> &str {
        "async-fn"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FingerprintError;

    #[tokio::test]
    async fn test_always_complete() {
        assert!(AlwaysComplete.is_complete(&DeviceRecord::new()).await.unwrap());
    }

    #[tokio::test]
    async fn test_fn_predicate() {
        let predicate = predicate_fn(|record: &DeviceRecord| record.fingerprint.properties.len() >= 2);
        let mut record = DeviceRecord::new();
        record.apply("lang", "en", None).unwrap();
        assert!(!predicate.is_complete(&record).await.unwrap());
        record.apply("tz", "UTC", None).unwrap();
        assert!(predicate.is_complete(&record).await.unwrap());
    }

    #[tokio::test]
    async fn test_async_predicate_error() {
        let predicate = async_predicate(|_record: DeviceRecord| async {
            Err::<bool, FingerprintError>(FingerprintError::internal_error("signal unavailable"))
        });
        assert!(predicate.is_complete(&DeviceRecord::new()).await.is_err());
    }
}
