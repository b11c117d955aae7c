//! 错误处理模块
//!
//! 定义指纹聚合框架中使用的所有错误类型。所有错误都只作用于单个地址，
//! 不会导致整个进程失败。

use thiserror::Error;

/// 指纹聚合框架的结果类型
pub type Result<T> = std::result::Result<T, FingerprintError>;

/// 指纹聚合错误类型
#[derive(Error, Debug)]
pub enum FingerprintError {
    /// 观测参数格式错误（例如 custom 观测不是键值对）
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// 错误消息
        message: String,
    },

    /// 完成判定函数执行失败
    #[error("Completion predicate failed for {address}: {reason}")]
    PredicateFailed {
        /// 网络地址
        address: String,
        /// 失败原因
        reason: String,
    },

    /// 字体推导只能执行一次
    #[error("Present fonts have already been derived for this fingerprint")]
    AlreadyDerived,

    /// 配置错误
    #[error("Configuration error: {message}")]
    ConfigError {
        /// 错误消息
        message: String,
    },

    /// 聚合器已关闭
    #[error("Collator has been shut down")]
    ShutDown,

    /// 序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O错误
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// 内部错误
    #[error("Internal error: {message}")]
    InternalError {
        /// 错误消息
        message: String,
    },
}

impl FingerprintError {
    /// 创建参数错误
    pub fn invalid_argument<S: Into<String>>(message: S) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// 创建判定失败错误
    pub fn predicate_failed<S1, S2>(address: S1, reason: S2) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        Self::PredicateFailed {
            address: address.into(),
            reason: reason.into(),
        }
    }

    /// 创建配置错误
    pub fn config_error<S: Into<String>>(message: S) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// 创建内部错误
    pub fn internal_error<S: Into<String>>(message: S) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// 检查是否为可恢复错误
    ///
    /// 可恢复错误不会影响已有的聚合状态，调用方可以重试或忽略。
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. } | Self::PredicateFailed { .. }
        )
    }

    /// 检查是否为配置相关错误
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigError { .. })
    }

    /// 获取错误代码
    pub fn error_code(&self) -> u32 {
        match self {
            Self::InvalidArgument { .. } => 2001,
            Self::PredicateFailed { .. } => 2002,
            Self::AlreadyDerived => 2003,
            Self::ConfigError { .. } => 2004,
            Self::ShutDown => 2005,
            Self::Serialization(_) => 2006,
            Self::IoError(_) => 2007,
            Self::InternalError { .. } => 2999,
        }
    }
}

/// 从anyhow::Error转换
///
/// 外部判定函数通常返回 `anyhow::Result`，这里统一转为内部错误。
impl From<anyhow::Error> for FingerprintError {
    fn from(err: anyhow::Error) -> Self {
        Self::internal_error(err.to_string())
    }
}

impl<T> From<std::sync::PoisonError<T>> for FingerprintError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::internal_error(format!("lock poisoned: {}", err))
    }
}
