//! 日志模块
//!
//! 基于 `log` 门面提供统一的日志接口和配置。库内部只通过 `fp_*` 宏写日志，
//! 宿主程序既可以安装自己的 `log` 后端，也可以调用 [`init_logger`]
//! 把 [`LoggerConfig`] 映射到 `env_logger` 上输出到终端或文件。

use crate::error::{FingerprintError, Result};
use env_logger::{Builder, Target};
use log::LevelFilter;
use once_cell::sync::OnceCell;
use std::fs::OpenOptions;

#[doc(hidden)]
pub use log as __log;

/// 库日志使用的 target
pub const LOG_TARGET: &str = "css_fingerprint";

/// 日志配置
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// 是否启用日志
    pub enabled: bool,
    /// 日志级别
    pub level: LogLevel,
    /// 是否显示时间戳
    pub show_timestamp: bool,
    /// 是否显示日志 target
    pub show_module: bool,
    /// 是否显示行号
    pub show_line_number: bool,
    /// 输出目标
    pub target: LogTarget,
}

/// 日志级别
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// 错误
    Error,
    /// 警告
    Warn,
    /// 信息
    Info,
    /// 调试
    Debug,
    /// 跟踪
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// 日志输出目标
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    /// 标准输出
    Stdout,
    /// 标准错误
    Stderr,
    /// 文件（追加写入）
    File(String),
}

impl LoggerConfig {
    /// 对应的 `log` 级别过滤，禁用时为 `Off`
    pub fn level_filter(&self) -> LevelFilter {
        if self.enabled {
            self.level.into()
        } else {
            LevelFilter::Off
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            level: LogLevel::Info,
            show_timestamp: true,
            show_module: true,
            show_line_number: false,
            target: LogTarget::Stdout,
        }
    }
}

/// 按配置生成 `env_logger` 构建器
///
/// 文件目标在这里打开，路径不可写时返回 [`FingerprintError::IoError`]。
pub fn env_builder(config: &LoggerConfig) -> Result<Builder> {
    let mut builder = Builder::new();
    builder
        .filter_level(config.level_filter())
        .format_target(config.show_module)
        .format_module_path(false)
        .format_line_number(config.show_line_number);
    if config.show_timestamp {
        builder.format_timestamp_millis();
    } else {
        builder.format_timestamp(None);
    }

    let target = match &config.target {
        LogTarget::Stdout => Target::Stdout,
        LogTarget::Stderr => Target::Stderr,
        LogTarget::File(path) => Target::Pipe(Box::new(
            OpenOptions::new().create(true).append(true).open(path)?,
        )),
    };
    builder.target(target);
    Ok(builder)
}

/// 已安装的日志配置
static INSTALLED: OnceCell<LoggerConfig> = OnceCell::new();

/// 初始化全局日志器
///
/// 只有第一次调用生效；若宿主程序已经安装了别的 `log` 后端则返回
/// [`FingerprintError::ConfigError`]。
pub fn init_logger(config: LoggerConfig) -> Result<()> {
    env_builder(&config)?.try_init().map_err(|e| {
        FingerprintError::config_error(format!("logger already installed: {}", e))
    })?;
    INSTALLED.get_or_init(|| config);
    Ok(())
}

/// 获取通过 [`init_logger`] 安装的配置
pub fn installed_config() -> Option<&'static LoggerConfig> {
    INSTALLED.get()
}

/// 错误日志
#[macro_export]
macro_rules! fp_error {
    ($($arg:tt)*) => {
        $crate::utils::logger::__log::error!(target: $crate::utils::logger::LOG_TARGET, $($arg)*)
    };
}

/// 警告日志
#[macro_export]
macro_rules! fp_warn {
    ($($arg:tt)*) => {
        $crate::utils::logger::__log::warn!(target: $crate::utils::logger::LOG_TARGET, $($arg)*)
    };
}

/// 信息日志
#[macro_export]
macro_rules! fp_info {
    ($($arg:tt)*) => {
        $crate::utils::logger::__log::info!(target: $crate::utils::logger::LOG_TARGET, $($arg)*)
    };
}

/// 调试日志
#[macro_export]
macro_rules! fp_debug {
    ($($arg:tt)*) => {
        $crate::utils::logger::__log::debug!(target: $crate::utils::logger::LOG_TARGET, $($arg)*)
    };
}

/// 跟踪日志
#[macro_export]
macro_rules! fp_trace {
    ($($arg:tt)*) => {
        $crate::utils::logger::__log::trace!(target: $crate::utils::logger::LOG_TARGET, $($arg)*)
    };
}

/// 构建器模式的日志配置
#[derive(Debug, Default)]
pub struct LoggerConfigBuilder {
    config: LoggerConfig,
}

impl LoggerConfigBuilder {
    /// 创建新的配置构建器
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置是否启用日志
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// 设置日志级别
    pub fn level(mut self, level: LogLevel) -> Self {
        self.config.level = level;
        self
    }

    /// 设置是否显示时间戳
    pub fn show_timestamp(mut self, show: bool) -> Self {
        self.config.show_timestamp = show;
        self
    }

    /// 设置是否显示日志 target
    pub fn show_module(mut self, show: bool) -> Self {
        self.config.show_module = show;
        self
    }

    /// 设置是否显示行号
    pub fn show_line_number(mut self, show: bool) -> Self {
        self.config.show_line_number = show;
        self
    }

    /// 设置输出目标
    pub fn target(mut self, target: LogTarget) -> Self {
        self.config.target = target;
        self
    }

    /// 构建配置
    pub fn build(self) -> LoggerConfig {
        self.config
    }

    /// 构建并初始化日志器
    pub fn init(self) -> Result<()> {
        init_logger(self.config)
    }
}

/// 创建禁用日志的配置
pub fn disabled_config() -> LoggerConfig {
    LoggerConfig {
        enabled: false,
        ..Default::default()
    }
}

/// 创建开发环境的日志配置
pub fn dev_config() -> LoggerConfig {
    LoggerConfigBuilder::new()
        .level(LogLevel::Debug)
        .show_line_number(true)
        .target(LogTarget::Stderr)
        .build()
}

/// 创建生产环境的日志配置
pub fn prod_config() -> LoggerConfig {
    LoggerConfigBuilder::new()
        .level(LogLevel::Info)
        .show_module(false)
        .target(LogTarget::Stdout)
        .build()
}

/// 创建文件日志配置
pub fn file_config<P: Into<String>>(path: P) -> LoggerConfig {
    LoggerConfigBuilder::new()
        .level(LogLevel::Info)
        .show_line_number(true)
        .target(LogTarget::File(path.into()))
        .build()
}
