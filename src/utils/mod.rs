//! 工具模块

pub mod logger;

pub use logger::{
    env_builder, init_logger, installed_config, LogLevel, LogTarget, LoggerConfig,
    LoggerConfigBuilder,
};
