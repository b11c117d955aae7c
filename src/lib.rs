//! # css_fingerprint: 被动指纹聚合框架
//!
//! 通过观察同一网络地址发出的一系列小型HTTP请求（CSS侧信道字体探测、
//! 重定向链追踪）被动识别客户端，把这些观测聚合为每个地址一条记录，
//! 在记录"完成"后只向下游投递一次。
//!
//! ## 特性
//!
//! - **按地址聚合**: 每个地址同一时间只有一条进行中的记录
//! - **单次投递**: 判定、投递、移除作为一个不可分割的步骤执行
//! - **异步判定**: 完成判定可以等待外部信号
//! - **优雅关闭**: 关闭时强制投递所有未完成记录
//!
//! ## 快速开始
//!
//! 用 [`CollatorBuilder`] 创建聚合器，HTTP层对每个探测请求调用
//! [`Collator::insert`]，在完成回调中持久化记录。

#![deny(missing_docs)]
#![warn(clippy::all)]

// 核心模块
pub mod core;
pub mod error;

// 工具模块
pub mod utils;

// 构造器
pub mod builder;

// 持久化接口
pub mod sink;

// 重新导出核心类型
pub use crate::core::{
    collator::{Collator, CollatorConfig, CollatorStats, CompletionHandler},
    fingerprint::{Fingerprint, FontSet, Headers},
    fonts::FontCatalog,
    predicate::{async_predicate, predicate_fn, AlwaysComplete, CompletionPredicate},
    record::{DeviceRecord, ObservationKey, ObservationValue},
};

pub use crate::builder::CollatorBuilder;
pub use crate::error::{FingerprintError, Result};
pub use crate::sink::{FingerprintEntry, MemorySink, RecordSink, SinkHandler};

/// 库版本信息
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 库名称
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// 库描述
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
