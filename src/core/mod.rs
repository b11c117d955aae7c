//! 核心模块
//!
//! 包含指纹实体、观测词汇表、完成判定和请求聚合器。

pub mod collator;
pub mod fingerprint;
pub mod fonts;
pub mod predicate;
pub mod record;

pub use collator::{Collator, CollatorConfig, CollatorStats, CompletionHandler};
pub use fingerprint::{Fingerprint, FontSet, Headers};
pub use fonts::FontCatalog;
pub use predicate::{async_predicate, predicate_fn, AlwaysComplete, CompletionPredicate};
pub use record::{DeviceRecord, ObservationKey, ObservationValue};
