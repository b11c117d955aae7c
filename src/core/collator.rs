//! 请求聚合器
//!
//! 按网络地址聚合观测，每个地址同一时间最多只有一条进行中的
//! [`DeviceRecord`]。第一次观测时为该地址启动一个轮询任务，按
//! `poll_interval` 周期调用完成判定；判定第一次返回 `true` 时，
//! 在同一把写锁下把记录从聚合器中移除并取出，然后交给完成回调。
//!
//! 状态流转（每个地址）：`NO_RECORD → COLLECTING → DELIVERED`，
//! 投递后再次观测会开始一个全新的周期。

use crate::core::fingerprint::Headers;
use crate::core::predicate::{AlwaysComplete, CompletionPredicate};
use crate::core::record::{DeviceRecord, ObservationValue};
use crate::error::{FingerprintError, Result};
use crate::{fp_debug, fp_info, fp_trace, fp_warn};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// 默认轮询间隔（毫秒）
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10_000;

/// 完成回调
///
/// 在记录已经从聚合器移除之后调用，回调失败不会影响该地址后续的周期。
/// 回调运行在轮询任务中，耗时的持久化应自行派生任务。
pub trait CompletionHandler: Send + Sync + 'static {
    /// 记录完成时调用
    fn on_complete(&self, address: String, record: DeviceRecord);
}

impl<F> CompletionHandler for F
where
    F: Fn(String, DeviceRecord) + Send + Sync + 'static,
{
    fn on_complete(&self, address: String, record: DeviceRecord) {
        self(address, record)
    }
}

/// 把完成的记录发送到通道
impl CompletionHandler for mpsc::UnboundedSender<(String, DeviceRecord)> {
    fn on_complete(&self, address: String, record: DeviceRecord) {
        if self.send((address, record)).is_err() {
            fp_warn!("completion channel closed, record dropped");
        }
    }
}

/// 聚合器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollatorConfig {
    /// 两次判定之间的间隔
    #[serde(rename = "poll_interval_ms", with = "duration_ms")]
    pub poll_interval: Duration,
    /// 判定连续失败多少次后强制投递，`None` 表示无限重试
    #[serde(default)]
    pub max_predicate_failures: Option<u32>,
}

impl Default for CollatorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_predicate_failures: None,
        }
    }
}

impl CollatorConfig {
    /// 创建默认配置
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置轮询间隔
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// 设置判定失败上限
    pub fn with_max_predicate_failures(mut self, max: u32) -> Self {
        self.max_predicate_failures = Some(max);
        self
    }

    /// 验证配置
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(FingerprintError::config_error(
                "poll interval must be greater than zero",
            ));
        }
        if self.max_predicate_failures == Some(0) {
            return Err(FingerprintError::config_error(
                "max predicate failures must be at least 1",
            ));
        }
        Ok(())
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// 聚合器统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollatorStats {
    /// 已开始的聚合周期数
    pub cycles_started: u64,
    /// 已接受的观测数
    pub observations: u64,
    /// 被拒绝的观测数
    pub rejected_observations: u64,
    /// 已投递的记录数（含强制投递）
    pub deliveries: u64,
    /// 强制投递数（关闭或判定失败超限）
    pub forced_deliveries: u64,
    /// 判定失败次数
    pub predicate_failures: u64,
}

#[derive(Debug, Default)]
struct StatsCounters {
    cycles_started: AtomicU64,
    observations: AtomicU64,
    rejected_observations: AtomicU64,
    deliveries: AtomicU64,
    forced_deliveries: AtomicU64,
    predicate_failures: AtomicU64,
}

impl StatsCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CollatorStats {
        CollatorStats {
            cycles_started: self.cycles_started.load(Ordering::Relaxed),
            observations: self.observations.load(Ordering::Relaxed),
            rejected_observations: self.rejected_observations.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            forced_deliveries: self.forced_deliveries.load(Ordering::Relaxed),
            predicate_failures: self.predicate_failures.load(Ordering::Relaxed),
        }
    }
}

/// 单个地址的状态
///
/// 记录被取出后槽位为空，之后到达的观测只能进入新的槽位。
#[derive(Debug)]
struct AddressSlot {
    record: Mutex<Option<DeviceRecord>>,
    task: Mutex<Option<AbortHandle>>,
}

impl AddressSlot {
    fn new(record: DeviceRecord) -> Self {
        Self {
            record: Mutex::new(Some(record)),
            task: Mutex::new(None),
        }
    }

    fn snapshot(&self) -> Option<DeviceRecord> {
        self.record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn take(&self) -> Option<DeviceRecord> {
        self.record
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn abort(&self) {
        if let Some(task) = self.task.lock().unwrap_or_else(PoisonError::into_inner).take() {
            task.abort();
        }
    }
}

struct Shared {
    config: CollatorConfig,
    predicate: Arc<dyn CompletionPredicate>,
    handler: Arc<dyn CompletionHandler>,
    pending: RwLock<HashMap<String, Arc<AddressSlot>>>,
    closed: AtomicBool,
    stats: StatsCounters,
}

impl Shared {
    /// 取出并投递记录
    ///
    /// 移除映射项与取出记录在同一把写锁下完成，插入方要么写进
    /// 这次投递的记录，要么开始新周期，不会写进已投递的记录。
    fn deliver(&self, address: &str, slot: &Arc<AddressSlot>, forced: bool) {
        let record = {
            let mut pending = self.pending.write().unwrap_or_else(PoisonError::into_inner);
            if pending.get(address).is_some_and(|current| Arc::ptr_eq(current, slot)) {
                pending.remove(address);
            }
            slot.take()
        };

        // 关闭流程已经取走了记录
        let Some(record) = record else {
            return;
        };

        StatsCounters::bump(&self.stats.deliveries);
        if forced {
            StatsCounters::bump(&self.stats.forced_deliveries);
        }
        fp_info!(
            "delivering record for {} (cycle {}, {} properties, {} fonts, forced: {})",
            address,
            record.cycle_id(),
            record.fingerprint.properties.len(),
            record.fingerprint.fonts.fonts().len(),
            forced
        );
        self.handler.on_complete(address.to_string(), record);
    }
}

/// 请求聚合器
///
/// 克隆开销很小，所有克隆共享同一份状态。`insert` 需要在 tokio
/// 运行时可用的前提下构建聚合器，轮询任务派生在该运行时上。
/// 聚合器被丢弃不会取消进行中的周期，未投递的记录仍会按时投递；
/// 需要立即清空时调用 [`Collator::shutdown`]。
#[derive(Clone)]
pub struct Collator {
    shared: Arc<Shared>,
    runtime: Handle,
}

impl std::fmt::Debug for Collator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collator")
            .field("config", &self.shared.config)
            .field("predicate", &self.shared.predicate.name())
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl Collator {
    /// 使用默认配置和默认判定创建聚合器
    pub fn new<H: CompletionHandler>(handler: H) -> Result<Self> {
        let runtime = Handle::try_current()
            .map_err(|e| FingerprintError::config_error(format!("no tokio runtime: {}", e)))?;
        Self::with_parts(
            CollatorConfig::default(),
            Arc::new(AlwaysComplete),
            Arc::new(handler),
            runtime,
        )
    }

    /// 创建聚合器构造器
    pub fn builder() -> crate::builder::CollatorBuilder {
        crate::builder::CollatorBuilder::new()
    }

    pub(crate) fn with_parts(
        config: CollatorConfig,
        predicate: Arc<dyn CompletionPredicate>,
        handler: Arc<dyn CompletionHandler>,
        runtime: Handle,
    ) -> Result<Self> {
        config.validate()?;
        fp_debug!(
            "collator created: poll interval {:?}, predicate '{}'",
            config.poll_interval,
            predicate.name()
        );
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                predicate,
                handler,
                pending: RwLock::new(HashMap::new()),
                closed: AtomicBool::new(false),
                stats: StatsCounters::default(),
            }),
            runtime,
        })
    }

    /// 插入一条观测
    ///
    /// 该地址没有进行中的记录时创建新记录并启动轮询；否则原地修改
    /// 现有记录，不影响正在运行的轮询。观测被拒绝时返回错误，已有
    /// 记录保持不变，新地址也不会留下任何状态。
    pub fn insert<V>(
        &self,
        address: &str,
        key: &str,
        value: V,
        headers: Option<Headers>,
    ) -> Result<()>
    where
        V: Into<ObservationValue>,
    {
        if self.is_closed() {
            return Err(FingerprintError::ShutDown);
        }
        let value = value.into();

        // 已有记录：只持有读锁，不同地址互不阻塞
        {
            let pending = self.shared.pending.read()?;
            if let Some(slot) = pending.get(address) {
                return self.apply_to_slot(address, slot, key, value, headers);
            }
        }

        let mut pending = self.shared.pending.write()?;
        if self.is_closed() {
            return Err(FingerprintError::ShutDown);
        }
        match pending.entry(address.to_string()) {
            Entry::Occupied(entry) => self.apply_to_slot(address, entry.get(), key, value, headers),
            Entry::Vacant(entry) => {
                let mut record = DeviceRecord::new();
                if let Err(err) = record.apply(key, value, headers) {
                    StatsCounters::bump(&self.shared.stats.rejected_observations);
                    return Err(err);
                }
                fp_debug!("new cycle {} for {}", record.cycle_id(), address);

                let slot = Arc::new(AddressSlot::new(record));
                entry.insert(Arc::clone(&slot));
                let task = self.runtime.spawn(poll_cycle(
                    Arc::clone(&self.shared),
                    address.to_string(),
                    Arc::clone(&slot),
                ));
                *slot.task.lock()? = Some(task.abort_handle());

                StatsCounters::bump(&self.shared.stats.cycles_started);
                StatsCounters::bump(&self.shared.stats.observations);
                Ok(())
            }
        }
    }

    fn apply_to_slot(
        &self,
        address: &str,
        slot: &AddressSlot,
        key: &str,
        value: ObservationValue,
        headers: Option<Headers>,
    ) -> Result<()> {
        let mut record = slot.record.lock()?;
        let record = record.as_mut().ok_or_else(|| {
            FingerprintError::internal_error(format!("pending slot for {} is empty", address))
        })?;
        match record.apply(key, value, headers) {
            Ok(_) => {
                StatsCounters::bump(&self.shared.stats.observations);
                fp_trace!("observation '{}' applied to {}", key, address);
                Ok(())
            }
            Err(err) => {
                StatsCounters::bump(&self.shared.stats.rejected_observations);
                Err(err)
            }
        }
    }

    /// 关闭聚合器并强制投递所有未完成的记录
    ///
    /// 返回投递的记录数。关闭后 `insert` 返回 [`FingerprintError::ShutDown`]。
    pub fn shutdown(&self) -> Result<usize> {
        self.shared.closed.store(true, Ordering::SeqCst);
        let drained: Vec<(String, DeviceRecord)> = {
            let mut pending = self.shared.pending.write()?;
            pending
                .drain()
                .filter_map(|(address, slot)| {
                    slot.abort();
                    slot.take().map(|record| (address, record))
                })
                .collect()
        };

        fp_info!("collator shutting down, flushing {} pending records", drained.len());
        let count = drained.len();
        for (address, record) in drained {
            StatsCounters::bump(&self.shared.stats.deliveries);
            StatsCounters::bump(&self.shared.stats.forced_deliveries);
            self.shared.handler.on_complete(address, record);
        }
        Ok(count)
    }

    /// 是否已关闭
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }

    /// 进行中的地址数量
    pub fn pending_count(&self) -> usize {
        self.shared
            .pending
            .read()
            .map(|pending| pending.len())
            .unwrap_or(0)
    }

    /// 地址是否有进行中的记录
    pub fn is_pending(&self, address: &str) -> bool {
        self.shared
            .pending
            .read()
            .map(|pending| pending.contains_key(address))
            .unwrap_or(false)
    }

    /// 获取某地址当前记录的副本
    pub fn snapshot(&self, address: &str) -> Option<DeviceRecord> {
        let pending = self.shared.pending.read().ok()?;
        pending.get(address)?.snapshot()
    }

    /// 获取统计信息
    pub fn stats(&self) -> CollatorStats {
        self.shared.stats.snapshot()
    }

    /// 获取配置
    pub fn config(&self) -> &CollatorConfig {
        &self.shared.config
    }
}

/// 单个地址的轮询周期
///
/// 同一地址的判定串行执行：判定返回之前不会开始下一次判定，
/// 慢判定导致的错过节拍顺延而不是补发。
async fn poll_cycle(shared: Arc<Shared>, address: String, slot: Arc<AddressSlot>) {
    let period = shared.config.poll_interval;
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failures = 0u32;

    let forced = loop {
        ticker.tick().await;

        let Some(snapshot) = slot.snapshot() else {
            return;
        };
        match shared.predicate.is_complete(&snapshot).await {
            Ok(true) => break false,
            Ok(false) => {
                fp_trace!("{} not complete yet", address);
            }
            Err(err) => {
                failures += 1;
                StatsCounters::bump(&shared.stats.predicate_failures);
                let err = FingerprintError::predicate_failed(address.as_str(), err.to_string());
                fp_warn!("{} (attempt {})", err, failures);
                if shared
                    .config
                    .max_predicate_failures
                    .is_some_and(|max| failures >= max)
                {
                    fp_warn!("predicate failure limit reached for {}, forcing delivery", address);
                    break true;
                }
            }
        }
    };

    shared.deliver(&address, &slot, forced);
}
