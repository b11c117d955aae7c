//! 设备记录模块
//!
//! 定义单个网络地址在一个聚合周期内的完整记录，以及观测的键值词汇表。

use crate::core::fingerprint::{Fingerprint, Headers};
use crate::error::{FingerprintError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 字体探测观测键
pub const FONT_PROBE_KEY: &str = "font-probe";
/// 旧版客户端使用的字体探测键
pub const LEGACY_FONT_PROBE_KEY: &str = "font-name";
/// 自定义属性观测键
pub const CUSTOM_KEY: &str = "custom";

/// 观测键
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ObservationKey {
    /// 字体探测信号
    FontProbe,
    /// 自定义键值对
    Custom,
    /// 普通属性
    Property(String),
}

impl ObservationKey {
    /// 键的字符串形式
    pub fn as_str(&self) -> &str {
        match self {
            Self::FontProbe => FONT_PROBE_KEY,
            Self::Custom => CUSTOM_KEY,
            Self::Property(key) => key,
        }
    }
}

impl FromStr for ObservationKey {
    type Err = FingerprintError;

    fn from_str(key: &str) -> Result<Self> {
        match key {
            FONT_PROBE_KEY | LEGACY_FONT_PROBE_KEY => Ok(Self::FontProbe),
            CUSTOM_KEY => Ok(Self::Custom),
            other => Ok(Self::Property(other.to_string())),
        }
    }
}

impl fmt::Display for ObservationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 观测值
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservationValue {
    /// 普通文本值
    Text(String),
    /// 键值对，仅用于自定义属性
    Pair(String, String),
}

impl From<&str> for ObservationValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ObservationValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<K: Into<String>, V: Into<String>> From<(K, V)> for ObservationValue {
    fn from((key, value): (K, V)) -> Self {
        Self::Pair(key.into(), value.into())
    }
}

/// 设备记录
///
/// 在某个地址第一次被观测到时创建，之后的观测原地修改，
/// 投递给完成回调后即从聚合器中移除。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    timestamp: DateTime<Utc>,
    cycle_id: Uuid,
    /// 设备指纹
    pub fingerprint: Fingerprint,
    /// 词汇表之外的自定义属性
    pub custom_properties: BTreeMap<String, String>,
}

impl Default for DeviceRecord {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceRecord {
    /// 创建新记录，时间戳取当前时间
    pub fn new() -> Self {
        Self {
            timestamp: Utc::now(),
            cycle_id: Uuid::new_v4(),
            fingerprint: Fingerprint::new(),
            custom_properties: BTreeMap::new(),
        }
    }

    /// 创建时间
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// 聚合周期ID
    pub fn cycle_id(&self) -> Uuid {
        self.cycle_id
    }

    /// 应用一条观测
    ///
    /// - `font-probe`（或旧版 `font-name`）：记录字体探测；
    /// - `custom`：值必须是 [`ObservationValue::Pair`]，写入自定义属性；
    /// - 其他键：写入普通属性。
    ///
    /// 校验失败时记录保持不变，请求头也不会被覆盖。
    pub fn apply<V>(&mut self, key: &str, value: V, headers: Option<Headers>) -> Result<&mut Self>
    where
        V: Into<ObservationValue>,
    {
        let key: ObservationKey = key.parse()?;
        match (key, value.into()) {
            (ObservationKey::Custom, ObservationValue::Pair(sub_key, sub_value)) => {
                self.custom_properties.insert(sub_key, sub_value);
            }
            (ObservationKey::Custom, ObservationValue::Text(text)) => {
                return Err(FingerprintError::invalid_argument(format!(
                    "custom observations take a (key, value) pair, got text {:?}",
                    text
                )));
            }
            (key, ObservationValue::Pair(..)) => {
                return Err(FingerprintError::invalid_argument(format!(
                    "observation '{}' takes a text value, got a pair",
                    key
                )));
            }
            (ObservationKey::FontProbe, ObservationValue::Text(font)) => {
                self.fingerprint.record_font_probe(font)?;
            }
            (ObservationKey::Property(key), ObservationValue::Text(value)) => {
                self.fingerprint.set_property(key, value);
            }
        }

        if let Some(headers) = headers {
            self.fingerprint.headers = Some(headers);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_vocabulary() {
        assert_eq!("font-probe".parse::<ObservationKey>().unwrap(), ObservationKey::FontProbe);
        assert_eq!("font-name".parse::<ObservationKey>().unwrap(), ObservationKey::FontProbe);
        assert_eq!("custom".parse::<ObservationKey>().unwrap(), ObservationKey::Custom);
        assert_eq!(
            "lang".parse::<ObservationKey>().unwrap(),
            ObservationKey::Property("lang".to_string())
        );
        assert_eq!(
            "".parse::<ObservationKey>().unwrap(),
            ObservationKey::Property(String::new())
        );
    }

    #[test]
    fn test_apply_chains() {
        let mut record = DeviceRecord::new();
        record
            .apply("lang", "en", None)
            .unwrap()
            .apply("custom", ("redirect", "A1B2"), None)
            .unwrap();
        assert_eq!(record.fingerprint.properties.get("lang").map(String::as_str), Some("en"));
        assert_eq!(record.custom_properties.get("redirect").map(String::as_str), Some("A1B2"));
    }

    #[test]
    fn test_rejected_observation_keeps_headers() {
        let mut record = DeviceRecord::new();
        let first: Headers = vec![("accept", "text/css")].into_iter().collect();
        record.apply("lang", "en", Some(first.clone())).unwrap();

        let second: Headers = vec![("accept", "*/*")].into_iter().collect();
        assert!(record.apply("custom", "not-a-pair", Some(second)).is_err());
        assert_eq!(record.fingerprint.headers, Some(first));
    }
}
