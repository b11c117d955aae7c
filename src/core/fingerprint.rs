//! 设备指纹模块
//!
//! 定义单个设备的指纹信息：普通属性、字体探测结果和原始请求头。
//!
//! 字体通过 CSS 侧信道探测：页面为每个候选字体声明一个指向服务器的
//! fallback 资源，只有设备上 **不存在** 的字体才会触发该请求。
//! 因此收集到的是"缺失字体"的观测，需要用完整的候选列表做一次差集，
//! 才能得到设备上实际安装的字体。

use crate::error::{FingerprintError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// 字体集合状态
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "fonts", rename_all = "lowercase")]
pub enum FontSet {
    /// 原始探测观测（触发了 fallback 请求的字体）
    Probed(BTreeSet<String>),
    /// 推导后的已安装字体
    Present(BTreeSet<String>),
}

impl Default for FontSet {
    fn default() -> Self {
        Self::Probed(BTreeSet::new())
    }
}

impl FontSet {
    /// 当前集合中的字体
    pub fn fonts(&self) -> &BTreeSet<String> {
        match self {
            Self::Probed(fonts) | Self::Present(fonts) => fonts,
        }
    }

    /// 是否已经推导
    pub fn is_derived(&self) -> bool {
        matches!(self, Self::Present(_))
    }
}

/// 请求头集合
///
/// 不透明的 `(名称, 值)` 列表，按名称排序以保证序列化结果稳定。
/// 名称统一为小写，同名请求头保留原始顺序。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    /// 创建空请求头集合
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取第一个匹配名称的值（不区分大小写）
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// 请求头数量
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 遍历请求头
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K, V> FromIterator<(K, V)> for Headers
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut pairs: Vec<(String, String)> = iter
            .into_iter()
            .map(|(k, v)| (k.into().to_ascii_lowercase(), v.into()))
            .collect();
        pairs.sort_by(|a, b| a.0.cmp(&b.0));
        Self(pairs)
    }
}

/// 从 http::HeaderMap 捕获请求头，非UTF-8值记为 "opaque"
#[cfg(feature = "http-headers")]
impl From<&http::HeaderMap> for Headers {
    fn from(map: &http::HeaderMap) -> Self {
        map.iter()
            .map(|(name, value)| (name.as_str(), value.to_str().unwrap_or("opaque")))
            .collect()
    }
}

/// 设备指纹
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// 设备特征属性，同名键后写覆盖
    pub properties: BTreeMap<String, String>,
    /// 字体集合
    pub fonts: FontSet,
    /// 原始请求头
    pub headers: Option<Headers>,
}

impl Fingerprint {
    /// 创建空指纹
    pub fn new() -> Self {
        Self::default()
    }

    /// 设置属性，已存在时覆盖
    pub fn set_property<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.properties.insert(key.into(), value.into());
    }

    /// 记录一次字体探测
    ///
    /// 推导之后集合含义已变为"已安装字体"，此时再记录探测会返回
    /// [`FingerprintError::AlreadyDerived`]。
    pub fn record_font_probe<S: Into<String>>(&mut self, font: S) -> Result<()> {
        match &mut self.fonts {
            FontSet::Probed(fonts) => {
                fonts.insert(font.into());
                Ok(())
            }
            FontSet::Present(_) => Err(FingerprintError::AlreadyDerived),
        }
    }

    /// 推导设备上已安装的字体
    ///
    /// 结果为 `reference − probed`：触发过 fallback 请求的字体视为缺失，
    /// 从未探测到的字体视为已安装。该操作会用推导结果替换探测集合，
    /// 每个指纹只能调用一次，第二次调用返回
    /// [`FingerprintError::AlreadyDerived`]。
    pub fn derive_present_fonts<I, S>(&mut self, reference: I) -> Result<&BTreeSet<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let probed = match &self.fonts {
            FontSet::Probed(fonts) => fonts,
            FontSet::Present(_) => return Err(FingerprintError::AlreadyDerived),
        };
        let present = reference
            .into_iter()
            .filter_map(|font| {
                let font: &str = font.as_ref();
                (!probed.contains(font)).then(|| font.to_string())
            })
            .collect();
        self.fonts = FontSet::Present(present);
        Ok(self.fonts.fonts())
    }

    /// 探测到的字体（推导前）
    pub fn probed_fonts(&self) -> Option<&BTreeSet<String>> {
        match &self.fonts {
            FontSet::Probed(fonts) => Some(fonts),
            FontSet::Present(_) => None,
        }
    }

    /// 已安装的字体（推导后）
    pub fn present_fonts(&self) -> Option<&BTreeSet<String>> {
        match &self.fonts {
            FontSet::Present(fonts) => Some(fonts),
            FontSet::Probed(_) => None,
        }
    }

    /// 序列化为JSON字符串
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
