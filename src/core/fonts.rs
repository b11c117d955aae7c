//! 字体候选列表
//!
//! 字体推导需要"所有候选字体"的完整列表。列表中的标识与 CSS 探测
//! 请求中使用的标识一致：每个单词首字母大写，单词之间用 `-` 连接，
//! 例如 `Times-New-Roman`。

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 内置的常见字体列表
pub const DEFAULT_FONTS: &[&str] = &[
    "Arial",
    "Arial-Black",
    "Arial-Narrow",
    "Calibri",
    "Cambria",
    "Candara",
    "Comic-Sans-MS",
    "Consolas",
    "Courier-New",
    "DejaVu-Sans",
    "DejaVu-Serif",
    "Franklin-Gothic-Medium",
    "Garamond",
    "Georgia",
    "Helvetica",
    "Helvetica-Neue",
    "Impact",
    "Liberation-Mono",
    "Liberation-Sans",
    "Liberation-Serif",
    "Lucida-Console",
    "Lucida-Grande",
    "Menlo",
    "Monaco",
    "Noto-Sans",
    "Open-Sans",
    "Palatino-Linotype",
    "Roboto",
    "Segoe-UI",
    "Tahoma",
    "Times-New-Roman",
    "Trebuchet-MS",
    "Ubuntu",
    "Verdana",
];

/// 字体候选列表，保持插入顺序并去重
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FontCatalog {
    fonts: Vec<String>,
}

impl Default for FontCatalog {
    fn default() -> Self {
        Self::from_list(DEFAULT_FONTS.iter().copied())
    }
}

impl FontCatalog {
    /// 从字体标识列表创建
    pub fn from_list<I, S>(fonts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let fonts = fonts
            .into_iter()
            .map(Into::into)
            .filter(|font: &String| !font.is_empty() && seen.insert(font.clone()))
            .collect();
        Self { fonts }
    }

    /// 解析方括号格式的字体清单
    ///
    /// 输入形如 `[arial, sans-serif][times new roman, serif]`，每组只取
    /// 第一个逗号前的字体名，规范化为 `Arial`、`Times-New-Roman`。
    pub fn parse_bracketed(text: &str) -> Self {
        Self::from_list(text.split('[').filter_map(|chunk| {
            let name = chunk.split(']').next()?.split(',').next()?.trim();
            if name.is_empty() {
                return None;
            }
            Some(normalize_font_name(name))
        }))
    }

    /// 是否包含某字体
    pub fn contains(&self, font: &str) -> bool {
        self.fonts.iter().any(|f| f == font)
    }

    /// 遍历字体标识
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fonts.iter().map(String::as_str)
    }

    /// 字体数量
    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

/// 规范化字体名：单词首字母大写并用 `-` 连接
pub fn normalize_font_name(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join("-")
}
